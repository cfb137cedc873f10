use std::time::Instant;
use wavemaker::clock::FixedClock;
use wavemaker::controller::Controller;
use wavemaker::params::Config;
use wavemaker::waveform::Waveform;

#[test]
fn tick_timing_stability() {
    // Long waveform looping forever
    let samples: Vec<f64> = (0..48_000).map(|i| (i as f64 * 0.001).sin()).collect();
    let (mut controller, mut staging) =
        Controller::new_with_channels(FixedClock::from_rate_hz(48_000.0), Config::new(0.8, 0));
    staging
        .provide_waveform(Waveform::from_samples(samples))
        .unwrap();

    let start = Instant::now();
    for _ in 0..100_000 {
        controller.tick();
    }
    let duration = start.elapsed();
    // Assert bounded: less than 1 second for 100k ticks
    assert!(duration.as_millis() < 1000, "Execution took too long: {:?}", duration);
}
