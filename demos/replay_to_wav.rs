// demos/replay_to_wav.rs
//
// Usage: cargo run --example replay_to_wav -- [waveform.txt] [out.wav]
//
// Loads a text waveform (or synthesizes a ramp when none is given), replays
// it twice at 1 kHz with gain 0.5 and writes the controller output to WAV.

use std::env;
use std::error::Error;
use wavemaker::clock::FixedClock;
use wavemaker::controller::{render_offline, Controller};
use wavemaker::params::Config;
use wavemaker::waveform::{write_wav, Waveform};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let input = args.next();
    let output = args.next().unwrap_or_else(|| "replay.wav".to_string());

    let clock = FixedClock::from_rate_hz(1000.0);
    let (mut controller, mut staging) = Controller::new_with_channels(clock, Config::new(0.5, 2));

    match input {
        Some(path) => {
            staging.load_text(path)?;
        }
        None => staging.stage(Waveform::from_samples(
            (0..500).map(|i| i as f64 / 500.0).collect(),
        )),
    }
    staging.commit()?;
    controller.initialize();

    let ticks = controller.waveform().len() * 2 + 100;
    let samples = render_offline(&mut controller, ticks);
    write_wav(&output, &samples, controller.period_ns())?;

    println!(
        "Wrote {} ({} ticks, trial length {:.3} s, final state {:?})",
        output,
        samples.len(),
        staging.trial_length_seconds(),
        staging.state()
    );
    Ok(())
}
