use std::io::Write;
use wavemaker::clock::FixedClock;
use wavemaker::controller::{render_offline, Controller};
use wavemaker::invariant_ppt::{contract_test, SOURCE_REMEMBERED, WAVEFORM_PARSED};
use wavemaker::params::Config;
use wavemaker::staging::Source;
use wavemaker::waveform::{write_wav, LoadError, Waveform};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn text_file_loads_one_sample_per_token() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "0.5 1.5\n\n-2.0\tnan?\n  7").unwrap();

    let waveform = Waveform::load_text(file.path()).unwrap();
    assert_eq!(waveform.len(), 5);
    assert_eq!(waveform.get(0), Some(0.5));
    assert_eq!(waveform.get(2), Some(-2.0));
    assert!(waveform.get(3).unwrap().is_nan());
    assert_eq!(waveform.get(4), Some(7.0));
}

#[test]
fn invalid_utf8_token_loads_as_nan() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"1.0 \xff\xfe 3.0").unwrap();

    let waveform = Waveform::load_text(file.path()).unwrap();
    assert_eq!(waveform.len(), 3);
    assert_eq!(waveform.get(0), Some(1.0));
    assert!(waveform.get(1).unwrap().is_nan());
    assert_eq!(waveform.get(2), Some(3.0));
    assert_eq!(waveform.nan_count(), 1);
}

#[test]
fn parsed_text_contract() {
    let waveform = Waveform::parse_text("3 2 1");
    assert_eq!(waveform.samples(), &[3.0, 2.0, 1.0]);
    contract_test("text parsing", &[WAVEFORM_PARSED]);
}

#[test]
fn staged_text_file_plays_back() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "1 2 3").unwrap();

    let (mut controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(10_000_000), Config::new(2.0, 1));
    staging.load_text(file.path()).unwrap();
    staging.commit().unwrap();

    assert_eq!(render_offline(&mut controller, 4), vec![2.0, 4.0, 6.0, 0.0]);
    assert!((staging.trial_length_seconds() - 0.03).abs() < 1e-12);
    contract_test("source remembered", &[SOURCE_REMEMBERED]);
}

#[test]
fn wav_file_loads_first_channel() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 1000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for (left, right) in [(16384i16, -1i16), (-16384, -1), (0, -1)] {
        writer.write_sample(left).unwrap();
        writer.write_sample(right).unwrap();
    }
    writer.finalize().unwrap();

    let waveform = Waveform::load_wav(&path).unwrap();
    assert_eq!(waveform.samples(), &[0.5, -0.5, 0.0]);
}

#[test]
fn reload_picks_up_rewritten_wav() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.wav");
    write_wav(&path, &[0.25, 0.5], 1_000_000).unwrap();

    let (_controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(1_000_000), Config::default());
    assert_eq!(staging.load_wav(&path).unwrap().len(), 2);
    assert_eq!(staging.source(), Some(&Source::Wav(path.clone())));

    write_wav(&path, &[0.25, 0.5, 0.75], 1_000_000).unwrap();
    assert_eq!(staging.reload().unwrap().samples(), &[0.25, 0.5, 0.75]);
}

#[test]
fn missing_files_report_errors() {
    let (_controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(1_000_000), Config::default());
    assert!(matches!(
        staging.load_text("/no/such/waveform.txt"),
        Err(LoadError::Io(_))
    ));
    assert!(matches!(
        staging.load_wav("/no/such/waveform.wav"),
        Err(LoadError::Wav(_))
    ));
    assert!(staging.source().is_none());
    assert!(staging.staged().is_none());
}

#[test]
fn controller_preview_matches_active_waveform() {
    let (mut controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(250_000_000), Config::default());
    staging
        .provide_waveform(Waveform::from_samples(vec![1.0, 0.0, -1.0]))
        .unwrap();
    controller.initialize();

    let (time, amplitude) = controller.preview().to_columns();
    assert_eq!(time, vec![0.0, 0.25, 0.5]);
    assert_eq!(amplitude, vec![1.0, 0.0, -1.0]);

    // Previewing does not disturb playback.
    assert_eq!(controller.tick(), 1.0);
}
