//! Waveform buffers: loading, preview, and WAV interchange.
//!
//! A [`Waveform`] is the ordered sample sequence replayed by the engine, one
//! sample per tick. Waveforms are built on the non-RT side (text or WAV
//! files), moved into the controller through the staging queue, and moved
//! back out when replaced. Nothing in this module is called from the tick
//! path except the read-only accessors.

#![forbid(unsafe_code)]

use crate::invariant_ppt::{assert_invariant, WAVEFORM_PARSED, PREVIEW_FINITE};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or writing waveform files.
///
/// Malformed sample tokens are not errors; they load as `NaN`.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source could not be opened or read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The WAV container could not be decoded or encoded.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// A reload was requested but nothing has been loaded yet.
    #[error("no waveform source has been loaded")]
    NoSource,
}

/// An ordered sequence of samples, one per tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    samples: Vec<f64>,
}

impl Waveform {
    /// Create an empty waveform.
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Wrap an existing sample vector.
    pub fn from_samples(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    /// Parse whitespace/newline separated real-number tokens.
    ///
    /// Each token becomes one sample in order. Tokens that fail to parse
    /// become `NaN` and parsing continues to the end of the input.
    pub fn parse_text(text: &str) -> Self {
        Self::parse_bytes(text.as_bytes())
    }

    /// Parse ASCII-whitespace separated tokens from raw bytes.
    ///
    /// Tokens that are not valid UTF-8 are malformed like any other and
    /// become `NaN`.
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        let mut tokens = 0;
        let mut samples = Vec::new();
        for token in bytes
            .split(u8::is_ascii_whitespace)
            .filter(|token| !token.is_empty())
        {
            tokens += 1;
            samples.push(parse_token(token));
        }
        assert_invariant(
            WAVEFORM_PARSED,
            samples.len() == tokens,
            "One sample per token",
            Some("parse_bytes"),
        );
        Self { samples }
    }

    /// Read a text waveform from any buffered reader.
    ///
    /// Only I/O failures are errors; undecodable bytes load as `NaN`.
    pub fn read_text<R: BufRead>(mut reader: R) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::parse_bytes(&bytes))
    }

    /// Load a text waveform file.
    pub fn load_text(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let waveform = Self::read_text(BufReader::new(file))?;
        let malformed = waveform.nan_count();
        if malformed > 0 {
            log::warn!(
                "{}: {} malformed token(s) loaded as NaN",
                path.display(),
                malformed
            );
        }
        log::info!("Loaded {} samples from {}", waveform.len(), path.display());
        Ok(waveform)
    }

    /// Load the first channel of a WAV file.
    ///
    /// Integer PCM is normalised to [-1.0, 1.0); float data is taken as-is.
    pub fn load_wav(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<Vec<f64>, hound::Error>>()?,
            hound::SampleFormat::Int => {
                let max_value = spec
                    .bits_per_sample
                    .checked_sub(1)
                    .and_then(|shift| 1i64.checked_shl(u32::from(shift)))
                    .ok_or(LoadError::Wav(hound::Error::Unsupported))?
                    as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| f64::from(v) / max_value))
                    .collect::<Result<Vec<f64>, hound::Error>>()?
            }
        };

        let samples: Vec<f64> = interleaved.iter().step_by(channels).copied().collect();
        log::info!(
            "Loaded {} samples ({} Hz, {} ch) from {}",
            samples.len(),
            spec.sample_rate,
            spec.channels,
            path.display()
        );
        Ok(Self { samples })
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the waveform holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at `index`, if in range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.samples.get(index).copied()
    }

    /// All samples in order.
    #[inline]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// True when dropping this waveform would free heap memory.
    #[inline]
    pub(crate) fn holds_allocation(&self) -> bool {
        self.samples.capacity() > 0
    }

    /// Consume the waveform, returning its samples.
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Count of samples that are `NaN` (malformed tokens).
    pub fn nan_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_nan()).count()
    }

    /// Lazy `(time, amplitude)` pairs for plotting at the given tick period.
    pub fn preview(&self, period_ns: u64) -> Preview<'_> {
        Preview::new(&self.samples, period_ns)
    }
}

impl From<Vec<f64>> for Waveform {
    fn from(samples: Vec<f64>) -> Self {
        Self::from_samples(samples)
    }
}

fn parse_token(token: &[u8]) -> f64 {
    std::str::from_utf8(token)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Trial length in seconds for `len` samples at `period_ns` per tick.
#[inline]
pub fn trial_length_seconds(len: usize, period_ns: u64) -> f64 {
    len as f64 * period_ns as f64 / 1e9
}

/// Finite, restartable iterator of `(time_s, amplitude)` pairs.
///
/// `time[i] = i * period_ns / 1e9`. Cloning or calling [`Preview::restart`]
/// starts the sequence over; the waveform itself is never touched.
#[derive(Debug, Clone)]
pub struct Preview<'a> {
    samples: &'a [f64],
    period_ns: u64,
    next: usize,
}

impl<'a> Preview<'a> {
    fn new(samples: &'a [f64], period_ns: u64) -> Self {
        Self {
            samples,
            period_ns,
            next: 0,
        }
    }

    /// Rewind to the first pair.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// Collect into separate time and amplitude vectors, as plotting widgets expect.
    pub fn to_columns(&self) -> (Vec<f64>, Vec<f64>) {
        let columns: (Vec<f64>, Vec<f64>) = self.clone().restarted().unzip();
        assert_invariant(
            PREVIEW_FINITE,
            columns.0.len() == self.samples.len(),
            "Preview yields exactly one pair per sample",
            Some("to_columns"),
        );
        columns
    }

    fn restarted(mut self) -> Self {
        self.restart();
        self
    }
}

impl Iterator for Preview<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let amplitude = *self.samples.get(self.next)?;
        let time = self.next as f64 * self.period_ns as f64 / 1e9;
        self.next += 1;
        Some((time, amplitude))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Preview<'_> {}

/// Write samples as a mono 32-bit float WAV at the rate implied by `period_ns`.
pub fn write_wav(path: impl AsRef<Path>, samples: &[f64], period_ns: u64) -> Result<(), LoadError> {
    let sample_rate = if period_ns == 0 {
        1
    } else {
        (1e9 / period_ns as f64).round().max(1.0) as u32
    };
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample as f32)?;
    }
    writer.finalize()?;
    log::info!(
        "Wrote {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        path.as_ref().display()
    );
    Ok(())
}
