use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Persisted waveform artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformData {
    pub waveform: Vec<f32>,
    /// Seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub total_samples: u64,
}

impl WaveformData {
    pub fn from_samples(samples: &[i16], sample_rate: u32, points: usize) -> Self {
        let duration = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        Self {
            waveform: downsample(samples, points),
            duration,
            sample_rate,
            total_samples: samples.len() as u64,
        }
    }
}

/// Reduce samples to `points` envelope values in `0.0..=1.0`.
///
/// Each bucket mixes its peak and RMS (`(0.6 * peak + 0.4 * rms) ^ 0.7`);
/// the result is scaled so the loudest bucket is 1.0. Fewer samples than
/// points yields one value per sample.
pub fn downsample(samples: &[i16], points: usize) -> Vec<f32> {
    if samples.is_empty() || points == 0 {
        return Vec::new();
    }

    let buckets = points.min(samples.len());
    let mut values = Vec::with_capacity(buckets);
    for i in 0..buckets {
        let start = i * samples.len() / buckets;
        let end = ((i + 1) * samples.len() / buckets).max(start + 1);
        let bucket = &samples[start..end];

        let mut peak = 0f32;
        let mut sum_sq = 0f64;
        for &s in bucket {
            let v = s as f32 / 32768.0;
            peak = peak.max(v.abs());
            sum_sq += (v as f64) * (v as f64);
        }
        let rms = (sum_sq / bucket.len() as f64).sqrt() as f32;
        values.push((0.6 * peak + 0.4 * rms).powf(0.7));
    }

    let max = values.iter().cloned().fold(0f32, f32::max);
    if max > 0.0 {
        for v in &mut values {
            *v /= max;
        }
    }
    values
}

/// Read mono 16-bit samples and the sample rate from a WAV buffer.
/// Multi-channel files are reduced to their first channel.
pub fn read_wav_samples(data: &[u8]) -> Result<(Vec<i16>, u32), hound::Error> {
    let mut reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(hound::Error::Unsupported);
    }
    let channels = spec.channels.max(1) as usize;
    let samples = reader
        .samples::<i16>()
        .step_by(channels)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((samples, spec.sample_rate))
}
