//! Audio front-end orchestration (spec §4.3): `prepare(bytes, content_type)
//! -> (AudioBuffer, QualityReport)`.

use tracing::{debug, warn};

use crate::audio::agc::{apply_agc, dbfs, peak, rms};
use crate::audio::decoder::{decode_bytes, ContentType, DecodedAudio};
use crate::audio::filters::HighPassBiquad;
use crate::audio::resample::band_limited_resample;
use crate::audio::vad::{detect_speech, speech_ratio};
use crate::error::{PipelineError, Result};
use crate::types::{AudioBuffer, QualityReport};

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
const HIGH_PASS_HZ: f32 = 80.0;

const MIN_DURATION_MS: u64 = 250;
const MAX_DURATION_MS: u64 = 60_000;
const MIN_SPEECH_RATIO: f32 = 0.1;
const MAX_CLIP_RATIO: f32 = 0.05;
const NOISE_FLOOR_DBFS: f32 = -30.0;
const CLIP_THRESHOLD: f32 = 0.999;

/// Decodes, cleans, and quality-gates raw container bytes, per spec §4.3.
pub fn prepare(bytes: &[u8], content_type: Option<&str>, quick: bool) -> Result<(AudioBuffer, QualityReport)> {
    let declared = content_type.and_then(ContentType::from_mime);
    let DecodedAudio {
        samples,
        sample_rate,
        channels,
    } = decode_bytes(bytes, declared)
        .map_err(|e| PipelineError::invalid_input(format!("failed to decode audio: {e}")))?;

    if samples.is_empty() {
        return Err(PipelineError::invalid_input("audio contains no samples"));
    }

    let mono = downmix(&samples, channels);
    let resampled = band_limited_resample(&mono, sample_rate, TARGET_SAMPLE_RATE)
        .map_err(|e| PipelineError::invalid_input(format!("resampling failed: {e}")))?;
    let filtered = HighPassBiquad::process_all(HIGH_PASS_HZ, TARGET_SAMPLE_RATE, &resampled);

    let pk = peak(&filtered);
    let signal_rms = rms(&filtered);
    let clipped_count = filtered.iter().filter(|&&s| s.abs() >= CLIP_THRESHOLD).count();
    let clip_ratio = clipped_count as f32 / filtered.len().max(1) as f32;

    let gained = apply_agc(&filtered);

    let segments = detect_speech(&gained, TARGET_SAMPLE_RATE);
    let duration_ms = (gained.len() as u64 * 1000) / TARGET_SAMPLE_RATE as u64;
    let ratio = speech_ratio(&segments, duration_ms);

    let mut warnings = Vec::new();
    let mut critical = false;

    if duration_ms < MIN_DURATION_MS {
        warnings.push("too short".to_string());
        critical = true;
    }
    if ratio < MIN_SPEECH_RATIO {
        warnings.push("mostly silence".to_string());
        critical = true;
    }
    if clip_ratio > MAX_CLIP_RATIO {
        warnings.push("clipping".to_string());
    }
    if dbfs(signal_rms) > NOISE_FLOOR_DBFS {
        warnings.push("noisy".to_string());
    }
    if duration_ms > MAX_DURATION_MS {
        warnings.push("too long".to_string());
        critical = true;
    }

    let gate_passed = if quick { true } else { !critical };

    debug!(
        duration_ms,
        speech_ratio = ratio,
        clip_ratio,
        gate_passed,
        "front-end prepared audio buffer"
    );
    if !gate_passed {
        warn!(?warnings, "quality gate failed");
    }

    let quality = QualityReport {
        duration_ms,
        speech_ratio: ratio,
        dbfs: dbfs(signal_rms),
        clipped: clip_ratio > 0.0,
        segments,
        warnings,
        gate_passed,
    };

    Ok((AudioBuffer::from_f32(&gained, TARGET_SAMPLE_RATE), quality))
}

fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
