//! Voice-activity detection (spec §4.3): 30 ms frames, 10 ms hop, an
//! energy-plus-zero-crossing detector, merged with a 250 ms hangover.

const FRAME_MS: u32 = 30;
const HOP_MS: u32 = 10;
const HANGOVER_MS: u32 = 250;
const ENERGY_THRESHOLD_DBFS: f32 = -40.0;
const ZCR_VOICED_MAX: f32 = 0.35;

/// A `(start_ms, end_ms)` speech segment.
pub type Segment = (u64, u64);

fn frame_energy_dbfs(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return f32::NEG_INFINITY;
    }
    let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
    if rms <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

/// Single-frame energy+ZCR classification, exposed for incremental callers
/// (the streaming session) that classify frames as they arrive rather than
/// over a whole buffer.
pub(crate) fn is_speech_frame(frame: &[f32]) -> bool {
    frame_energy_dbfs(frame) > ENERGY_THRESHOLD_DBFS && zero_crossing_rate(frame) < ZCR_VOICED_MAX
}

/// Runs VAD over the whole buffer and returns merged speech segments in
/// milliseconds. `hangover_ms` lets callers shrink/grow the merge window for
/// tests; production code uses `detect_speech`.
pub fn detect_speech_with_hangover(samples: &[f32], sample_rate: u32, hangover_ms: u32) -> Vec<Segment> {
    if sample_rate == 0 || samples.is_empty() {
        return Vec::new();
    }
    let frame_len = (sample_rate as u64 * FRAME_MS as u64 / 1000) as usize;
    let hop_len = (sample_rate as u64 * HOP_MS as u64 / 1000) as usize;
    if frame_len == 0 || hop_len == 0 {
        return Vec::new();
    }

    let mut voiced_flags = Vec::new();
    let mut pos = 0usize;
    while pos < samples.len() {
        let end = (pos + frame_len).min(samples.len());
        let frame = &samples[pos..end];
        voiced_flags.push((pos, is_speech_frame(frame)));
        pos += hop_len;
    }

    let ms_per_sample = 1000.0 / sample_rate as f64;
    let hangover_frames = ((hangover_ms as f64 / HOP_MS as f64).ceil() as usize).max(1);

    let mut segments: Vec<Segment> = Vec::new();
    let mut active_start: Option<usize> = None;
    let mut silence_run = 0usize;

    for (idx, &(start_sample, voiced)) in voiced_flags.iter().enumerate() {
        if voiced {
            silence_run = 0;
            if active_start.is_none() {
                active_start = Some(start_sample);
            }
        } else if active_start.is_some() {
            silence_run += 1;
            if silence_run >= hangover_frames {
                let start = active_start.take().unwrap();
                let end_sample = start_sample;
                segments.push((
                    (start as f64 * ms_per_sample) as u64,
                    (end_sample as f64 * ms_per_sample) as u64,
                ));
                silence_run = 0;
            }
        }
        let _ = idx;
    }

    if let Some(start) = active_start {
        segments.push((
            (start as f64 * ms_per_sample) as u64,
            (samples.len() as f64 * ms_per_sample) as u64,
        ));
    }

    segments
}

pub fn detect_speech(samples: &[f32], sample_rate: u32) -> Vec<Segment> {
    detect_speech_with_hangover(samples, sample_rate, HANGOVER_MS)
}

/// Fraction of total duration covered by speech segments, used by the
/// quality gate's "mostly silence" rule.
pub fn speech_ratio(segments: &[Segment], total_duration_ms: u64) -> f32 {
    if total_duration_ms == 0 {
        return 0.0;
    }
    let speech_ms: u64 = segments.iter().map(|(s, e)| e.saturating_sub(*s)).sum();
    (speech_ms as f32 / total_duration_ms as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, ms: u32, amplitude: f32) -> Vec<f32> {
        let n = (sample_rate as u64 * ms as u64 / 1000) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_yields_no_segments() {
        let silence = vec![0.0f32; 16_000];
        assert!(detect_speech(&silence, 16_000).is_empty());
    }

    #[test]
    fn loud_tone_surrounded_by_silence_is_detected() {
        let sample_rate = 16_000;
        let mut samples = vec![0.0f32; sample_rate as usize / 4]; // 250ms silence
        samples.extend(tone(200.0, sample_rate, 500, 0.6));
        samples.extend(vec![0.0f32; sample_rate as usize]); // 1s silence (exceeds hangover)
        let segments = detect_speech(&samples, sample_rate);
        assert_eq!(segments.len(), 1);
        let (start, end) = segments[0];
        assert!(start >= 200 && start <= 300);
        assert!(end > start);
    }

    #[test]
    fn speech_ratio_bounds_to_unit_interval() {
        assert_eq!(speech_ratio(&[(0, 500)], 1000), 0.5);
        assert_eq!(speech_ratio(&[], 1000), 0.0);
        assert_eq!(speech_ratio(&[(0, 2000)], 1000), 1.0);
    }
}
