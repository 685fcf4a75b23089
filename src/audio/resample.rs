//! Band-limited resampling (spec §4.3): a windowed-sinc kernel with a Kaiser
//! window, convolved at the output sample rate (a direct-form equivalent of
//! a polyphase filter bank — each output sample picks its own fractional
//! phase into the same prototype kernel).

use anyhow::{ensure, Result};

const HALF_TAPS: usize = 16;
const KAISER_BETA: f64 = 7.857; // ~60 dB stopband, matches an 80 dB/ 400 Hz transition at 16 kHz

fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    while term > sum * 1e-12 {
        term *= (x / (2.0 * k)).powi(2);
        sum += term;
        k += 1.0;
    }
    sum
}

fn kaiser_window(n: usize, len: usize, beta: f64) -> f64 {
    let alpha = (len - 1) as f64 / 2.0;
    let ratio = (n as f64 - alpha) / alpha;
    let arg = beta * (1.0 - ratio * ratio).max(0.0).sqrt();
    bessel_i0(arg) / bessel_i0(beta)
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0
    } else {
        (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
    }
}

/// Resamples `samples` from `source_rate` to `target_rate` using a
/// windowed-sinc kernel scaled to the lower of the two rates (anti-aliasing
/// on downsampling, band-limited interpolation on upsampling).
pub fn band_limited_resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let cutoff = ratio.min(1.0); // normalized to source Nyquist
    let output_len = ((samples.len() as f64) * ratio).ceil().max(1.0) as usize;
    let mut output = Vec::with_capacity(output_len);

    let taps_each_side = HALF_TAPS as f64;
    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let mut acc = 0.0f64;
        let lo = (src_pos - taps_each_side).floor() as i64;
        let hi = (src_pos + taps_each_side).ceil() as i64;
        for n in lo..=hi {
            if n < 0 || n as usize >= samples.len() {
                continue;
            }
            let dx = src_pos - n as f64;
            let kernel_x = dx * cutoff;
            let window_index = (dx + taps_each_side).round().clamp(0.0, 2.0 * taps_each_side) as usize;
            let w = kaiser_window(window_index, 2 * HALF_TAPS + 1, KAISER_BETA);
            acc += samples[n as usize] as f64 * cutoff * sinc(kernel_x) * w;
        }
        output.push(acc as f32);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::band_limited_resample;

    #[test]
    fn preserves_constant_signal_after_resample() {
        let input = vec![0.5; 480];
        let resampled = band_limited_resample(&input, 48_000, 16_000).unwrap();
        let expected_len = ((input.len() as f64) * 16_000.0 / 48_000.0).ceil() as usize;
        assert_eq!(resampled.len(), expected_len);
        // Edge taps see zero-padding, so only the interior holds exactly flat.
        let interior = &resampled[4..resampled.len() - 4];
        assert!(interior.iter().all(|&s| (s - 0.5).abs() < 0.05));
    }

    #[test]
    fn identity_when_rates_match() {
        let input = vec![0.1, -0.2, 0.3];
        let out = band_limited_resample(&input, 16_000, 16_000).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn upsamples_to_longer_buffer() {
        let input = vec![0.0; 160];
        let out = band_limited_resample(&input, 8_000, 16_000).unwrap();
        assert_eq!(out.len(), 320);
    }
}
