//! DC/rumble removal (spec §4.3: "80 Hz high-pass biquad").

/// A Robert Bristow-Johnson style biquad high-pass, run in direct form I.
pub struct HighPassBiquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl HighPassBiquad {
    pub fn new(cutoff_hz: f32, sample_rate: u32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let q = std::f32::consts::FRAC_1_SQRT_2;
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn process_all(cutoff_hz: f32, sample_rate: u32, samples: &[f32]) -> Vec<f32> {
        let mut filt = Self::new(cutoff_hz, sample_rate);
        samples.iter().map(|&s| filt.process(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuates_dc_offset() {
        let samples = vec![1.0f32; 16_000]; // 1 s of pure DC at 16 kHz
        let out = HighPassBiquad::process_all(80.0, 16_000, &samples);
        let tail_rms = (out[8_000..].iter().map(|s| s * s).sum::<f32>() / 8_000.0).sqrt();
        assert!(tail_rms < 0.05, "expected DC to be attenuated, got rms={tail_rms}");
    }

    #[test]
    fn passes_high_frequency_content() {
        let sample_rate = 16_000u32;
        let samples: Vec<f32> = (0..1600)
            .map(|i| (2.0 * std::f32::consts::PI * 2000.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let out = HighPassBiquad::process_all(80.0, sample_rate, &samples);
        let in_rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        let out_rms = (out[200..].iter().map(|s| s * s).sum::<f32>() / (out.len() - 200) as f32).sqrt();
        assert!(out_rms > in_rms * 0.8);
    }
}
