//! Deterministic stub ASR (spec §B.3 supplement): the `ProviderUnavailable`
//! fallback when `strict_mode` is false, and the default test double.

use async_trait::async_trait;

use crate::error::Result;
use crate::plugins::{AsrMeta, AsrProvider, AsrResult, OutputType, PluginIdentity};
use crate::types::{AudioBuffer, Confidence};

/// Always returns an empty token sequence at `Confidence::Low`. Never fails;
/// a pipeline backed only by this plugin still round-trips end to end.
#[derive(Debug, Default)]
pub struct StubAsr;

impl StubAsr {
    pub fn new() -> Self {
        Self
    }
}

impl PluginIdentity for StubAsr {
    fn name(&self) -> &str {
        "stub"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

#[async_trait]
impl AsrProvider for StubAsr {
    fn output_type(&self) -> OutputType {
        OutputType::Ipa
    }

    async fn transcribe(&self, _audio: &AudioBuffer, _lang: &str) -> Result<AsrResult> {
        Ok(AsrResult {
            tokens: Vec::new(),
            raw_text: None,
            timings: None,
            meta: AsrMeta {
                confidence: Confidence::Low,
                backend: self.name().to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transcribe_returns_empty_tokens_at_low_confidence() {
        let asr = StubAsr::new();
        let audio = AudioBuffer {
            samples: vec![0; 16_000],
            sample_rate: 16_000,
            channels: 1,
        };
        let result = asr.transcribe(&audio, "en").await.unwrap();
        assert!(result.tokens.is_empty());
        assert_eq!(result.meta.confidence, Confidence::Low);
    }
}
