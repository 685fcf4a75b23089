//! `whisper-rs`-backed ASR (spec §B.3 supplement), grounded on
//! `flowalyzer::transcription::transcribe_audio`. Emits text, not IPA —
//! pairing this backend with `require_ipa: true` is rejected by the
//! registry's capability check (spec §4.4a).

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::{PipelineError, Result};
use crate::plugins::{AsrMeta, AsrProvider, AsrResult, OutputType, PluginIdentity};
use crate::types::{AudioBuffer, Confidence};

pub struct WhisperAsr {
    model_path: String,
}

impl WhisperAsr {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl PluginIdentity for WhisperAsr {
    fn name(&self) -> &str {
        "whisper"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

#[async_trait]
impl AsrProvider for WhisperAsr {
    fn output_type(&self) -> OutputType {
        OutputType::Text
    }

    async fn transcribe(&self, audio: &AudioBuffer, lang: &str) -> Result<AsrResult> {
        let model_path = self.model_path.clone();
        let samples = audio.to_f32();
        let lang = lang.to_string();

        tokio::task::spawn_blocking(move || run_whisper(&model_path, &samples, &lang))
            .await
            .map_err(|e| PipelineError::internal("whisper-join", e.to_string()))?
    }
}

fn run_whisper(model_path: &str, samples: &[f32], lang: &str) -> Result<AsrResult> {
    let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
        .map_err(|e| PipelineError::provider_unavailable("whisper", format!("failed to load model: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_translate(false);
    params.set_language(Some(lang));

    let mut state = ctx
        .create_state()
        .map_err(|e| PipelineError::provider_transient("whisper", format!("failed to create state: {e}")))?;
    state
        .full(params, samples)
        .map_err(|e| PipelineError::provider_transient("whisper", format!("transcription failed: {e}")))?;

    let mut text = String::new();
    let mut timings = Vec::new();
    for segment in state.as_iter() {
        let segment_text = segment
            .to_str()
            .map_err(|e| PipelineError::provider_failed("whisper", format!("invalid segment text: {e}")))?;
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(segment_text);
        let start_ms = (segment.start_timestamp() as u64) * 10;
        let end_ms = (segment.end_timestamp() as u64) * 10;
        timings.push((start_ms, end_ms));
    }

    Ok(AsrResult {
        tokens: Vec::new(),
        raw_text: Some(text),
        timings: Some(timings),
        meta: AsrMeta {
            confidence: Confidence::Normal,
            backend: "whisper".to_string(),
        },
    })
}
