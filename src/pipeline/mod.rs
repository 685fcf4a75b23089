//! Pipeline Runner (spec §4.5): the `transcribe`/`compare`/`quick_compare`
//! algorithm over one resolved plugin composition.

pub mod cache;
pub mod fingerprint;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::alignment::Weights;
use crate::audio;
use crate::error::{PipelineError, Result};
use crate::inventory::{self, Inventory};
use crate::plugins::builtin::comparator_default::DefaultComparator;
use crate::plugins::registry::ResolvedPlugins;
use crate::plugins::{AsrProvider, ComparatorPlugin, PreprocessorPlugin, TextRefProvider};
use crate::types::{
    Confidence, EvaluationLevel, FullReport, PipelineFingerprint, QualityReport, RunOptions, TokenSequence,
    TranscriptionReport,
};

/// One resolved, immutable plugin composition plus the inventory it was
/// built for. Cached by `PipelineFingerprint` (spec §4.7).
pub struct PipelineRunner {
    pub fingerprint: PipelineFingerprint,
    asr: Arc<dyn AsrProvider>,
    textref: Arc<dyn TextRefProvider>,
    comparator: Arc<dyn ComparatorPlugin>,
    preprocessor: Option<Arc<dyn PreprocessorPlugin>>,
    inventory: Arc<Inventory>,
    lang: String,
    /// Warnings raised while resolving plugins for this composition (e.g. a
    /// `strict_mode: false` fallback substitution), surfaced on every report
    /// this runner produces.
    construction_warnings: Vec<String>,
}

impl PipelineRunner {
    pub fn new(fingerprint: PipelineFingerprint, resolved: ResolvedPlugins, inventory: Arc<Inventory>, lang: String) -> Self {
        let comparator = resolved
            .comparator
            .unwrap_or_else(|| Arc::new(DefaultComparator::new(EvaluationLevel::Phonemic, crate::types::CompareMode::Objective)));
        Self {
            fingerprint,
            asr: resolved.asr,
            textref: resolved.textref,
            comparator,
            preprocessor: resolved.preprocessor,
            inventory,
            lang,
            construction_warnings: resolved.warnings,
        }
    }

    async fn prepare_audio(&self, bytes: &[u8], content_type: Option<&str>, quick: bool) -> Result<(crate::types::AudioBuffer, QualityReport)> {
        match &self.preprocessor {
            Some(p) => p.process_audio(bytes, content_type).await,
            None => audio::prepare(bytes, content_type, quick),
        }
    }

    fn normalize(&self, tokens: &[crate::types::IpaToken], options: &RunOptions) -> Result<(TokenSequence, Vec<String>)> {
        // §4.5: `phonetic` compare mode never applies collapse, regardless
        // of the requested evaluation level.
        let effective_level = if options.compare_mode == crate::types::CompareMode::Phonetic {
            EvaluationLevel::Phonetic
        } else {
            options.evaluation_level
        };
        match &self.preprocessor {
            Some(p) => p.normalize_tokens(tokens, &self.inventory, effective_level),
            None => inventory::normalize(tokens, &self.inventory, effective_level),
        }
    }

    /// Runs `transcribe` (spec §4.5 steps 1, 3, 4 — no reference comparison).
    pub async fn transcribe(&self, bytes: &[u8], content_type: Option<&str>, options: &RunOptions) -> Result<TranscriptionReport> {
        let (pcm, quality) = self.prepare_audio(bytes, content_type, options.quick).await?;

        if !quality.gate_passed && !options.quick {
            let mut warnings = quality.warnings.clone();
            warnings.extend(self.construction_warnings.clone());
            return Ok(TranscriptionReport {
                tokens: Vec::new(),
                raw_text: None,
                lang: options.lang.clone(),
                backend: self.asr.name().to_string(),
                warnings,
                confidence: Confidence::Low,
                quality,
            });
        }

        let raw_hyp = retry_once_on_transient(|| self.asr.transcribe(&pcm, &options.lang)).await?;
        let (hyp, mut warnings) = self.normalize(&raw_hyp.tokens, options)?;
        warnings.extend(quality.warnings.clone());
        warnings.extend(self.construction_warnings.clone());

        let confidence = if !quality.gate_passed || hyp.len() < 2 || raw_hyp.meta.confidence == Confidence::Low {
            Confidence::Low
        } else {
            Confidence::Normal
        };

        Ok(TranscriptionReport {
            tokens: hyp,
            raw_text: raw_hyp.raw_text,
            lang: options.lang.clone(),
            backend: raw_hyp.meta.backend,
            quality,
            confidence,
            warnings,
        })
    }

    /// Runs `compare`/`quick_compare` (spec §4.5 algorithm, steps 1-8).
    pub async fn compare(&self, bytes: &[u8], content_type: Option<&str>, target_text: &str, options: &RunOptions) -> Result<FullReport> {
        let (pcm, quality) = self.prepare_audio(bytes, content_type, options.quick).await?;

        if !quality.gate_passed && !options.quick {
            warn!(lang = %options.lang, "quality gate failed; returning low-confidence report without scoring");
            let mut warnings = quality.warnings.clone();
            warnings.extend(self.construction_warnings.clone());
            let empty_report = crate::types::CompareReport {
                ops: Vec::new(),
                per: 0.0,
                score: 0.0,
                ref_tokens: Vec::new(),
                hyp_tokens: Vec::new(),
                mode: options.compare_mode,
                evaluation_level: options.evaluation_level,
                confidence: Confidence::Low,
                warnings,
            };
            return Ok(FullReport {
                quality,
                compare: empty_report,
                backend: self.asr.name().to_string(),
            });
        }

        let raw_hyp = retry_once_on_transient(|| self.asr.transcribe(&pcm, &options.lang)).await?;
        if options.require_ipa && self.asr.output_type() != crate::plugins::OutputType::Ipa {
            return Err(PipelineError::config(format!(
                "backend `{}` does not emit IPA but require_ipa is set",
                self.asr.name()
            )));
        }
        let (hyp, mut warnings) = self.normalize(&raw_hyp.tokens, options)?;

        let raw_ref = retry_once_on_transient(|| self.textref.to_ipa(target_text, &options.lang)).await?;
        let (reference, ref_warnings) = self.normalize(&raw_ref, options)?;
        warnings.extend(ref_warnings);
        warnings.extend(quality.warnings.clone());
        warnings.extend(self.construction_warnings.clone());

        let weights = Weights::for_mode(options.compare_mode);
        let mut report = self.comparator.compare(&reference, &hyp, &weights);

        report.confidence = if !quality.gate_passed || hyp.len() < 2 || raw_hyp.meta.confidence == Confidence::Low {
            Confidence::Low
        } else if quality.gate_passed && report.per < 0.1 {
            Confidence::High
        } else {
            Confidence::Normal
        };
        // The comparator is constructed once per fingerprint and does not
        // see per-request options; stamp the fields it can't know here,
        // matching the gate-failure branch above.
        report.mode = options.compare_mode;
        report.evaluation_level = options.evaluation_level;
        report.warnings = warnings;

        debug!(per = report.per, score = report.score, "compare complete");

        Ok(FullReport {
            quality,
            compare: report,
            backend: raw_hyp.meta.backend,
        })
    }

    pub async fn quick_compare(&self, bytes: &[u8], content_type: Option<&str>, target_text: &str, options: &RunOptions) -> Result<FullReport> {
        let mut quick_options = options.clone();
        quick_options.quick = true;
        self.compare(bytes, content_type, target_text, &quick_options).await
    }
}

/// Runs `op` once; on `ProviderTransient`, retries exactly once, mapping a
/// second failure to `ProviderFailed` (spec §7).
async fn retry_once_on_transient<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    match op().await {
        Ok(v) => Ok(v),
        Err(PipelineError::ProviderTransient { plugin, detail }) => {
            warn!(plugin = %plugin, detail = %detail, "provider transient failure; retrying once");
            match op().await {
                Ok(v) => Ok(v),
                Err(PipelineError::ProviderTransient { plugin, detail }) => Err(PipelineError::provider_failed(plugin, detail)),
                Err(other) => Err(other),
            }
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::plugins::builtin::asr_stub::StubAsr;
    use crate::plugins::builtin::textref_dictionary::DictionaryTextRef;
    use crate::plugins::registry::ResolvedPlugins;
    use crate::types::RunOptions;
    use std::collections::HashSet;

    fn test_runner() -> PipelineRunner {
        let resolved = ResolvedPlugins {
            asr: Arc::new(StubAsr::new()),
            textref: Arc::new(DictionaryTextRef::bundled_en()),
            comparator: None,
            preprocessor: None,
            llm: None,
        };
        let mut inventory = Inventory::new("en");
        inventory.canonical = HashSet::from(["k".to_string(), "æ".to_string(), "t".to_string()]);
        PipelineRunner::new(
            PipelineFingerprint("test".to_string()),
            resolved,
            Arc::new(inventory),
            "en".to_string(),
        )
    }

    fn synth_wav(seconds: f32, freq: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let n = (16_000.0 * seconds) as usize;
            for i in 0..n {
                let t = i as f32 / 16_000.0;
                let s = (t * 2.0 * std::f32::consts::PI * freq).sin() * 0.5;
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn transcribe_on_stub_backend_yields_low_confidence() {
        let runner = test_runner();
        let bytes = synth_wav(1.0, 150.0);
        let options = RunOptions::default();
        let report = runner.transcribe(&bytes, Some("audio/wav"), &options).await.unwrap();
        assert_eq!(report.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn compare_on_too_short_clip_skips_scoring() {
        let runner = test_runner();
        let bytes = synth_wav(0.05, 150.0);
        let options = RunOptions::default();
        let report = runner.compare(&bytes, Some("audio/wav"), "cat", &options).await.unwrap();
        assert!(!report.quality.gate_passed);
        assert_eq!(report.compare.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn quick_compare_bypasses_gate() {
        let runner = test_runner();
        let bytes = synth_wav(0.05, 150.0);
        let options = RunOptions::default();
        let report = runner.quick_compare(&bytes, Some("audio/wav"), "cat", &options).await.unwrap();
        assert!(report.quality.gate_passed);
    }
}
