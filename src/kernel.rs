//! Kernel (spec §4.7): holds the plugin registry and pipeline cache, and
//! exposes the public `transcribe`/`compare`/`quick_compare`/`feedback`
//! entry points.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::feedback::{self, FeedbackReport};
use crate::inventory::{self, Inventory};
use crate::pipeline::cache::PipelineCache;
use crate::pipeline::{fingerprint, PipelineRunner};
use crate::plugins::registry::{self, PluginRegistry};
use crate::types::{FullReport, PipelineFingerprint, RunOptions, TranscriptionReport};

/// Constructed once at process start, torn down at shutdown (spec §5: "no
/// process-wide mutable singletons other than the kernel itself").
pub struct Kernel {
    registry: PluginRegistry,
    cache: PipelineCache,
    config: PipelineConfig,
}

impl Kernel {
    pub fn new(config: PipelineConfig, registry: PluginRegistry) -> Self {
        Self {
            registry,
            cache: PipelineCache::new(),
            config,
        }
    }

    fn load_inventory(lang: &str) -> Result<Inventory> {
        inventory::langpack::bundled(lang)
    }

    async fn runner_for(&self, lang: &str, options: &RunOptions) -> Result<Arc<PipelineRunner>> {
        let resolved = registry::resolve(&self.config, lang, &self.registry)?;
        let fp = fingerprint::build(
            &self.config,
            resolved.asr.version(),
            resolved.textref.version(),
            lang,
            options.evaluation_level,
            options.compare_mode,
        );
        let inventory = Arc::new(Self::load_inventory(lang)?);
        let lang = lang.to_string();
        let fp_for_construction = fp.clone();
        self.cache
            .get_or_construct(&fp, || async move {
                let resolved = registry::resolve(&self.config, &lang, &self.registry)?;
                Ok(PipelineRunner::new(fp_for_construction, resolved, inventory, lang))
            })
            .await
    }

    pub async fn transcribe(&self, bytes: &[u8], content_type: Option<&str>, options: &RunOptions) -> Result<TranscriptionReport> {
        let runner = self.runner_for(&options.lang, options).await?;
        runner.transcribe(bytes, content_type, options).await
    }

    pub async fn compare(&self, bytes: &[u8], content_type: Option<&str>, target_text: &str, options: &RunOptions) -> Result<FullReport> {
        let runner = self.runner_for(&options.lang, options).await?;
        runner.compare(bytes, content_type, target_text, options).await
    }

    pub async fn quick_compare(&self, bytes: &[u8], content_type: Option<&str>, target_text: &str, options: &RunOptions) -> Result<FullReport> {
        let runner = self.runner_for(&options.lang, options).await?;
        runner.quick_compare(bytes, content_type, target_text, options).await
    }

    /// Runs `compare` then synthesizes feedback from the resulting report
    /// (spec §6 "Feedback endpoint").
    pub async fn feedback(&self, bytes: &[u8], content_type: Option<&str>, target_text: &str, options: &RunOptions) -> Result<(FullReport, FeedbackReport)> {
        let full = self.compare(bytes, content_type, target_text, options).await?;
        let llm = registry::resolve(&self.config, &options.lang, &self.registry).ok().and_then(|r| r.llm);
        let synthesized = feedback::synthesize(&full.compare, llm.as_deref()).await;
        Ok((full, synthesized))
    }

    /// Invalidates one cached pipeline, or every entry when `fingerprint` is
    /// `None` (spec §4.7 hot-swap). In-flight invocations hold their own
    /// `Arc<PipelineRunner>` and complete on the old runner.
    pub fn reload(&self, fingerprint: Option<&PipelineFingerprint>) {
        match fingerprint {
            Some(fp) => self.cache.invalidate(fp),
            None => self.cache.invalidate_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::asr_stub::StubAsr;
    use crate::plugins::builtin::textref_dictionary::DictionaryTextRef;
    use std::sync::Arc as StdArc;

    fn test_kernel() -> Kernel {
        let registry = PluginRegistry::new();
        registry.register_asr(StdArc::new(StubAsr::new()));
        registry.register_textref(StdArc::new(DictionaryTextRef::bundled_en()));
        Kernel::new(PipelineConfig::default_stub(), registry)
    }

    fn synth_wav(seconds: f32) -> Vec<u8> {
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
                let s = (t * 2.0 * std::f32::consts::PI * 150.0).sin() * 0.5;
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn compare_end_to_end_with_stub_backend() {
        let kernel = test_kernel();
        let options = RunOptions::default();
        let bytes = synth_wav(1.0);
        let report = kernel.compare(&bytes, Some("audio/wav"), "cat", &options).await.unwrap();
        assert_eq!(report.compare.confidence, crate::types::Confidence::Low);
    }

    #[tokio::test]
    async fn reload_all_empties_cache() {
        let kernel = test_kernel();
        let options = RunOptions::default();
        let bytes = synth_wav(1.0);
        kernel.compare(&bytes, Some("audio/wav"), "cat", &options).await.unwrap();
        kernel.reload(None);
    }
}
