//! PronunciaPA demo CLI: wires the kernel's built-in plugins together and
//! runs a single transcribe/compare/feedback request against a WAV file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use pronunciapa::config::PipelineConfig;
use pronunciapa::kernel::Kernel;
use pronunciapa::plugins::builtin::asr_stub::StubAsr;
use pronunciapa::plugins::builtin::comparator_default::DefaultComparator;
use pronunciapa::plugins::builtin::textref_dictionary::DictionaryTextRef;
use pronunciapa::plugins::builtin::textref_grapheme::GraphemeTextRef;
use pronunciapa::plugins::registry::PluginRegistry;
use pronunciapa::types::{CompareMode, EvaluationLevel, RunOptions};

/// PronunciaPA - pronunciation evaluation kernel demo
#[derive(Parser, Debug)]
#[command(name = "pronunciapa")]
#[command(version = "0.1.0")]
#[command(about = "Compares a WAV recording against a reference text", long_about = None)]
struct Args {
    /// Input WAV file (16-bit PCM, any sample rate; resampled internally)
    #[arg(value_name = "AUDIO")]
    audio_file: PathBuf,

    /// Reference text to compare against. When omitted, only transcribes.
    #[arg(long, value_name = "TEXT")]
    reference: Option<String>,

    /// BCP-47-ish language code (e.g. "en", "es")
    #[arg(long, default_value = "en")]
    lang: String,

    /// Path to a pipeline config YAML/JSON file; falls back to the bundled
    /// stub backend + dictionary textref when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Evaluation level: phonemic (collapse diacritics) or phonetic
    #[arg(long, value_enum, default_value = "phonemic")]
    evaluation_level: EvaluationLevelArg,

    /// Comparison mode: casual, objective, or phonetic
    #[arg(long, value_enum, default_value = "objective")]
    compare_mode: CompareModeArg,

    /// Skip the audio quality gate and require_ipa feedback synthesis
    #[arg(long)]
    quick: bool,

    /// Also synthesize feedback (requires --reference)
    #[arg(long)]
    feedback: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EvaluationLevelArg {
    Phonemic,
    Phonetic,
}

impl From<EvaluationLevelArg> for EvaluationLevel {
    fn from(value: EvaluationLevelArg) -> Self {
        match value {
            EvaluationLevelArg::Phonemic => EvaluationLevel::Phonemic,
            EvaluationLevelArg::Phonetic => EvaluationLevel::Phonetic,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CompareModeArg {
    Casual,
    Objective,
    Phonetic,
}

impl From<CompareModeArg> for CompareMode {
    fn from(value: CompareModeArg) -> Self {
        match value {
            CompareModeArg::Casual => CompareMode::Casual,
            CompareModeArg::Objective => CompareMode::Objective,
            CompareModeArg::Phonetic => CompareMode::Phonetic,
        }
    }
}

impl Args {
    fn validate(&self) -> Result<()> {
        ensure!(self.audio_file.exists(), "audio file does not exist: {:?}", self.audio_file);
        ensure!(self.audio_file.is_file(), "audio path is not a file: {:?}", self.audio_file);
        if self.feedback {
            ensure!(self.reference.is_some(), "--feedback requires --reference");
        }
        Ok(())
    }
}

fn builtin_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    registry.register_asr(Arc::new(StubAsr::new()));
    #[cfg(feature = "whisper")]
    {
        if let Ok(path) = std::env::var("PRONUNCIAPA_WHISPER_MODEL") {
            registry.register_asr(Arc::new(pronunciapa::plugins::builtin::asr_whisper::WhisperAsr::new(path)));
        }
    }
    registry.register_textref(Arc::new(DictionaryTextRef::bundled_en()));
    registry.register_textref(Arc::new(DictionaryTextRef::bundled_es()));
    registry.register_textref(Arc::new(GraphemeTextRef::bundled_en()));
    registry.register_comparator(Arc::new(DefaultComparator::new(EvaluationLevel::Phonemic, CompareMode::Objective)));
    registry
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path).with_context(|| format!("failed to load pipeline config {:?}", path)),
        None => Ok(PipelineConfig::default_stub()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    args.validate().context("invalid command-line arguments")?;

    let config = load_config(args.config.as_ref())?;
    let registry = builtin_registry();
    let kernel = Kernel::new(config, registry);

    let bytes = std::fs::read(&args.audio_file).with_context(|| format!("failed to read {:?}", args.audio_file))?;
    let options = RunOptions {
        lang: args.lang.clone(),
        evaluation_level: args.evaluation_level.into(),
        compare_mode: args.compare_mode.into(),
        quick: args.quick,
        ..RunOptions::default()
    };

    match &args.reference {
        None => {
            let report = kernel.transcribe(&bytes, Some("audio/wav"), &options).await.context("transcription failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(reference) => {
            if args.feedback {
                let (full, feedback) = kernel
                    .feedback(&bytes, Some("audio/wav"), reference, &options)
                    .await
                    .context("compare+feedback failed")?;
                println!("{}", serde_json::to_string_pretty(&full)?);
                println!("{}", serde_json::to_string_pretty(&feedback)?);
            } else if args.quick {
                let report = kernel
                    .quick_compare(&bytes, Some("audio/wav"), reference, &options)
                    .await
                    .context("quick compare failed")?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let report = kernel
                    .compare(&bytes, Some("audio/wav"), reference, &options)
                    .await
                    .context("compare failed")?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_without_reference_is_rejected() {
        let args = Args {
            audio_file: PathBuf::from(file!()),
            reference: None,
            lang: "en".to_string(),
            config: None,
            evaluation_level: EvaluationLevelArg::Phonemic,
            compare_mode: CompareModeArg::Objective,
            quick: false,
            feedback: true,
        };
        assert!(args.validate().is_err());
    }
}
