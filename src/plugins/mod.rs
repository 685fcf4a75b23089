//! Plugin contracts (spec §4.4): capability traits, tagged by category, with
//! explicit registration rather than dynamic discovery (spec §9 redesign
//! flag "dynamic plugin discovery via entry points").

pub mod builtin;
pub mod registry;

use async_trait::async_trait;

use crate::alignment::Weights;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::types::{AudioBuffer, CompareReport, Confidence, EvaluationLevel, IpaToken, QualityReport, TokenSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCategory {
    Asr,
    TextRef,
    Comparator,
    Preprocessor,
    Llm,
}

/// What an ASR plugin emits. The kernel rejects a `text`-only backend when
/// the pipeline is configured to `require_ipa` (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Ipa,
    Text,
    None,
}

#[derive(Debug, Clone)]
pub struct AsrMeta {
    pub confidence: Confidence,
    pub backend: String,
}

#[derive(Debug, Clone)]
pub struct AsrResult {
    pub tokens: TokenSequence,
    pub raw_text: Option<String>,
    pub timings: Option<Vec<(u64, u64)>>,
    pub meta: AsrMeta,
}

/// Shared identity fields every plugin declares (spec §4.4).
pub trait PluginIdentity {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn supported_languages(&self) -> Option<&[String]> {
        None
    }
}

#[async_trait]
pub trait AsrProvider: PluginIdentity + Send + Sync {
    fn output_type(&self) -> OutputType;
    async fn transcribe(&self, audio: &AudioBuffer, lang: &str) -> Result<AsrResult>;
}

#[async_trait]
pub trait TextRefProvider: PluginIdentity + Send + Sync {
    async fn to_ipa(&self, text: &str, lang: &str) -> Result<TokenSequence>;
}

pub trait ComparatorPlugin: PluginIdentity + Send + Sync {
    fn compare(&self, reference: &[IpaToken], hypothesis: &[IpaToken], weights: &Weights) -> CompareReport;
}

#[async_trait]
pub trait PreprocessorPlugin: PluginIdentity + Send + Sync {
    async fn process_audio(&self, bytes: &[u8], content_type: Option<&str>) -> Result<(AudioBuffer, QualityReport)>;
    fn normalize_tokens(
        &self,
        tokens: &[IpaToken],
        inventory: &Inventory,
        level: EvaluationLevel,
    ) -> Result<(TokenSequence, Vec<String>)>;
}

#[async_trait]
pub trait LlmProvider: PluginIdentity + Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
