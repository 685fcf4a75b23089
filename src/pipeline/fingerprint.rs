//! Pipeline fingerprint construction (spec §3, §4.7): a deterministic key
//! over the plugin composition, language, evaluation level, and compare
//! mode. Taken only over immutable fields (spec §9 "cache keys built from
//! mutable state").

use crate::config::PipelineConfig;
use crate::types::{CompareMode, EvaluationLevel, PipelineFingerprint};

/// Builds a fingerprint from the plugin names/versions a resolved pipeline
/// was constructed from, plus the request-shaping fields that change which
/// weights/inventory get used.
pub fn build(
    config: &PipelineConfig,
    asr_version: &str,
    textref_version: &str,
    lang: &str,
    evaluation_level: EvaluationLevel,
    compare_mode: CompareMode,
) -> PipelineFingerprint {
    let comparator_name = config.comparator.as_ref().map(|c| c.name.as_str()).unwrap_or("default");
    let preprocessor_name = config.preprocessor.as_ref().map(|p| p.name.as_str()).unwrap_or("builtin");
    let llm_name = config.llm.as_ref().map(|l| l.name.as_str()).unwrap_or("none");

    let key = format!(
        "{}@{}|{}@{}|{}|{}|{}|{}|{:?}|{:?}",
        config.backend.name,
        asr_version,
        config.textref.name,
        textref_version,
        comparator_name,
        preprocessor_name,
        llm_name,
        lang,
        evaluation_level,
        compare_mode,
    );
    PipelineFingerprint(key)
}
