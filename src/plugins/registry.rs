//! Plugin registry and capability validation (spec §4.4, §4.4a).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{BackendSpec, PipelineConfig, PluginSpec};
use crate::error::{PipelineError, Result};
use crate::plugins::builtin::asr_stub::StubAsr;
use crate::plugins::builtin::textref_grapheme::GraphemeTextRef;
use crate::plugins::{AsrProvider, ComparatorPlugin, LlmProvider, PluginIdentity, PreprocessorPlugin, TextRefProvider};

/// Holds every registered plugin instance for the kernel's lifetime.
/// Reads are uncontended (spec §5): registration happens at startup, then
/// the registry is read-mostly.
#[derive(Default)]
pub struct PluginRegistry {
    asr: RwLock<HashMap<String, Arc<dyn AsrProvider>>>,
    textref: RwLock<HashMap<String, Arc<dyn TextRefProvider>>>,
    comparator: RwLock<HashMap<String, Arc<dyn ComparatorPlugin>>>,
    preprocessor: RwLock<HashMap<String, Arc<dyn PreprocessorPlugin>>>,
    llm: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_asr(&self, plugin: Arc<dyn AsrProvider>) {
        self.asr.write().insert(plugin.name().to_string(), plugin);
    }

    pub fn register_textref(&self, plugin: Arc<dyn TextRefProvider>) {
        self.textref.write().insert(plugin.name().to_string(), plugin);
    }

    pub fn register_comparator(&self, plugin: Arc<dyn ComparatorPlugin>) {
        self.comparator.write().insert(plugin.name().to_string(), plugin);
    }

    pub fn register_preprocessor(&self, plugin: Arc<dyn PreprocessorPlugin>) {
        self.preprocessor.write().insert(plugin.name().to_string(), plugin);
    }

    pub fn register_llm(&self, plugin: Arc<dyn LlmProvider>) {
        self.llm.write().insert(plugin.name().to_string(), plugin);
    }

    pub fn asr(&self, name: &str) -> Option<Arc<dyn AsrProvider>> {
        self.asr.read().get(name).cloned()
    }

    pub fn textref(&self, name: &str) -> Option<Arc<dyn TextRefProvider>> {
        self.textref.read().get(name).cloned()
    }

    pub fn comparator(&self, name: &str) -> Option<Arc<dyn ComparatorPlugin>> {
        self.comparator.read().get(name).cloned()
    }

    pub fn preprocessor(&self, name: &str) -> Option<Arc<dyn PreprocessorPlugin>> {
        self.preprocessor.read().get(name).cloned()
    }

    pub fn llm(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.llm.read().get(name).cloned()
    }
}

/// Resolved plugin set for one pipeline composition.
pub struct ResolvedPlugins {
    pub asr: Arc<dyn AsrProvider>,
    pub textref: Arc<dyn TextRefProvider>,
    pub comparator: Option<Arc<dyn ComparatorPlugin>>,
    pub preprocessor: Option<Arc<dyn PreprocessorPlugin>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    /// Non-fatal notices raised while resolving, e.g. a `strict_mode: false`
    /// fallback substitution (spec §7 `ProviderUnavailable`).
    pub warnings: Vec<String>,
}

/// Validates and resolves a `PipelineConfig` against the registry (spec
/// §4.4): output_type vs require_ipa, name/category resolution, and the
/// ASR/TextRef language intersection.
pub fn resolve(config: &PipelineConfig, lang: &str, registry: &PluginRegistry) -> Result<ResolvedPlugins> {
    let mut warnings = Vec::new();
    let asr = resolve_asr(&config.backend, registry, config.strict_mode, &mut warnings)?;
    let textref = resolve_textref(&config.textref, lang, registry, config.strict_mode, &mut warnings)?;

    if config.backend.require_ipa && asr.output_type() != crate::plugins::OutputType::Ipa {
        return Err(PipelineError::config(format!(
            "backend `{}` declares output_type {:?}, which does not satisfy require_ipa",
            asr.name(),
            asr.output_type()
        )));
    }

    if let (Some(asr_langs), Some(textref_langs)) = (asr.supported_languages(), textref.supported_languages()) {
        let supported = asr_langs.iter().any(|l| l == lang) && textref_langs.iter().any(|l| l == lang);
        if !supported {
            return Err(PipelineError::config(format!(
                "language `{lang}` is not in the intersection of `{}` and `{}` support",
                asr.name(),
                textref.name()
            )));
        }
    }

    let comparator = match &config.comparator {
        Some(spec) => Some(
            registry
                .comparator(&spec.name)
                .ok_or_else(|| PipelineError::config(format!("unknown comparator plugin `{}`", spec.name)))?,
        ),
        None => None,
    };

    let preprocessor = match &config.preprocessor {
        Some(spec) => Some(
            registry
                .preprocessor(&spec.name)
                .ok_or_else(|| PipelineError::config(format!("unknown preprocessor plugin `{}`", spec.name)))?,
        ),
        None => None,
    };

    let llm = match &config.llm {
        Some(spec) => Some(
            registry
                .llm(&spec.name)
                .ok_or_else(|| PipelineError::config(format!("unknown llm plugin `{}`", spec.name)))?,
        ),
        None => None,
    };

    Ok(ResolvedPlugins {
        asr,
        textref,
        comparator,
        preprocessor,
        llm,
        warnings,
    })
}

/// Resolves the ASR backend. A missing backend is `ProviderUnavailable`
/// (spec §7): under `strict_mode: false` it is substituted with the
/// documented fallback (`StubAsr`) plus a recorded warning; under
/// `strict_mode: true` it propagates.
fn resolve_asr(spec: &BackendSpec, registry: &PluginRegistry, strict_mode: bool, warnings: &mut Vec<String>) -> Result<Arc<dyn AsrProvider>> {
    match registry.asr(&spec.name) {
        Some(plugin) => Ok(plugin),
        None => {
            let err = PipelineError::provider_unavailable(spec.name.clone(), "asr backend not registered");
            if strict_mode {
                return Err(err);
            }
            warnings.push(format!("asr backend `{}` unavailable, falling back to `stub`", spec.name));
            Ok(Arc::new(StubAsr::new()))
        }
    }
}

/// Resolves the TextRef plugin with the same `strict_mode` policy as
/// [`resolve_asr`]; the documented fallback is the bundled grapheme-level
/// TextRef for `lang`, when one exists.
fn resolve_textref(
    spec: &PluginSpec,
    lang: &str,
    registry: &PluginRegistry,
    strict_mode: bool,
    warnings: &mut Vec<String>,
) -> Result<Arc<dyn TextRefProvider>> {
    match registry.textref(&spec.name) {
        Some(plugin) => Ok(plugin),
        None => {
            let err = PipelineError::provider_unavailable(spec.name.clone(), "textref plugin not registered");
            if strict_mode {
                return Err(err);
            }
            match grapheme_fallback(lang) {
                Some(fallback) => {
                    warnings.push(format!("textref plugin `{}` unavailable, falling back to `grapheme`", spec.name));
                    Ok(fallback)
                }
                None => Err(err),
            }
        }
    }
}

fn grapheme_fallback(lang: &str) -> Option<Arc<dyn TextRefProvider>> {
    match lang {
        "en" => Some(Arc::new(GraphemeTextRef::bundled_en())),
        "es" => Some(Arc::new(GraphemeTextRef::bundled_es())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::{asr_stub::StubAsr, textref_dictionary::DictionaryTextRef};

    #[test]
    fn resolves_registered_backend_and_textref() {
        let registry = PluginRegistry::new();
        registry.register_asr(Arc::new(StubAsr::new()));
        registry.register_textref(Arc::new(DictionaryTextRef::bundled_en()));

        let config = PipelineConfig::default_stub();
        let resolved = resolve(&config, "en", &registry).unwrap();
        assert_eq!(resolved.asr.name(), "stub");
        assert_eq!(resolved.textref.name(), "dictionary");
    }

    #[test]
    fn unknown_backend_falls_back_to_stub_when_not_strict() {
        let registry = PluginRegistry::new();
        registry.register_textref(Arc::new(DictionaryTextRef::bundled_en()));
        let mut config = PipelineConfig::default_stub();
        config.backend.name = "ghost-asr".to_string();
        let resolved = resolve(&config, "en", &registry).unwrap();
        assert_eq!(resolved.asr.name(), "stub");
        assert!(resolved.warnings.iter().any(|w| w.contains("ghost-asr")));
    }

    #[test]
    fn unknown_backend_propagates_under_strict_mode() {
        let registry = PluginRegistry::new();
        registry.register_textref(Arc::new(DictionaryTextRef::bundled_en()));
        let mut config = PipelineConfig::default_stub();
        config.backend.name = "ghost-asr".to_string();
        config.strict_mode = true;
        let err = resolve(&config, "en", &registry).unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable { .. }));
    }

    #[test]
    fn unknown_textref_falls_back_to_grapheme_when_not_strict() {
        let registry = PluginRegistry::new();
        registry.register_asr(Arc::new(StubAsr::new()));
        let mut config = PipelineConfig::default_stub();
        config.textref.name = "ghost-textref".to_string();
        let resolved = resolve(&config, "en", &registry).unwrap();
        assert_eq!(resolved.textref.name(), "grapheme");
        assert!(resolved.warnings.iter().any(|w| w.contains("ghost-textref")));
    }
}
