//! Language pack file format (spec §6 "Language pack files") and the two
//! bundled reference packs (spec §B.1 supplement).

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::inventory::{DeriveRule, Inventory};

const EN_PACK: &str = include_str!("../../assets/lang/en.yaml");
const ES_PACK: &str = include_str!("../../assets/lang/es.yaml");

#[derive(Debug, Deserialize)]
struct DeriveRuleRecord {
    #[serde(default)]
    left: String,
    #[serde(default)]
    right: String,
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct LangPackFile {
    inventory: Vec<String>,
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    collapse: HashMap<String, String>,
    #[serde(default)]
    derive: Vec<DeriveRuleRecord>,
    #[serde(default)]
    #[allow(dead_code)]
    meta: Option<serde_yaml::Value>,
}

/// Parses a language pack document into an `Inventory`, validating acyclic
/// alias/collapse graphs before returning.
pub fn parse_langpack(lang_id: &str, text: &str) -> Result<Inventory> {
    let file: LangPackFile = serde_yaml::from_str(text)
        .map_err(|e| PipelineError::config(format!("invalid language pack `{lang_id}`: {e}")))?;

    let mut inv = Inventory::new(lang_id);
    inv.canonical = file.inventory.into_iter().collect::<HashSet<_>>();
    inv.aliases = file.aliases;
    inv.collapse = file.collapse;
    inv.derive = file
        .derive
        .into_iter()
        .map(|r| DeriveRule {
            left: r.left,
            right: r.right,
            from: r.from,
            to: r.to,
        })
        .collect();

    inv.validate()?;
    Ok(inv)
}

/// Loads one of the two bundled reference packs (`en`, `es`). Callers with
/// external packs use `parse_langpack` directly and may override/extend
/// these (spec §6).
pub fn bundled(lang_id: &str) -> Result<Inventory> {
    match lang_id {
        "en" => parse_langpack("en", EN_PACK),
        "es" => parse_langpack("es", ES_PACK),
        other => Err(PipelineError::config(format!("no bundled language pack for `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_en_has_no_cycles() {
        let inv = bundled("en").unwrap();
        assert!(!inv.canonical.is_empty());
    }

    #[test]
    fn bundled_es_has_no_cycles() {
        let inv = bundled("es").unwrap();
        assert!(!inv.canonical.is_empty());
    }

    #[test]
    fn unbundled_language_is_a_config_error() {
        assert!(bundled("fr").is_err());
    }
}
