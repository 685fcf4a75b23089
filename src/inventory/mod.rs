//! Inventory & Normalizer (spec §4.2): per-language resources plus the
//! `normalize` pipeline stage.

pub mod langpack;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::types::{EvaluationLevel, IpaToken, TokenSequence};

const DEFAULT_DERIVE_PASS_CAP: u32 = 8;

/// A single derive rule (phonemic → allophonic). `left`/`right` are
/// single-token context patterns; an empty pattern matches any neighbor,
/// including the sequence boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveRule {
    pub left: String,
    pub right: String,
    pub from: String,
    pub to: String,
}

impl DeriveRule {
    fn left_matches(&self, prev: Option<&str>) -> bool {
        self.left.is_empty() || prev == Some(self.left.as_str())
    }

    fn right_matches(&self, next: Option<&str>) -> bool {
        self.right.is_empty() || next == Some(self.right.as_str())
    }
}

/// Per-language resource set (spec §3 `Inventory`).
#[derive(Debug, Clone)]
pub struct Inventory {
    pub lang_id: String,
    pub canonical: HashSet<String>,
    pub aliases: HashMap<String, String>,
    pub collapse: HashMap<String, String>,
    pub derive: Vec<DeriveRule>,
    pub derive_pass_cap: u32,
}

impl Inventory {
    pub fn new(lang_id: impl Into<String>) -> Self {
        Self {
            lang_id: lang_id.into(),
            canonical: HashSet::new(),
            aliases: HashMap::new(),
            collapse: HashMap::new(),
            derive: Vec::new(),
            derive_pass_cap: DEFAULT_DERIVE_PASS_CAP,
        }
    }

    /// Validates that neither the alias graph nor the collapse graph
    /// contains a cycle, and that the canonical set is disjoint from alias
    /// keys (spec §3 invariants). Loaders call this once at construction.
    pub fn validate(&self) -> Result<()> {
        check_acyclic(&self.aliases, "alias")?;
        check_acyclic(&self.collapse, "collapse")?;
        for key in self.aliases.keys() {
            if self.canonical.contains(key) {
                return Err(PipelineError::config(format!(
                    "canonical set and alias keys overlap on `{key}` in inventory `{}`",
                    self.lang_id
                )));
            }
        }
        Ok(())
    }
}

fn check_acyclic(map: &HashMap<String, String>, kind: &str) -> Result<()> {
    for start in map.keys() {
        let mut seen = HashSet::new();
        let mut cur = start.as_str();
        loop {
            if !seen.insert(cur.to_string()) {
                return Err(PipelineError::config(format!(
                    "{kind} map contains a cycle starting at `{start}`"
                )));
            }
            match map.get(cur) {
                Some(next) => cur = next.as_str(),
                None => break,
            }
        }
    }
    Ok(())
}

fn resolve_fixed_point(token: &str, map: &HashMap<String, String>, kind: &str) -> Result<String> {
    let mut cur = token.to_string();
    let mut seen = HashSet::new();
    loop {
        if !seen.insert(cur.clone()) {
            return Err(PipelineError::config(format!(
                "{kind} map cycle detected while resolving `{token}`"
            )));
        }
        match map.get(&cur) {
            Some(next) => cur = next.clone(),
            None => return Ok(cur),
        }
    }
}

fn apply_derive_pass(tokens: &[String], rules: &[DeriveRule]) -> (Vec<String>, bool) {
    let mut out = Vec::with_capacity(tokens.len());
    let mut fired = false;
    for i in 0..tokens.len() {
        let prev = if i == 0 { None } else { Some(tokens[i - 1].as_str()) };
        let next = tokens.get(i + 1).map(|s| s.as_str());
        let current = tokens[i].as_str();
        let matched = rules
            .iter()
            .find(|r| r.from == current && r.left_matches(prev) && r.right_matches(next));
        match matched {
            Some(rule) => {
                out.push(rule.to.clone());
                fired = true;
            }
            None => out.push(tokens[i].clone()),
        }
    }
    (out, fired)
}

/// Normalizes a raw token sequence against an inventory (spec §4.2).
/// Returns the normalized sequence plus any warnings (unknown tokens pass
/// through unchanged with a recorded warning).
pub fn normalize(
    tokens: &[IpaToken],
    inventory: &Inventory,
    level: EvaluationLevel,
) -> Result<(TokenSequence, Vec<String>)> {
    let mut warnings = Vec::new();

    // Steps 1-2: canonical composition + drop empty/whitespace tokens.
    // `IpaToken` already enforces both at construction time, so this is a
    // defensive re-assertion rather than new work.
    let mut strings: Vec<String> = tokens
        .iter()
        .filter_map(|t| IpaToken::new(t.as_str()))
        .map(|t| t.as_str().to_string())
        .collect();

    // Step 3: alias fixed point.
    for s in strings.iter_mut() {
        *s = resolve_fixed_point(s, &inventory.aliases, "alias")?;
    }

    // Step 4/5: collapse (phonemic) or derive rules (phonetic).
    match level {
        EvaluationLevel::Phonemic => {
            for s in strings.iter_mut() {
                *s = resolve_fixed_point(s, &inventory.collapse, "collapse")?;
            }
        }
        EvaluationLevel::Phonetic => {
            let mut pass = 0;
            loop {
                if pass >= inventory.derive_pass_cap {
                    break;
                }
                let (next, fired) = apply_derive_pass(&strings, &inventory.derive);
                strings = next;
                pass += 1;
                if !fired {
                    break;
                }
            }
        }
    }

    let mut out = Vec::with_capacity(strings.len());
    for s in strings {
        if !inventory.canonical.is_empty() && !inventory.canonical.contains(&s) {
            warn!(token = %s, lang = %inventory.lang_id, "token not in canonical inventory");
            warnings.push(format!("unknown token `{s}` in inventory `{}`", inventory.lang_id));
        }
        match IpaToken::new(&s) {
            Some(tok) => out.push(tok),
            None => continue,
        }
    }

    Ok((out, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(strs: &[&str]) -> Vec<IpaToken> {
        strs.iter().map(|s| IpaToken::new(*s).unwrap()).collect()
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut inv = Inventory::new("test");
        inv.aliases.insert("ã".to_string(), "a".to_string());
        inv.canonical.insert("a".to_string());
        inv.canonical.insert("b".to_string());
        let input = toks(&["ã", "b"]);
        let (once, _) = normalize(&input, &inv, EvaluationLevel::Phonemic).unwrap();
        let (twice, _) = normalize(&once, &inv, EvaluationLevel::Phonemic).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn alias_cycle_is_rejected() {
        let mut inv = Inventory::new("test");
        inv.aliases.insert("x".to_string(), "y".to_string());
        inv.aliases.insert("y".to_string(), "x".to_string());
        let input = toks(&["x"]);
        assert!(normalize(&input, &inv, EvaluationLevel::Phonemic).is_err());
    }

    #[test]
    fn unknown_token_passes_through_with_warning() {
        let mut inv = Inventory::new("test");
        inv.canonical.insert("a".to_string());
        let input = toks(&["z"]);
        let (out, warnings) = normalize(&input, &inv, EvaluationLevel::Phonemic).unwrap();
        assert_eq!(out[0].as_str(), "z");
        assert!(!warnings.is_empty());
    }

    #[test]
    fn derive_rules_apply_left_to_right_with_pass_cap() {
        let mut inv = Inventory::new("test");
        inv.canonical.insert("a".to_string());
        inv.canonical.insert("b".to_string());
        inv.derive.push(DeriveRule {
            left: String::new(),
            right: String::new(),
            from: "a".to_string(),
            to: "b".to_string(),
        });
        let input = toks(&["a", "a"]);
        let (out, _) = normalize(&input, &inv, EvaluationLevel::Phonetic).unwrap();
        assert_eq!(out.iter().map(|t| t.as_str()).collect::<Vec<_>>(), vec!["b", "b"]);
    }

    #[test]
    fn collapse_applies_only_at_phonemic_level() {
        let mut inv = Inventory::new("test");
        inv.collapse.insert("ɾ".to_string(), "d".to_string());
        inv.canonical.insert("d".to_string());
        inv.canonical.insert("ɾ".to_string());
        let input = toks(&["ɾ"]);
        let (phonemic, _) = normalize(&input, &inv, EvaluationLevel::Phonemic).unwrap();
        let (phonetic, _) = normalize(&input, &inv, EvaluationLevel::Phonetic).unwrap();
        assert_eq!(phonemic[0].as_str(), "d");
        assert_eq!(phonetic[0].as_str(), "ɾ");
    }
}
