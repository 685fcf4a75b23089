//! CMU-lexicon-style dictionary TextRef (spec §4.4, §B.1/§B.2 supplement),
//! grounded on `flowalyzer::pronunciation::alignment::dictionary`'s
//! `include_str!` lexicon pattern. Falls back to grapheme mapping per word
//! on a lookup miss, per the "may fall back to a grapheme-level mapping"
//! clause in §4.4.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::error::{PipelineError, Result};
use crate::plugins::builtin::textref_grapheme::GraphemeTextRef;
use crate::plugins::{PluginIdentity, TextRefProvider};
use crate::types::{IpaToken, TokenSequence};

const EN_LEXICON: &str = include_str!("../../../assets/dict/en.txt");
const ES_LEXICON: &str = include_str!("../../../assets/dict/es.txt");

static EN_TABLE: Lazy<HashMap<String, Vec<String>>> = Lazy::new(|| parse_lexicon(EN_LEXICON));
static ES_TABLE: Lazy<HashMap<String, Vec<String>>> = Lazy::new(|| parse_lexicon(ES_LEXICON));

fn parse_lexicon(data: &str) -> HashMap<String, Vec<String>> {
    let mut entries = HashMap::new();
    for line in data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(word) = parts.next() else { continue };
        let phones: Vec<String> = parts.map(|p| p.to_string()).collect();
        if phones.is_empty() {
            continue;
        }
        entries.insert(normalize_word(word), phones);
    }
    entries
}

fn normalize_word(word: &str) -> String {
    word.chars().filter(|c| c.is_alphanumeric()).flat_map(|c| c.to_uppercase()).collect()
}

/// Looks words up in a bundled lexicon, falling back to grapheme mapping for
/// out-of-vocabulary words.
pub struct DictionaryTextRef {
    lang_id: String,
    table: &'static HashMap<String, Vec<String>>,
    fallback: GraphemeTextRef,
}

impl DictionaryTextRef {
    pub fn bundled_en() -> Self {
        Self {
            lang_id: "en".to_string(),
            table: &EN_TABLE,
            fallback: GraphemeTextRef::bundled_en(),
        }
    }

    pub fn bundled_es() -> Self {
        Self {
            lang_id: "es".to_string(),
            table: &ES_TABLE,
            fallback: GraphemeTextRef::bundled_es(),
        }
    }
}

impl PluginIdentity for DictionaryTextRef {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

#[async_trait]
impl TextRefProvider for DictionaryTextRef {
    async fn to_ipa(&self, text: &str, lang: &str) -> Result<TokenSequence> {
        if lang != self.lang_id {
            return Err(PipelineError::config(format!(
                "dictionary textref bundled for `{}` cannot serve `{lang}`",
                self.lang_id
            )));
        }
        if text.trim().is_empty() {
            return Err(PipelineError::invalid_input("empty reference text"));
        }

        let mut tokens = TokenSequence::new();
        for word in text.split_whitespace() {
            let key = normalize_word(word);
            match self.table.get(&key) {
                Some(phones) => {
                    for p in phones {
                        if let Some(tok) = IpaToken::new(p) {
                            tokens.push(tok);
                        }
                    }
                }
                None => {
                    let mut fallback_tokens = self.fallback.to_ipa(word, lang).await?;
                    tokens.append(&mut fallback_tokens);
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn looks_up_known_word() {
        let textref = DictionaryTextRef::bundled_en();
        let tokens = textref.to_ipa("cat", "en").await.unwrap();
        assert_eq!(tokens.iter().map(IpaToken::as_str).collect::<Vec<_>>(), vec!["k", "æ", "t"]);
    }

    #[tokio::test]
    async fn falls_back_to_grapheme_mapping_on_miss() {
        let textref = DictionaryTextRef::bundled_en();
        let tokens = textref.to_ipa("zzqv", "en").await.unwrap();
        assert!(!tokens.is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_text() {
        let textref = DictionaryTextRef::bundled_en();
        assert!(textref.to_ipa("   ", "en").await.is_err());
    }

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let textref = DictionaryTextRef::bundled_en();
        assert!(textref.to_ipa("hola", "es").await.is_err());
    }
}
