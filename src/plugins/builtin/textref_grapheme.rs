//! Grapheme-level G2P fallback TextRef (spec §4.4, §B.2 supplement): maps
//! each letter to a single rough phone. Used when a word is out of
//! vocabulary for a preferred provider, never as the primary reference
//! source for a well-resourced language.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::error::{PipelineError, Result};
use crate::plugins::{PluginIdentity, TextRefProvider};
use crate::types::{IpaToken, TokenSequence};

static EN_GRAPHEMES: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('a', "æ"), ('b', "b"), ('c', "k"), ('d', "d"), ('e', "ɛ"), ('f', "f"), ('g', "ɡ"),
        ('h', "h"), ('i', "ɪ"), ('j', "dʒ"), ('k', "k"), ('l', "l"), ('m', "m"), ('n', "n"),
        ('o', "ɑ"), ('p', "p"), ('q', "k"), ('r', "ɹ"), ('s', "s"), ('t', "t"), ('u', "ʌ"),
        ('v', "v"), ('w', "w"), ('x', "k"), ('y', "j"), ('z', "z"),
    ])
});

static ES_GRAPHEMES: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('a', "a"), ('b', "b"), ('c', "k"), ('d', "d"), ('e', "e"), ('f', "f"), ('g', "ɡ"),
        ('h', ""), ('i', "i"), ('j', "x"), ('k', "k"), ('l', "l"), ('m', "m"), ('n', "n"),
        ('ñ', "ɲ"), ('o', "o"), ('p', "p"), ('q', "k"), ('r', "r"), ('s', "s"), ('t', "t"),
        ('u', "u"), ('v', "b"), ('w', "w"), ('x', "k"), ('y', "j"), ('z', "s"),
    ])
});

/// Per-language letter-to-phone table.
pub struct GraphemeTextRef {
    lang_id: String,
    table: &'static HashMap<char, &'static str>,
}

impl GraphemeTextRef {
    pub fn bundled_en() -> Self {
        Self {
            lang_id: "en".to_string(),
            table: &EN_GRAPHEMES,
        }
    }

    pub fn bundled_es() -> Self {
        Self {
            lang_id: "es".to_string(),
            table: &ES_GRAPHEMES,
        }
    }
}

impl PluginIdentity for GraphemeTextRef {
    fn name(&self) -> &str {
        "grapheme"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

#[async_trait]
impl TextRefProvider for GraphemeTextRef {
    async fn to_ipa(&self, text: &str, lang: &str) -> Result<TokenSequence> {
        if lang != self.lang_id {
            return Err(PipelineError::config(format!(
                "grapheme textref bundled for `{}` cannot serve `{lang}`",
                self.lang_id
            )));
        }
        if text.trim().is_empty() {
            return Err(PipelineError::invalid_input("empty reference text"));
        }

        let mut tokens = TokenSequence::new();
        for ch in text.to_lowercase().chars() {
            if let Some(phone) = self.table.get(&ch) {
                if let Some(tok) = IpaToken::new(*phone) {
                    tokens.push(tok);
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
    async fn maps_each_letter_to_one_phone() {
        let textref = GraphemeTextRef::bundled_en();
        let tokens = textref.to_ipa("cat", "en").await.unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[tokio::test]
    async fn skips_unmapped_characters_like_h_in_spanish() {
        let textref = GraphemeTextRef::bundled_es();
        let tokens = textref.to_ipa("hola", "es").await.unwrap();
        assert_eq!(tokens.iter().map(IpaToken::as_str).collect::<Vec<_>>(), vec!["o", "l", "a"]);
    }
}
