//! Core data model shared across the evaluation kernel (spec §3).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// One phone: a base letter plus any combining diacritics, length mark, or
/// stress mark. Always compared after Unicode canonical composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpaToken(String);

impl IpaToken {
    /// Builds a token, normalizing to canonical composition (NFC) and
    /// rejecting whitespace-only input. Whitespace is never a token
    /// (spec §3 IpaToken invariant).
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let composed: String = raw.as_ref().nfc().collect();
        let trimmed = composed.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base letter with all combining diacritics stripped (used by the
    /// feature table's diacritic-distance bound, spec §4.1).
    pub fn base(&self) -> String {
        self.0.chars().filter(|c| !is_combining_mark(*c)).collect()
    }

    pub fn has_diacritics(&self) -> bool {
        self.base().chars().count() != self.0.chars().count()
    }
}

impl fmt::Display for IpaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F // combining diacritical marks
        | 0x02B0..=0x02FF // spacing modifier letters (length, aspiration, stress-adjacent)
        | 0x1DC0..=0x1DFF
    )
}

/// Ordered, immutable sequence of `IpaToken`s produced by a provider.
pub type TokenSequence = Vec<IpaToken>;

/// Renders a token sequence as the space-joined IPA string used in §6's
/// transcribe/compare response payloads.
pub fn join_ipa(tokens: &[IpaToken]) -> String {
    tokens
        .iter()
        .map(IpaToken::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// PCM samples at a known sample rate/channel count. The audio front-end's
/// output is always 16 kHz mono 16-bit signed (represented here as `i16` for
/// fidelity to the wire format, with helpers to view as normalized `f32`).
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u8,
}

impl AudioBuffer {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(
            self.samples.len() as f64 / self.channels.max(1) as f64 / self.sample_rate as f64,
        )
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }

    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            samples: samples
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                .collect(),
            sample_rate,
            channels: 1,
        }
    }
}

/// Produced by the audio front-end; surfaced in the final report (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub duration_ms: u64,
    pub speech_ratio: f32,
    pub dbfs: f32,
    pub clipped: bool,
    pub segments: Vec<(u64, u64)>,
    pub warnings: Vec<String>,
    pub gate_passed: bool,
}

/// Evaluation granularity (spec §3 RunOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationLevel {
    Phonemic,
    Phonetic,
}

impl Default for EvaluationLevel {
    fn default() -> Self {
        Self::Phonemic
    }
}

/// Selects the weight table used by the comparator (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    Casual,
    Objective,
    Phonetic,
}

impl Default for CompareMode {
    fn default() -> Self {
        Self::Objective
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLevel {
    Casual,
    Precise,
}

impl Default for FeedbackLevel {
    fn default() -> Self {
        Self::Casual
    }
}

/// Per-request options (spec §3). All fields default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub lang: String,
    pub evaluation_level: EvaluationLevel,
    pub compare_mode: CompareMode,
    pub feedback_level: FeedbackLevel,
    pub require_ipa: bool,
    pub quick: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            evaluation_level: EvaluationLevel::Phonemic,
            compare_mode: CompareMode::Objective,
            feedback_level: FeedbackLevel::Casual,
            require_ipa: true,
            quick: false,
        }
    }
}

/// A single aligned edit (spec §3). `eq`/`sub` populate both fields; `ins`
/// has `ref_token = None`; `del` has `hyp_token = None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOp {
    pub op: EditKind,
    pub ref_token: Option<IpaToken>,
    pub hyp_token: Option<IpaToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Eq,
    Sub,
    Ins,
    Del,
}

impl EditOp {
    pub fn eq(t: IpaToken) -> Self {
        Self {
            op: EditKind::Eq,
            ref_token: Some(t.clone()),
            hyp_token: Some(t),
        }
    }

    pub fn sub(r: IpaToken, h: IpaToken) -> Self {
        Self {
            op: EditKind::Sub,
            ref_token: Some(r),
            hyp_token: Some(h),
        }
    }

    pub fn ins(h: IpaToken) -> Self {
        Self {
            op: EditKind::Ins,
            ref_token: None,
            hyp_token: Some(h),
        }
    }

    pub fn del(r: IpaToken) -> Self {
        Self {
            op: EditKind::Del,
            ref_token: Some(r),
            hyp_token: None,
        }
    }

    /// Swaps `ref_token <-> hyp_token` and `ins <-> del`, used by the
    /// symmetry property in spec §8.
    pub fn swapped(&self) -> Self {
        let op = match self.op {
            EditKind::Ins => EditKind::Del,
            EditKind::Del => EditKind::Ins,
            other => other,
        };
        Self {
            op,
            ref_token: self.hyp_token.clone(),
            hyp_token: self.ref_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Normal,
    High,
}

/// Output of the comparator (spec §3/§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareReport {
    pub ops: Vec<EditOp>,
    pub per: f32,
    pub score: f32,
    pub ref_tokens: TokenSequence,
    pub hyp_tokens: TokenSequence,
    pub mode: CompareMode,
    pub evaluation_level: EvaluationLevel,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// Deterministic key over the plugin composition, language, evaluation
/// level, and compare mode (spec §3/§4.7). Taken only over immutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineFingerprint(pub String);

impl fmt::Display for PipelineFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finished transcription (no reference comparison), matching the
/// transcribe endpoint's output shape (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionReport {
    pub tokens: TokenSequence,
    pub raw_text: Option<String>,
    pub lang: String,
    pub backend: String,
    pub quality: QualityReport,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// The full compare-endpoint output: quality-gated pipeline result plus the
/// compare report (spec §6 "Compare endpoint").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullReport {
    pub quality: QualityReport,
    pub compare: CompareReport,
    pub backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipa_token_rejects_whitespace_only() {
        assert!(IpaToken::new("   ").is_none());
        assert!(IpaToken::new("").is_none());
    }

    #[test]
    fn ipa_token_normalizes_canonical_composition() {
        // "o" + combining acute (U+0301) should compose to U+00F3 "ó".
        let decomposed = IpaToken::new("o\u{0301}").unwrap();
        let composed = IpaToken::new("\u{00F3}").unwrap();
        assert_eq!(decomposed.as_str(), composed.as_str());
    }

    #[test]
    fn base_strips_diacritics() {
        let t = IpaToken::new("t\u{0361}s").unwrap(); // t͡s with tie bar
        assert!(t.has_diacritics());
        assert_eq!(t.base(), "ts");
    }

    #[test]
    fn edit_op_swap_is_involutive() {
        let op = EditOp::sub(IpaToken::new("a").unwrap(), IpaToken::new("o").unwrap());
        assert_eq!(op.swapped().swapped(), op);
        let ins = EditOp::ins(IpaToken::new("e").unwrap());
        assert_eq!(ins.swapped().op, EditKind::Del);
    }
}
