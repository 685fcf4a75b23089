//! Phone Feature Table (spec §4.1): static articulatory data and a
//! feature-weighted distance metric. Pure lookup, no state.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::types::IpaToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manner {
    Stop,
    Fricative,
    Affricate,
    Nasal,
    Lateral,
    Approximant,
    Trill,
    Tap,
    Vowel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Bilabial,
    Labiodental,
    Dental,
    Alveolar,
    Postalveolar,
    Retroflex,
    Palatal,
    Velar,
    Uvular,
    Pharyngeal,
    Glottal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Height {
    High,
    MidHigh,
    Mid,
    MidLow,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backness {
    Front,
    Central,
    Back,
}

/// One phone's articulatory feature record (spec §3 `PhoneFeatures`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhoneFeatures {
    pub manner: Manner,
    pub place: Place,
    pub voiced: bool,
    pub height: Option<Height>,
    pub backness: Option<Backness>,
    pub rounded: bool,
    pub nasal: bool,
    pub long: bool,
    pub stressed: bool,
}

impl PhoneFeatures {
    const fn consonant(manner: Manner, place: Place, voiced: bool, nasal: bool) -> Self {
        Self {
            manner,
            place,
            voiced,
            height: None,
            backness: None,
            rounded: false,
            nasal,
            long: false,
            stressed: false,
        }
    }

    const fn vowel(height: Height, backness: Backness, rounded: bool) -> Self {
        Self {
            manner: Manner::Vowel,
            place: Place::None,
            voiced: true,
            height: Some(height),
            backness: Some(backness),
            rounded,
            nasal: false,
            long: false,
            stressed: false,
        }
    }

    pub fn is_vowel(&self) -> bool {
        self.manner == Manner::Vowel
    }
}

const LENGTH_MARK: char = '\u{02D0}';
const PRIMARY_STRESS: char = '\u{02C8}';
const SECONDARY_STRESS: char = '\u{02CC}';
const NASALIZATION: char = '\u{0303}';

static TABLE: Lazy<HashMap<&'static str, PhoneFeatures>> = Lazy::new(|| {
    use Backness::*;
    use Height::*;
    use Manner::*;
    use Place::*;

    let mut m = HashMap::new();

    // Consonants (English + Spanish coverage).
    m.insert("p", PhoneFeatures::consonant(Stop, Bilabial, false, false));
    m.insert("b", PhoneFeatures::consonant(Stop, Bilabial, true, false));
    m.insert("t", PhoneFeatures::consonant(Stop, Alveolar, false, false));
    m.insert("d", PhoneFeatures::consonant(Stop, Alveolar, true, false));
    m.insert("k", PhoneFeatures::consonant(Stop, Velar, false, false));
    m.insert("ɡ", PhoneFeatures::consonant(Stop, Velar, true, false));
    m.insert("g", PhoneFeatures::consonant(Stop, Velar, true, false));
    m.insert("ʔ", PhoneFeatures::consonant(Stop, Glottal, false, false));

    m.insert("m", PhoneFeatures::consonant(Nasal, Bilabial, true, true));
    m.insert("n", PhoneFeatures::consonant(Nasal, Alveolar, true, true));
    m.insert("ŋ", PhoneFeatures::consonant(Nasal, Velar, true, true));
    m.insert("ɲ", PhoneFeatures::consonant(Nasal, Palatal, true, true));

    m.insert("f", PhoneFeatures::consonant(Fricative, Labiodental, false, false));
    m.insert("v", PhoneFeatures::consonant(Fricative, Labiodental, true, false));
    m.insert("θ", PhoneFeatures::consonant(Fricative, Dental, false, false));
    m.insert("ð", PhoneFeatures::consonant(Fricative, Dental, true, false));
    m.insert("s", PhoneFeatures::consonant(Fricative, Alveolar, false, false));
    m.insert("z", PhoneFeatures::consonant(Fricative, Alveolar, true, false));
    m.insert("ʃ", PhoneFeatures::consonant(Fricative, Postalveolar, false, false));
    m.insert("ʒ", PhoneFeatures::consonant(Fricative, Postalveolar, true, false));
    m.insert("x", PhoneFeatures::consonant(Fricative, Velar, false, false));
    m.insert("ɣ", PhoneFeatures::consonant(Fricative, Velar, true, false));
    m.insert("β", PhoneFeatures::consonant(Fricative, Bilabial, true, false));
    m.insert("h", PhoneFeatures::consonant(Fricative, Glottal, false, false));

    m.insert("tʃ", PhoneFeatures::consonant(Affricate, Postalveolar, false, false));
    m.insert("dʒ", PhoneFeatures::consonant(Affricate, Postalveolar, true, false));

    m.insert("l", PhoneFeatures::consonant(Lateral, Alveolar, true, false));
    m.insert("ʎ", PhoneFeatures::consonant(Lateral, Palatal, true, false));

    m.insert("r", PhoneFeatures::consonant(Trill, Alveolar, true, false));
    m.insert("ɾ", PhoneFeatures::consonant(Tap, Alveolar, true, false));

    m.insert("ɹ", PhoneFeatures::consonant(Approximant, Alveolar, true, false));
    m.insert("j", PhoneFeatures::consonant(Approximant, Palatal, true, false));
    m.insert("w", PhoneFeatures::consonant(Approximant, Velar, true, false));

    // Vowels.
    m.insert("i", PhoneFeatures::vowel(High, Front, false));
    m.insert("ɪ", PhoneFeatures::vowel(MidHigh, Front, false));
    m.insert("e", PhoneFeatures::vowel(MidHigh, Front, false));
    m.insert("ɛ", PhoneFeatures::vowel(MidLow, Front, false));
    m.insert("æ", PhoneFeatures::vowel(Low, Front, false));
    m.insert("a", PhoneFeatures::vowel(Low, Front, false));
    m.insert("ɑ", PhoneFeatures::vowel(Low, Back, false));
    m.insert("ɒ", PhoneFeatures::vowel(Low, Back, true));
    m.insert("ɔ", PhoneFeatures::vowel(MidLow, Back, true));
    m.insert("o", PhoneFeatures::vowel(MidHigh, Back, true));
    m.insert("ʊ", PhoneFeatures::vowel(MidHigh, Back, true));
    m.insert("u", PhoneFeatures::vowel(High, Back, true));
    m.insert("ʌ", PhoneFeatures::vowel(Mid, Back, false));
    m.insert("ə", PhoneFeatures::vowel(Mid, Central, false));

    m
});

/// Looks up the articulatory features for a token, applying the length,
/// stress, and nasalization marks carried on the original (un-stripped)
/// string on top of the base lookup.
pub fn features(token: &IpaToken) -> Option<PhoneFeatures> {
    let base = token.base();
    let record = TABLE.get(base.as_str())?;
    let raw = token.as_str();
    Some(PhoneFeatures {
        long: record.long || raw.contains(LENGTH_MARK),
        stressed: record.stressed || raw.contains(PRIMARY_STRESS) || raw.contains(SECONDARY_STRESS),
        nasal: record.nasal || raw.contains(NASALIZATION),
        ..*record
    })
}

const CONSONANT_WEIGHTS: ConsonantWeights = ConsonantWeights {
    place: 0.35,
    manner: 0.25,
    voicing: 0.15,
    nasality: 0.05,
    length: 0.05,
    stress: 0.02,
};

const VOWEL_WEIGHTS: VowelWeights = VowelWeights {
    height: 0.35,
    backness: 0.30,
    rounding: 0.15,
    length: 0.10,
    stress: 0.05,
};

struct ConsonantWeights {
    place: f32,
    manner: f32,
    voicing: f32,
    nasality: f32,
    length: f32,
    stress: f32,
}

struct VowelWeights {
    height: f32,
    backness: f32,
    rounding: f32,
    length: f32,
    stress: f32,
}

/// Feature-weighted distance between two phones (spec §4.1). Symmetric,
/// zero iff features are equal, bounded by 1.0.
pub fn feature_distance(a: &PhoneFeatures, b: &PhoneFeatures) -> f32 {
    if a.is_vowel() != b.is_vowel() {
        return 1.0;
    }
    let d = if a.is_vowel() {
        let w = &VOWEL_WEIGHTS;
        let mut d = 0.0;
        if a.height != b.height {
            d += w.height;
        }
        if a.backness != b.backness {
            d += w.backness;
        }
        if a.rounded != b.rounded {
            d += w.rounding;
        }
        if a.long != b.long {
            d += w.length;
        }
        if a.stressed != b.stressed {
            d += w.stress;
        }
        d
    } else {
        let w = &CONSONANT_WEIGHTS;
        let mut d = 0.0;
        if a.place != b.place {
            d += w.place;
        }
        if a.manner != b.manner {
            d += w.manner;
        }
        if a.voiced != b.voiced {
            d += w.voicing;
        }
        if a.nasal != b.nasal {
            d += w.nasality;
        }
        if a.long != b.long {
            d += w.length;
        }
        if a.stressed != b.stressed {
            d += w.stress;
        }
        d
    };
    d.min(1.0)
}

/// Distance between two tokens, looking up the feature table for each.
/// Unknown tokens yield the maximum distance (spec §3 sentinel invariant).
pub fn distance(a: &IpaToken, b: &IpaToken) -> f32 {
    match (features(a), features(b)) {
        (Some(fa), Some(fb)) => feature_distance(&fa, &fb),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_features() {
        let t = IpaToken::new("a").unwrap();
        assert_eq!(distance(&t, &t), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = IpaToken::new("t").unwrap();
        let b = IpaToken::new("d").unwrap();
        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn vowel_consonant_mismatch_is_maximal() {
        let a = IpaToken::new("a").unwrap();
        let b = IpaToken::new("t").unwrap();
        assert_eq!(distance(&a, &b), 1.0);
    }

    #[test]
    fn unknown_token_yields_sentinel_distance() {
        let known = IpaToken::new("a").unwrap();
        let unknown = IpaToken::new("😀").unwrap();
        assert_eq!(distance(&known, &unknown), 1.0);
    }

    #[test]
    fn base_token_distance_bounded_by_point_one_five() {
        let plain = IpaToken::new("a").unwrap();
        let long_stressed = IpaToken::new("\u{02C8}a\u{02D0}").unwrap();
        assert!(distance(&plain, &long_stressed) <= 0.15 + 1e-6);
    }

    #[test]
    fn distance_bounded_by_one() {
        let a = IpaToken::new("p").unwrap();
        let b = IpaToken::new("ʒ").unwrap();
        assert!(distance(&a, &b) <= 1.0);
    }
}
