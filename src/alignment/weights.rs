//! Weight tables by compare mode (spec §4.5).

use crate::types::CompareMode;

/// Costs used by the comparator's dynamic program (spec §4.6). Substitution
/// cost additionally scales the feature table's categorical weights; `ins`
/// and `del` are flat per-mode costs.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub place: f32,
    pub manner: f32,
    pub voicing: f32,
    pub nasality: f32,
    pub length: f32,
    pub stress: f32,
    pub height: f32,
    pub backness: f32,
    pub rounding: f32,
    pub ins_cost: f32,
    pub del_cost: f32,
    pub diacritic_multiplier: f32,
}

impl Weights {
    /// `casual`: reduced categorical weights, cheaper ins/del, diacritics
    /// ignored entirely (spec §4.5).
    pub fn casual() -> Self {
        Self {
            place: 0.25,
            manner: 0.20,
            voicing: 0.10,
            nasality: 0.0,
            length: 0.0,
            stress: 0.0,
            height: 0.25,
            backness: 0.20,
            rounding: 0.10,
            ins_cost: 0.7,
            del_cost: 0.7,
            diacritic_multiplier: 1.0,
        }
    }

    /// `objective`: the default §4.1 feature weights, full ins/del cost,
    /// diacritics count normally.
    pub fn objective() -> Self {
        Self {
            place: 0.35,
            manner: 0.25,
            voicing: 0.15,
            nasality: 0.05,
            length: 0.05,
            stress: 0.02,
            height: 0.35,
            backness: 0.30,
            rounding: 0.15,
            ins_cost: 1.0,
            del_cost: 1.0,
            diacritic_multiplier: 1.0,
        }
    }

    /// `phonetic`: same as `objective` but diacritics weighted 2x; callers
    /// are also responsible for skipping collapse during normalization
    /// (spec §4.5), which this type does not itself enforce.
    pub fn phonetic() -> Self {
        Self {
            diacritic_multiplier: 2.0,
            ..Self::objective()
        }
    }

    pub fn for_mode(mode: CompareMode) -> Self {
        match mode {
            CompareMode::Casual => Self::casual(),
            CompareMode::Objective => Self::objective(),
            CompareMode::Phonetic => Self::phonetic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casual_ignores_diacritics() {
        let w = Weights::casual();
        assert_eq!(w.nasality, 0.0);
        assert_eq!(w.length, 0.0);
        assert_eq!(w.stress, 0.0);
    }

    #[test]
    fn phonetic_doubles_diacritic_weight_relative_to_objective() {
        assert_eq!(Weights::phonetic().diacritic_multiplier, 2.0 * Weights::objective().diacritic_multiplier);
    }
}
