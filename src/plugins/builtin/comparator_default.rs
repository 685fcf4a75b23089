//! Default comparator plugin (spec §4.4, §4.6): wraps `alignment::compare`.

use crate::alignment::{self, Weights};
use crate::plugins::{ComparatorPlugin, PluginIdentity};
use crate::types::{CompareReport, EvaluationLevel, IpaToken};

pub struct DefaultComparator {
    evaluation_level: EvaluationLevel,
    mode: crate::types::CompareMode,
}

impl DefaultComparator {
    pub fn new(evaluation_level: EvaluationLevel, mode: crate::types::CompareMode) -> Self {
        Self { evaluation_level, mode }
    }
}

impl PluginIdentity for DefaultComparator {
    fn name(&self) -> &str {
        "default"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

impl ComparatorPlugin for DefaultComparator {
    fn compare(&self, reference: &[IpaToken], hypothesis: &[IpaToken], weights: &Weights) -> CompareReport {
        let (ops, per) = alignment::align(reference, hypothesis, weights);
        let score = (1.0 - per.min(1.0)) * 100.0;
        CompareReport {
            ops,
            per,
            score: (score * 100.0).round() / 100.0,
            ref_tokens: reference.to_vec(),
            hyp_tokens: hypothesis.to_vec(),
            mode: self.mode,
            evaluation_level: self.evaluation_level,
            confidence: if per < 0.1 {
                crate::types::Confidence::High
            } else {
                crate::types::Confidence::Normal
            },
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompareMode;

    #[test]
    fn compare_matches_direct_align_call() {
        let comparator = DefaultComparator::new(EvaluationLevel::Phonemic, CompareMode::Objective);
        let weights = Weights::objective();
        let reference = vec![IpaToken::new("k").unwrap(), IpaToken::new("a").unwrap()];
        let hyp = reference.clone();
        let report = comparator.compare(&reference, &hyp, &weights);
        assert_eq!(report.per, 0.0);
        assert_eq!(report.score, 100.0);
    }
}
