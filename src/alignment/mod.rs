//! Comparator (spec §4.6): Needleman–Wunsch-style weighted alignment,
//! generalized from a monotonic DTW backtrack (the shape this module is
//! grounded on) to full edit distance over `{eq, sub, ins, del}`.

pub mod weights;

pub use weights::Weights;

use crate::features::{self, PhoneFeatures};
use crate::types::{CompareMode, CompareReport, Confidence, EditKind, EditOp, EvaluationLevel, IpaToken};

fn substitution_cost(a: &IpaToken, b: &IpaToken, weights: &Weights) -> f32 {
    if a == b {
        return 0.0;
    }
    match (features::features(a), features::features(b)) {
        (Some(fa), Some(fb)) => weighted_distance(&fa, &fb, weights),
        _ => 1.0,
    }
}

fn weighted_distance(a: &PhoneFeatures, b: &PhoneFeatures, w: &Weights) -> f32 {
    if a.is_vowel() != b.is_vowel() {
        return 1.0;
    }
    let (base, diacritic) = if a.is_vowel() {
        let mut base = 0.0;
        if a.height != b.height {
            base += w.height;
        }
        if a.backness != b.backness {
            base += w.backness;
        }
        if a.rounded != b.rounded {
            base += w.rounding;
        }
        let mut diacritic = 0.0;
        if a.long != b.long {
            diacritic += w.length;
        }
        if a.stressed != b.stressed {
            diacritic += w.stress;
        }
        (base, diacritic)
    } else {
        let mut base = 0.0;
        if a.place != b.place {
            base += w.place;
        }
        if a.manner != b.manner {
            base += w.manner;
        }
        if a.voiced != b.voiced {
            base += w.voicing;
        }
        let mut diacritic = 0.0;
        if a.nasal != b.nasal {
            diacritic += w.nasality;
        }
        if a.long != b.long {
            diacritic += w.length;
        }
        if a.stressed != b.stressed {
            diacritic += w.stress;
        }
        (base, diacritic)
    };
    (base + diacritic * w.diacritic_multiplier).min(1.0)
}

const TIE_EPSILON: f32 = 1e-6;

/// Aligns `reference` against `hypothesis`, producing the edit-operation
/// trace and phone error rate (spec §4.6).
pub fn align(reference: &[IpaToken], hypothesis: &[IpaToken], weights: &Weights) -> (Vec<EditOp>, f32) {
    let m = reference.len();
    let n = hypothesis.len();

    if m == 0 && n == 0 {
        return (Vec::new(), 0.0);
    }
    if m == 0 {
        let ops = hypothesis.iter().map(|h| EditOp::ins(h.clone())).collect();
        return (ops, 1.0);
    }
    if n == 0 {
        let ops = reference.iter().map(|r| EditOp::del(r.clone())).collect();
        return (ops, 1.0);
    }

    let mut dp = vec![vec![0.0f32; n + 1]; m + 1];
    for i in 1..=m {
        dp[i][0] = dp[i - 1][0] + weights.del_cost;
    }
    for j in 1..=n {
        dp[0][j] = dp[0][j - 1] + weights.ins_cost;
    }
    for i in 1..=m {
        for j in 1..=n {
            let sub = dp[i - 1][j - 1] + substitution_cost(&reference[i - 1], &hypothesis[j - 1], weights);
            let del = dp[i - 1][j] + weights.del_cost;
            let ins = dp[i][j - 1] + weights.ins_cost;
            dp[i][j] = sub.min(del).min(ins);
        }
    }

    let total_cost = dp[m][n];
    let mut ops = Vec::new();
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let diag = dp[i - 1][j - 1] + substitution_cost(&reference[i - 1], &hypothesis[j - 1], weights);
            if (diag - dp[i][j]).abs() < TIE_EPSILON {
                let r = reference[i - 1].clone();
                let h = hypothesis[j - 1].clone();
                ops.push(if r == h { EditOp::eq(r) } else { EditOp::sub(r, h) });
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 {
            let up = dp[i - 1][j] + weights.del_cost;
            if (up - dp[i][j]).abs() < TIE_EPSILON {
                ops.push(EditOp::del(reference[i - 1].clone()));
                i -= 1;
                continue;
            }
        }
        ops.push(EditOp::ins(hypothesis[j - 1].clone()));
        j -= 1;
    }
    ops.reverse();

    let per = total_cost / (m.max(n) as f32);
    (ops, per)
}

fn score_from_per(per: f32) -> f32 {
    let rounded = (1.0 - per.min(1.0)) * 100.0;
    (rounded * 100.0).round() / 100.0
}

fn label_confidence(per: f32) -> Confidence {
    if per < 0.1 {
        Confidence::High
    } else {
        Confidence::Normal
    }
}

/// Builds the full `CompareReport` for one comparison (spec §3/§4.6).
pub fn compare(
    reference: &[IpaToken],
    hypothesis: &[IpaToken],
    mode: CompareMode,
    evaluation_level: EvaluationLevel,
) -> CompareReport {
    let weights = Weights::for_mode(mode);
    let (ops, per) = align(reference, hypothesis, &weights);
    CompareReport {
        ops,
        per,
        score: score_from_per(per),
        ref_tokens: reference.to_vec(),
        hyp_tokens: hypothesis.to_vec(),
        mode,
        evaluation_level,
        confidence: label_confidence(per),
        warnings: Vec::new(),
    }
}

/// Swaps `ref <-> hyp` and `ins <-> del` in each op, used to check the
/// symmetry property (spec §8).
pub fn swap_ops(ops: &[EditOp]) -> Vec<EditOp> {
    ops.iter().map(EditOp::swapped).collect()
}
