//! Symmetry, effort, and BFR compliance components
//!
//! Pure clinical component calculators that run alongside the per-muscle
//! scores: left/right symmetry, Borg CR10 effort banding, and the blood flow
//! restriction compliance gate.

use crate::types::BfrSideParameters;

/// Left/right symmetry score.
///
/// `(1 - |left - right| / (left + right)) * 100`, rounded. Two idle sides
/// carry no detectable asymmetry, so 0/0 is defined as fully symmetric.
pub fn symmetry_score(left_total: f64, right_total: f64) -> f64 {
    let sum = left_total + right_total;
    if sum <= 0.0 {
        return 100.0;
    }
    ((1.0 - (left_total - right_total).abs() / sum) * 100.0)
        .round()
        .clamp(0.0, 100.0)
}

/// Effort score from the post-session rating of perceived exertion.
///
/// Borg CR10 bands: 4-6 is the optimal therapeutic band, 3 and 7 acceptable,
/// 2 and 8 suboptimal, anything else (including 0, 1, 9, 10) poor. An absent
/// rating scores a neutral 50, neither penalized nor rewarded.
pub fn effort_score_from_rpe(rpe: Option<f64>) -> f64 {
    let Some(value) = rpe.filter(|v| v.is_finite()) else {
        return 50.0;
    };
    match value.round() as i64 {
        4..=6 => 100.0,
        3 | 7 => 80.0,
        2 | 8 => 60.0,
        _ => 20.0,
    }
}

/// BFR compliance gate.
///
/// Non-compliance on either side is clinically disqualifying: the gate is 0
/// if any side reports `is_compliant = false`, 100 otherwise. A side without
/// BFR parameters does not fail the gate (BFR was not prescribed there).
/// When the compliance flag disagrees with the reported %AOP the flag wins
/// and the mismatch is logged.
pub fn bfr_compliance_gate(
    left: Option<&BfrSideParameters>,
    right: Option<&BfrSideParameters>,
) -> f64 {
    for (side, params) in [("left", left), ("right", right)] {
        let Some(params) = params else { continue };

        if let Some(in_range) = params.pressure_in_range() {
            if in_range != params.is_compliant {
                tracing::warn!(
                    side,
                    is_compliant = params.is_compliant,
                    percentage_aop = ?params.percentage_aop,
                    "BFR compliance flag disagrees with reported %AOP, trusting the flag"
                );
            }
        }

        if !params.is_compliant {
            return 0.0;
        }
    }
    100.0
}
