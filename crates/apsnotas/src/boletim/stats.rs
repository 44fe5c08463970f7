//! Derived statistics: worst-first ranking and the grade needed on the next
//! assessment to reach the target average.

use crate::boletim::types::{NeedEstimate, RankedSubject, SubjectRecord, TargetParameters};

/// Estimates the grade needed on one remaining assessment for the subject's
/// average to reach `target`, with all assessments weighted equally.
///
/// With k numeric grades summing to s, the next grade x must satisfy
/// (s + x) / (k + 1) >= target. The raw requirement is reported as-is; the
/// capped value clamps it to the portal's 0..=10 scale, so 0 means "already
/// there" and 10 means "not reachable in one assessment".
pub fn need_to_reach_target(subject: &SubjectRecord, target: f64) -> NeedEstimate {
    if subject.current_average.is_none() {
        return NeedEstimate {
            possible: false,
            reason: Some("no average available".to_string()),
            ..Default::default()
        };
    }

    let numeric: Vec<f64> = subject.grades.iter().filter_map(|cell| cell.value).collect();
    let count = numeric.len();
    let sum: f64 = numeric.iter().sum();

    if count == 0 {
        // An average without numeric cells should not happen; if it does,
        // the only sensible requirement is the target itself.
        return NeedEstimate {
            possible: true,
            required_on_next: Some(target),
            formula: Some(
                "no prior grades; must meet the target on the remaining assessment".to_string(),
            ),
            ..Default::default()
        };
    }

    let required = target * (count as f64 + 1.0) - sum;
    NeedEstimate {
        possible: true,
        required_on_next: Some(required),
        required_on_next_capped: Some(required.clamp(0.0, 10.0)),
        formula: Some(format!("x >= {}*({}) - {}", target, count + 1, sum)),
        ..Default::default()
    }
}

/// Ranks subjects worst average first. Subjects without an average sort
/// last, in their original order; ties also keep their original order.
pub fn rank_worst_first(subjects: &[SubjectRecord], targets: &TargetParameters) -> Vec<RankedSubject> {
    let mut ranked: Vec<RankedSubject> = subjects
        .iter()
        .map(|subject| RankedSubject {
            need_to_reach_target: need_to_reach_target(subject, targets.target_average),
            subject: subject.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        let a_avg = a.subject.current_average.unwrap_or(f64::INFINITY);
        let b_avg = b.subject.current_average.unwrap_or(f64::INFINITY);
        a_avg
            .partial_cmp(&b_avg)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boletim::types::RawGradeCell;

    fn subject(name: &str, raws: &[&str]) -> SubjectRecord {
        SubjectRecord::from_row(
            name.to_string(),
            raws.iter().map(|raw| RawGradeCell::from_raw(raw)).collect(),
        )
    }

    #[test]
    fn test_required_grade_formula() {
        // Two grades summing 13, target 7: x >= 7*3 - 13 = 8.
        let estimate = need_to_reach_target(&subject("Matemática", &["6,0", "7,0"]), 7.0);
        assert!(estimate.possible);
        assert_eq!(estimate.required_on_next, Some(8.0));
        assert_eq!(estimate.required_on_next_capped, Some(8.0));
        assert_eq!(estimate.formula.as_deref(), Some("x >= 7*(3) - 13"));
    }

    #[test]
    fn test_requirement_capped_at_zero() {
        // Already above target: raw requirement is negative, cap is 0.
        let estimate = need_to_reach_target(&subject("História", &["9,5", "9,5"]), 6.0);
        assert_eq!(estimate.required_on_next, Some(-1.0));
        assert_eq!(estimate.required_on_next_capped, Some(0.0));
    }

    #[test]
    fn test_requirement_capped_at_ten() {
        // One grade of 2, target 7: needs 12, which the scale cannot hold.
        let estimate = need_to_reach_target(&subject("Física", &["2,0"]), 7.0);
        assert_eq!(estimate.required_on_next, Some(12.0));
        assert_eq!(estimate.required_on_next_capped, Some(10.0));
    }

    #[test]
    fn test_no_average_is_not_estimable() {
        let estimate = need_to_reach_target(&subject("Artes", &["Faltou"]), 7.0);
        assert!(!estimate.possible);
        assert_eq!(estimate.reason.as_deref(), Some("no average available"));
        assert_eq!(estimate.required_on_next, None);
    }

    #[test]
    fn test_average_without_numeric_cells_asks_for_target() {
        // Defensive branch: an average exists but no cell is numeric. Only
        // constructible by hand, never by SubjectRecord::from_row.
        let odd = SubjectRecord {
            name: "Projeto".to_string(),
            grades: vec![RawGradeCell {
                raw: "pendente".to_string(),
                value: None,
            }],
            current_average: Some(5.0),
        };
        let estimate = need_to_reach_target(&odd, 7.0);
        assert!(estimate.possible);
        assert_eq!(estimate.required_on_next, Some(7.0));
        assert_eq!(estimate.required_on_next_capped, None);
    }

    #[test]
    fn test_worst_first_ordering() {
        let subjects = vec![
            subject("B", &["7,0"]),
            subject("A", &["Faltou"]),
            subject("C", &["4,0"]),
        ];
        let ranked = rank_worst_first(&subjects, &TargetParameters::default());
        let names: Vec<&str> = ranked.iter().map(|r| r.subject.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let subjects = vec![
            subject("Primeiro", &["6,0"]),
            subject("Segundo", &["6,0"]),
        ];
        let ranked = rank_worst_first(&subjects, &TargetParameters::default());
        assert_eq!(ranked[0].subject.name, "Primeiro");
        assert_eq!(ranked[1].subject.name, "Segundo");
    }

    #[test]
    fn test_fractional_values_in_formula() {
        let estimate = need_to_reach_target(&subject("Geografia", &["6,5"]), 7.5);
        assert_eq!(estimate.required_on_next, Some(8.5));
        assert_eq!(estimate.formula.as_deref(), Some("x >= 7.5*(2) - 6.5"));
    }
}
