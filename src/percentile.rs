use std::collections::HashMap;

use crate::models::MetricDirection;

/// Converts one raw metric across a cohort into 0-100 percentiles.
///
/// Tied values share the average of the 1-based ranks they span, so a
/// three-way tie over ranks 2, 3 and 4 all get rank 3. A lone participant
/// always scores 100.
pub fn compute_percentiles(
    cohort: &[(&str, f64)],
    direction: MetricDirection,
) -> HashMap<String, f64> {
    let n = cohort.len();
    let mut result = HashMap::with_capacity(n);

    match n {
        0 => return result,
        1 => {
            result.insert(cohort[0].0.to_string(), 100.0);
            return result;
        }
        _ => {}
    }

    let mut sorted = cohort.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let span = (n - 1) as f64;
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end < n && sorted[end].1 == sorted[start].1 {
            end += 1;
        }
        // A NaN never equals itself; keep it as its own group.
        end = end.max(start + 1);

        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let percentile = match direction {
            MetricDirection::LowerIsBetter => (n as f64 - avg_rank) / span * 100.0,
            MetricDirection::HigherIsBetter => (avg_rank - 1.0) / span * 100.0,
        };

        for (agent_id, _) in &sorted[start..end] {
            result.insert(agent_id.to_string(), percentile);
        }
        start = end;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_cohort_is_empty() {
        assert!(compute_percentiles(&[], MetricDirection::LowerIsBetter).is_empty());
    }

    #[test]
    fn single_member_is_best_either_way() {
        for direction in [MetricDirection::LowerIsBetter, MetricDirection::HigherIsBetter] {
            let result = compute_percentiles(&[("a", 512.0)], direction);
            assert_eq!(result["a"], 100.0);
        }
    }

    #[test]
    fn lower_is_better_puts_smallest_first() {
        let cohort = [("slow", 90.0), ("fast", 30.0), ("mid", 60.0)];
        let result = compute_percentiles(&cohort, MetricDirection::LowerIsBetter);

        assert_eq!(result["fast"], 100.0);
        assert_eq!(result["mid"], 50.0);
        assert_eq!(result["slow"], 0.0);
    }

    #[test]
    fn higher_is_better_puts_largest_first() {
        let cohort = [("low", 70.0), ("high", 95.0), ("mid", 80.0)];
        let result = compute_percentiles(&cohort, MetricDirection::HigherIsBetter);

        assert_eq!(result["high"], 100.0);
        assert_eq!(result["mid"], 50.0);
        assert_eq!(result["low"], 0.0);
    }

    #[test]
    fn ties_share_average_rank() {
        // Ranks 2, 3, 4 tie and all become rank 3 out of 5.
        let cohort = [("a", 1.0), ("b", 5.0), ("c", 5.0), ("d", 5.0), ("e", 9.0)];
        let result = compute_percentiles(&cohort, MetricDirection::HigherIsBetter);

        assert_eq!(result["a"], 0.0);
        assert_eq!(result["b"], 50.0);
        assert_eq!(result["c"], 50.0);
        assert_eq!(result["d"], 50.0);
        assert_eq!(result["e"], 100.0);
    }

    #[test]
    fn zero_values_still_participate() {
        let cohort = [("unrated", 0.0), ("rated", 80.0)];
        let result = compute_percentiles(&cohort, MetricDirection::HigherIsBetter);

        assert_eq!(result["unrated"], 0.0);
        assert_eq!(result["rated"], 100.0);
    }

    #[test]
    fn full_tie_lands_in_the_middle() {
        let cohort = [("a", 4.0), ("b", 4.0)];
        let result = compute_percentiles(&cohort, MetricDirection::LowerIsBetter);

        assert_eq!(result["a"], 50.0);
        assert_eq!(result["b"], 50.0);
    }

    proptest! {
        #[test]
        fn percentiles_stay_in_range_and_respect_ties(
            values in prop::collection::vec(0u32..20, 2..40),
            lower in any::<bool>(),
        ) {
            let ids: Vec<String> = (0..values.len()).map(|i| format!("agent-{i}")).collect();
            let cohort: Vec<(&str, f64)> = ids
                .iter()
                .zip(&values)
                .map(|(id, value)| (id.as_str(), f64::from(*value)))
                .collect();
            let direction = if lower {
                MetricDirection::LowerIsBetter
            } else {
                MetricDirection::HigherIsBetter
            };

            let result = compute_percentiles(&cohort, direction);
            prop_assert_eq!(result.len(), cohort.len());

            for (id_a, value_a) in &cohort {
                let p = result[*id_a];
                prop_assert!((0.0..=100.0).contains(&p));
                for (id_b, value_b) in &cohort {
                    if value_a == value_b {
                        prop_assert!(close(p, result[*id_b]));
                    }
                }
            }

            let min = values.iter().min().copied().unwrap_or_default();
            let max = values.iter().max().copied().unwrap_or_default();
            let (best, worst) = if lower { (min, max) } else { (max, min) };
            let unique = |target: u32| values.iter().filter(|v| **v == target).count() == 1;

            for (id, value) in &cohort {
                if *value == f64::from(best) && unique(best) {
                    prop_assert_eq!(result[*id], 100.0);
                }
                if *value == f64::from(worst) && unique(worst) {
                    prop_assert_eq!(result[*id], 0.0);
                }
            }
        }
    }
}
