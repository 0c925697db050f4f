//! Laggard selection — a pure function over candidate lookback returns.

use serde::{Deserialize, Serialize};

/// A candidate stock with its cumulative return over the lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct LaggardCandidate {
    pub symbol: String,
    pub industry_id: String,
    pub industry_name: String,
    pub lookback_return: f64,
}

/// A selected laggard, kept as a snapshot on the event for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laggard {
    pub symbol: String,
    pub industry_id: String,
    pub industry_name: String,
    pub lookback_return: f64,
}

/// Pick the bottom `laggard_pct` fraction of candidates by lookback return.
///
/// Returns exactly `max(1, floor(laggard_pct * N))` laggards when `N > 0`,
/// and nothing when the candidate set is empty. Ties are broken by symbol
/// ascending so identical inputs always select identical sets.
pub fn pick_laggards(candidates: &[LaggardCandidate], laggard_pct: f64) -> Vec<Laggard> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<&LaggardCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        a.lookback_return
            .partial_cmp(&b.lookback_return)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    let cut = ((laggard_pct * candidates.len() as f64).floor() as usize).max(1);
    sorted
        .into_iter()
        .take(cut)
        .map(|c| Laggard {
            symbol: c.symbol.clone(),
            industry_id: c.industry_id.clone(),
            industry_name: c.industry_name.clone(),
            lookback_return: c.lookback_return,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(symbol: &str, ret: f64) -> LaggardCandidate {
        LaggardCandidate {
            symbol: symbol.to_string(),
            industry_id: "801010".to_string(),
            industry_name: "通信设备".to_string(),
            lookback_return: ret,
        }
    }

    #[test]
    fn empty_candidates_select_nothing() {
        assert!(pick_laggards(&[], 0.5).is_empty());
    }

    #[test]
    fn picks_worst_performer_first() {
        let picked = pick_laggards(
            &[candidate("AAA", 0.10), candidate("BBB", 0.01), candidate("CCC", -0.05)],
            0.34,
        );
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].symbol, "CCC");
    }

    #[test]
    fn bottom_half_of_two_is_one() {
        let picked = pick_laggards(&[candidate("AAA", 0.02), candidate("BBB", -0.01)], 0.5);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].symbol, "BBB");
    }

    #[test]
    fn ties_break_by_symbol_for_determinism() {
        let picked = pick_laggards(
            &[candidate("BBB", 0.0), candidate("AAA", 0.0), candidate("CCC", 0.0)],
            0.67,
        );
        let symbols: Vec<&str> = picked.iter().map(|l| l.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }

    proptest! {
        /// Selection size is exactly max(1, floor(p * N)) for any N > 0.
        #[test]
        fn selection_size_matches_floor_rule(
            returns in prop::collection::vec(-0.5f64..0.5, 1..80),
            pct in 0.01f64..1.0,
        ) {
            let candidates: Vec<LaggardCandidate> = returns
                .iter()
                .enumerate()
                .map(|(i, &r)| candidate(&format!("S{i:03}"), r))
                .collect();
            let picked = pick_laggards(&candidates, pct);
            let expected = ((pct * candidates.len() as f64).floor() as usize).max(1);
            prop_assert_eq!(picked.len(), expected);
        }

        /// Every selected laggard ranks no better than every unselected one.
        #[test]
        fn selected_are_worst_performers(
            returns in prop::collection::vec(-0.5f64..0.5, 2..40),
        ) {
            let candidates: Vec<LaggardCandidate> = returns
                .iter()
                .enumerate()
                .map(|(i, &r)| candidate(&format!("S{i:03}"), r))
                .collect();
            let picked = pick_laggards(&candidates, 0.5);
            let worst_selected = picked
                .iter()
                .map(|l| l.lookback_return)
                .fold(f64::NEG_INFINITY, f64::max);
            let picked_symbols: Vec<&str> = picked.iter().map(|l| l.symbol.as_str()).collect();
            for c in &candidates {
                if !picked_symbols.contains(&c.symbol.as_str()) {
                    prop_assert!(c.lookback_return >= worst_selected);
                }
            }
        }
    }
}
