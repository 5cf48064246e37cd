use std::collections::HashMap;

use tracing::debug;

/// What happened to an offered candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    Rejected,
    Accepted {
        /// Reference the target held before, now free again.
        released_reference: Option<String>,
        /// Target that held the offered reference before, now unmatched.
        evicted_target: Option<usize>,
    },
}

/// King-of-the-Hill assignment between reference ids and targets.
///
/// `by_reference` and `by_target` always describe the same 1:1 pairing. An offer is accepted
/// iff its score is strictly greater than the best score ever recorded for its target; the
/// accepted pair then evicts both sides (the target's previous reference and the reference's
/// previous holder). An evicted target keeps its best score, so it stays unmatched until a
/// strictly better candidate shows up.
#[derive(Debug, Default)]
pub struct MatchBoard {
    by_reference: HashMap<String, usize>,
    by_target: HashMap<usize, (String, f64)>,
    best_score: HashMap<usize, f64>,
}

impl MatchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, reference: &str, target: usize, score: f64) -> Offer {
        if let Some(best) = self.best_score.get(&target) {
            if score <= *best {
                return Offer::Rejected;
            }
        }

        let released_reference = self
            .by_target
            .remove(&target)
            .map(|(previous, _)| {
                self.by_reference.remove(&previous);
                previous
            })
            .filter(|previous| previous.as_str() != reference);
        let evicted_target = self.by_reference.remove(reference).map(|holder| {
            self.by_target.remove(&holder);
            holder
        });

        self.by_reference.insert(reference.to_string(), target);
        self.by_target.insert(target, (reference.to_string(), score));
        self.best_score.insert(target, score);

        if let Some(holder) = evicted_target {
            debug!(reference, from = holder, to = target, score, "reference reassigned");
        }
        Offer::Accepted {
            released_reference,
            evicted_target,
        }
    }

    pub fn reference_of(&self, target: usize) -> Option<(&str, f64)> {
        self.by_target
            .get(&target)
            .map(|(reference, score)| (reference.as_str(), *score))
    }

    #[cfg(test)]
    fn target_of(&self, reference: &str) -> Option<usize> {
        self.by_reference.get(reference).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_target.len()
    }

    /// Current pairs as (reference, target, score), in target order.
    pub fn pairs(&self) -> Vec<(&str, usize, f64)> {
        let mut pairs: Vec<_> = self
            .by_target
            .iter()
            .map(|(target, (reference, score))| (reference.as_str(), *target, *score))
            .collect();
        pairs.sort_by_key(|(_, target, _)| *target);
        pairs
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.by_reference.len() == self.by_target.len()
            && self
                .by_reference
                .iter()
                .all(|(reference, target)| {
                    self.by_target.get(target).map(|(r, _)| r.as_str()) == Some(reference.as_str())
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: usize = 0;
    const B: usize = 1;

    #[test]
    fn better_target_takes_the_reference() {
        let mut board = MatchBoard::new();
        assert!(matches!(board.offer("tt1", A, 0.7), Offer::Accepted { .. }));
        let outcome = board.offer("tt1", B, 0.9);
        assert_eq!(
            outcome,
            Offer::Accepted {
                released_reference: None,
                evicted_target: Some(A)
            }
        );
        assert_eq!(board.target_of("tt1"), Some(B));
        assert_eq!(board.reference_of(A), None);
        assert!(board.is_consistent());
    }

    #[test]
    fn evicted_target_needs_a_strictly_better_score() {
        let mut board = MatchBoard::new();
        board.offer("tt1", A, 0.7);
        board.offer("tt1", B, 0.9);

        assert_eq!(board.offer("tt2", A, 0.7), Offer::Rejected);
        assert_eq!(board.offer("tt2", A, 0.65), Offer::Rejected);
        assert_eq!(board.reference_of(A), None);

        assert!(matches!(board.offer("tt2", A, 0.75), Offer::Accepted { .. }));
        assert_eq!(board.reference_of(A), Some(("tt2", 0.75)));
        assert!(board.is_consistent());
    }

    #[test]
    fn any_improvement_for_the_target_evicts_the_holder() {
        let mut board = MatchBoard::new();
        board.offer("tt1", B, 1.0);
        assert_eq!(
            board.offer("tt1", A, 0.67),
            Offer::Accepted {
                released_reference: None,
                evicted_target: Some(B)
            }
        );
        assert_eq!(board.target_of("tt1"), Some(A));
        assert_eq!(board.reference_of(B), None);
        // A already reached 0.67, so a weaker pair is discarded
        assert_eq!(board.offer("tt2", A, 0.61), Offer::Rejected);
        assert_eq!(board.reference_of(A), Some(("tt1", 0.67)));
        assert!(board.is_consistent());
    }

    #[test]
    fn ties_keep_the_first_assignment() {
        let mut board = MatchBoard::new();
        board.offer("tt1", A, 0.8);
        assert_eq!(board.offer("tt2", A, 0.8), Offer::Rejected);
        assert_eq!(board.reference_of(A), Some(("tt1", 0.8)));
    }

    #[test]
    fn upgrading_a_target_releases_its_old_reference() {
        let mut board = MatchBoard::new();
        board.offer("tt1", A, 0.6);
        let outcome = board.offer("tt2", A, 0.95);
        assert_eq!(
            outcome,
            Offer::Accepted {
                released_reference: Some("tt1".to_string()),
                evicted_target: None
            }
        );
        assert_eq!(board.target_of("tt1"), None);
        assert_eq!(board.len(), 1);
        assert!(board.is_consistent());
    }

    #[test]
    fn scores_only_improve_under_any_offer_order() {
        let offers = [
            ("tt1", A, 0.62),
            ("tt2", B, 0.7),
            ("tt2", A, 0.8),
            ("tt1", B, 0.75),
            ("tt3", A, 0.79),
            ("tt1", A, 0.9),
        ];
        let mut board = MatchBoard::new();
        let mut last_best: HashMap<usize, f64> = HashMap::new();
        for (reference, target, score) in offers {
            board.offer(reference, target, score);
            assert!(board.is_consistent());
            if let Some((_, held)) = board.reference_of(target) {
                let previous = last_best.insert(target, held).unwrap_or(0.0);
                assert!(held >= previous);
            }
        }
        // B lost tt1 to A in the last offer and nothing beat its 0.75 afterwards
        assert_eq!(board.pairs(), vec![("tt1", A, 0.9)]);
        assert_eq!(board.reference_of(B), None);
    }

    #[test]
    fn no_discarded_pair_beats_the_final_assignment() {
        const C: usize = 2;
        let offers = [
            ("tt1", B, 1.0),
            ("tt1", A, 0.67),
            ("tt2", A, 0.61),
            ("tt3", C, 0.7),
            ("tt3", B, 0.65),
            ("tt2", C, 0.9),
            ("tt4", B, 1.0),
            ("tt4", A, 0.8),
            ("tt5", B, 1.2),
        ];
        let mut board = MatchBoard::new();
        let mut discarded: Vec<(usize, f64)> = Vec::new();
        for (reference, target, score) in offers {
            if board.offer(reference, target, score) == Offer::Rejected {
                discarded.push((target, score));
            }
            assert!(board.is_consistent());
        }

        assert!(!discarded.is_empty());
        for (target, score) in discarded {
            if let Some((_, held)) = board.reference_of(target) {
                assert!(
                    score <= held,
                    "discarded {score} for target {target} beats final {held}"
                );
            }
        }
    }
}
