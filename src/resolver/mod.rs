//! Cross-corpus resolution of scraped films and series against the reference title dump.

pub mod assignment;
pub mod target;

use std::collections::HashMap;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::normalization::{TitleKey, DEFAULT_MATCH_THRESHOLD};

pub use assignment::{MatchBoard, Offer};
pub use target::{CandidateYears, ResolutionTarget, TitleBasics, LISTED_TITLE_TYPES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimePolicy {
    pub tolerance_minutes: u32,
    /// Whether two titles that both lack a runtime may still match.
    pub allow_both_unknown: bool,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self {
            tolerance_minutes: 2,
            allow_both_unknown: true,
        }
    }
}

impl RuntimePolicy {
    /// A zero runtime is treated like a missing one.
    pub fn compatible(&self, scraped: Option<u32>, reference: Option<u32>) -> bool {
        match (scraped.filter(|m| *m > 0), reference.filter(|m| *m > 0)) {
            (Some(a), Some(b)) => a.abs_diff(b) <= self.tolerance_minutes,
            (None, None) => self.allow_both_unknown,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub match_threshold: f64,
    pub year_window: i32,
    pub runtime: RuntimePolicy,
    /// Log progress every this many chunks; 0 disables it.
    pub progress_every: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            year_window: 1,
            runtime: RuntimePolicy::default(),
            progress_every: 5,
        }
    }
}

/// A scored pairing produced by one chunk, before assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub tconst: String,
    pub row: usize,
    pub target: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTitle {
    pub media_id: Uuid,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedTitle {
    pub media_id: Uuid,
    pub title: String,
}

/// Final 1:1 mapping from reference id to media.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub matches: IndexMap<String, MatchedTitle>,
    pub unmatched: Vec<UnmatchedTitle>,
    pub chunks: usize,
    pub rows_scanned: usize,
}

impl Resolution {
    pub fn media_for(&self, tconst: &str) -> Option<Uuid> {
        self.matches.get(tconst).map(|m| m.media_id)
    }
}

pub struct CrossCorpusResolver {
    config: ResolverConfig,
    targets: Vec<ResolutionTarget>,
    /// Join year -> indices of targets whose window covers it.
    by_year: HashMap<i32, Vec<usize>>,
    years: CandidateYears,
}

impl CrossCorpusResolver {
    pub fn new(targets: Vec<ResolutionTarget>, config: ResolverConfig) -> Self {
        let mut by_year: HashMap<i32, Vec<usize>> = HashMap::new();
        let mut years = CandidateYears::new();
        for (idx, target) in targets.iter().enumerate() {
            years.insert_window(target.year, config.year_window);
            for year in target.year - config.year_window..=target.year + config.year_window {
                by_year.entry(year).or_default().push(idx);
            }
        }
        Self {
            config,
            targets,
            by_year,
            years,
        }
    }

    #[cfg(test)]
    fn targets(&self) -> &[ResolutionTarget] {
        &self.targets
    }

    fn admits(&self, row: &TitleBasics) -> bool {
        row.is_listed_type()
            && self.years.contains(row.start_year)
            && row.primary_title.chars().count() > 1
    }

    /// Filter, join and score one chunk.
    ///
    /// Rows are scored in parallel; the result is ordered by score (best first), then chunk
    /// row, then target so assignment does not depend on thread scheduling.
    pub fn score_chunk(&self, chunk: &[TitleBasics]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = chunk
            .par_iter()
            .enumerate()
            .filter(|(_, row)| self.admits(row))
            .flat_map_iter(|(row_idx, row)| {
                let key = TitleKey::new(&row.primary_title);
                let joined = self
                    .by_year
                    .get(&row.start_year)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                joined
                    .iter()
                    .filter_map(|&target_idx| {
                        let target = &self.targets[target_idx];
                        if key.is_empty()
                            || !self
                                .config
                                .runtime
                                .compatible(target.runtime_minutes, row.runtime_minutes)
                        {
                            return None;
                        }
                        let score = target.key.similarity(&key);
                        (score >= self.config.match_threshold).then(|| Candidate {
                            tconst: row.tconst.clone(),
                            row: row_idx,
                            target: target_idx,
                            score,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.row.cmp(&b.row))
                .then(a.target.cmp(&b.target))
        });
        candidates
    }

    /// Consume every chunk of the title dump and settle the assignment.
    pub fn resolve<I>(&self, chunks: I) -> Result<Resolution>
    where
        I: IntoIterator<Item = Result<Vec<TitleBasics>>>,
    {
        let mut board = MatchBoard::new();
        let mut resolution = Resolution::default();

        info!(
            targets = self.targets.len(),
            years = self.years.len(),
            threshold = self.config.match_threshold,
            "resolving scraped titles against reference dump"
        );

        for chunk in chunks {
            let chunk = chunk?;
            resolution.chunks += 1;
            resolution.rows_scanned += chunk.len();

            let candidates = self.score_chunk(&chunk);
            let mut accepted = 0usize;
            for candidate in &candidates {
                if let Offer::Accepted { .. } =
                    board.offer(&candidate.tconst, candidate.target, candidate.score)
                {
                    accepted += 1;
                    debug!(
                        tconst = %candidate.tconst,
                        title = %self.targets[candidate.target].title,
                        score = candidate.score,
                        "candidate accepted"
                    );
                }
            }

            if self.config.progress_every > 0
                && resolution.chunks % self.config.progress_every == 0
            {
                info!(
                    chunk = resolution.chunks,
                    rows = resolution.rows_scanned,
                    matched = board.len(),
                    "resolver progress"
                );
            }
            debug!(
                chunk = resolution.chunks,
                candidates = candidates.len(),
                accepted,
                "chunk scored"
            );
        }

        for (tconst, target, score) in board.pairs() {
            resolution.matches.insert(
                tconst.to_string(),
                MatchedTitle {
                    media_id: self.targets[target].media_id,
                    score,
                },
            );
        }
        for (idx, target) in self.targets.iter().enumerate() {
            if board.reference_of(idx).is_none() {
                warn!(title = %target.title, year = target.year, "no reference title matched");
                resolution.unmatched.push(UnmatchedTitle {
                    media_id: target.media_id,
                    title: target.title.clone(),
                });
            }
        }

        info!(
            chunks = resolution.chunks,
            matched = resolution.matches.len(),
            unmatched = resolution.unmatched.len(),
            "resolution finished"
        );
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(title: &str, year: i32, runtime: Option<u32>) -> ResolutionTarget {
        ResolutionTarget {
            media_id: Uuid::new_v4(),
            title: title.into(),
            key: TitleKey::new(title),
            year,
            runtime_minutes: runtime,
        }
    }

    fn row(tconst: &str, title: &str, year: i32, kind: &str, runtime: Option<u32>) -> TitleBasics {
        TitleBasics {
            tconst: tconst.into(),
            primary_title: title.into(),
            start_year: year,
            title_type: kind.into(),
            runtime_minutes: runtime,
        }
    }

    #[test]
    fn runtime_policy() {
        let policy = RuntimePolicy::default();
        assert!(policy.compatible(Some(120), Some(122)));
        assert!(!policy.compatible(Some(120), Some(123)));
        assert!(policy.compatible(Some(120), None));
        assert!(policy.compatible(Some(0), Some(95)));
        assert!(policy.compatible(None, None));
        let strict = RuntimePolicy {
            allow_both_unknown: false,
            ..policy
        };
        assert!(!strict.compatible(None, Some(0)));
    }

    #[test]
    fn exact_title_within_runtime_tolerance_matches() {
        let nova = target("Nova", 2010, Some(120));
        let nova_id = nova.media_id;
        let resolver = CrossCorpusResolver::new(vec![nova], ResolverConfig::default());

        let chunk = vec![
            row("tt1", "Nova", 2010, "movie", Some(121)),
            row("tt9", "Nova", 2010, "tvEpisode", Some(120)),
            row("tt8", "Nova", 2014, "movie", Some(120)),
        ];
        let resolution = resolver.resolve(vec![Ok(chunk)]).unwrap();
        assert_eq!(
            resolution.matches.get("tt1"),
            Some(&MatchedTitle {
                media_id: nova_id,
                score: 1.0
            })
        );
        assert_eq!(resolution.matches.len(), 1);
        assert!(resolution.unmatched.is_empty());
    }

    #[test]
    fn later_candidate_evicts_the_holder() {
        // "Nova Drift" scores 2/3 against "Nova Drift Rising"; the exact title scores 1.0
        let a = target("Nova Drift", 2010, None);
        let b = target("Nova Drift Rising", 2010, None);
        let (a_id, b_id) = (a.media_id, b.media_id);
        let resolver = CrossCorpusResolver::new(vec![a, b], ResolverConfig::default());

        let first = vec![row("tt1", "Nova Drift Rising", 2010, "movie", None)];
        let resolution = resolver.resolve(vec![Ok(first)]).unwrap();
        assert_eq!(resolution.media_for("tt1"), Some(a_id));
        assert_eq!(resolution.matches["tt1"].score, 2.0 / 3.0);
        assert_eq!(resolution.unmatched.len(), 1);
        assert_eq!(resolution.unmatched[0].media_id, b_id);
    }

    #[test]
    fn mapping_is_one_to_one_across_chunks() {
        let targets = vec![
            target("Echo Park", 2015, Some(100)),
            target("Echo Park Nights", 2015, Some(100)),
            target("Silent Harbor", 2001, None),
        ];
        let resolver = CrossCorpusResolver::new(targets, ResolverConfig::default());
        let chunks = vec![
            Ok(vec![
                row("tt1", "Echo Park Nights", 2016, "movie", Some(101)),
                row("tt2", "Silent Harbor", 2001, "tvSeries", None),
            ]),
            Ok(vec![
                row("tt3", "Echo Park", 2014, "movie", Some(99)),
                row("tt4", "The Silent Harbor", 2002, "tvMiniSeries", Some(50)),
            ]),
        ];
        let resolution = resolver.resolve(chunks).unwrap();

        let mut media: Vec<Uuid> = resolution.matches.values().map(|m| m.media_id).collect();
        let total = media.len();
        media.sort();
        media.dedup();
        assert_eq!(media.len(), total);

        // "Echo Park" first takes tt1 from "Echo Park Nights" at 2/3, then trades up to tt3
        let ids: Vec<Uuid> = resolver.targets().iter().map(|t| t.media_id).collect();
        assert_eq!(resolution.media_for("tt3"), Some(ids[0]));
        assert_eq!(resolution.media_for("tt2"), Some(ids[2]));
        assert_eq!(resolution.media_for("tt1"), None);
        assert_eq!(resolution.media_for("tt4"), None);
        assert_eq!(
            resolution.unmatched,
            vec![UnmatchedTitle {
                media_id: ids[1],
                title: "Echo Park Nights".into()
            }]
        );
    }

    #[test]
    fn chunk_candidates_are_ordered_deterministically() {
        let targets = vec![target("Orbit", 2000, None), target("Orbit Two", 2000, None)];
        let resolver = CrossCorpusResolver::new(targets, ResolverConfig::default());
        let chunk = vec![
            row("tt5", "Orbit Two", 2000, "movie", None),
            row("tt6", "Orbit", 2000, "movie", None),
        ];
        let scored = resolver.score_chunk(&chunk);
        let order: Vec<_> = scored.iter().map(|c| (c.tconst.as_str(), c.target)).collect();
        assert_eq!(order, vec![("tt5", 1), ("tt6", 0)]);
        assert_eq!(resolver.score_chunk(&chunk), scored);
    }

    #[test]
    fn corpus_errors_abort_resolution() {
        let resolver =
            CrossCorpusResolver::new(vec![target("Nova", 2010, None)], ResolverConfig::default());
        let chunks: Vec<Result<Vec<TitleBasics>>> =
            vec![Err(crate::error::EngineError::MissingColumn {
                path: "title.basics.tsv.gz".into(),
                column: "tconst",
            })];
        assert!(resolver.resolve(chunks).is_err());
    }
}
