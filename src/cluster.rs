//! Similarity-graph clustering of labels into franchise / group names.
//!
//! Labels of the same kind are connected when their token sets overlap enough; every connected
//! component with more than one member is named after the leading words its labels share.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::normalization::jaccard;

pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.2;

/// Words that say nothing about which series a label belongs to.
const CLUSTER_STOPWORDS: [&str; 32] = [
    "the", "of", "a", "an", "and", "in", "on", "at", "ii", "iii", "iv", "v", "vi", "vii", "viii",
    "ix", "x", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "season", "part", "re", "release",
    "remastered",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub threshold: f64,
    /// Kinds that are never clustered.
    pub blacklist: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
            blacklist: Vec::new(),
        }
    }
}

impl ClusterConfig {
    pub fn with_blacklist<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = kinds.into_iter().map(Into::into).collect();
        self
    }

    fn is_blacklisted(&self, kind: &str) -> bool {
        self.blacklist.iter().any(|k| k == kind)
    }
}

/// Lower-cased words of a label. A label without spaces is split on hyphens instead.
pub fn split_label(label: &str) -> Vec<String> {
    let lowered = label.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.len() == 1 {
        let parts: Vec<&str> = words[0].split('-').filter(|p| !p.is_empty()).collect();
        if parts.len() > 1 {
            return parts.into_iter().map(str::to_owned).collect();
        }
    }
    words.into_iter().map(str::to_owned).collect()
}

pub fn cluster_tokens(label: &str) -> BTreeSet<String> {
    split_label(label)
        .into_iter()
        .filter(|t| !CLUSTER_STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn common_leading_words(labels: &[Vec<String>]) -> Vec<String> {
    let Some((first, rest)) = labels.split_first() else {
        return Vec::new();
    };
    let mut prefix = first.len();
    for words in rest {
        prefix = prefix.min(
            first
                .iter()
                .zip(words)
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    first[..prefix].to_vec()
}

/// Cluster `(label, kind)` rows and return one optional cluster name per input row.
///
/// Rows whose kind is blacklisted, whose tokens are all stopwords, or that end up alone in
/// their component get `None`.
pub fn cluster_labels<'a, I>(rows: I, config: &ClusterConfig) -> Vec<Option<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let rows: Vec<(&str, &str)> = rows.into_iter().collect();
    let mut assigned: Vec<Option<String>> = vec![None; rows.len()];

    // node -> row index, only for rows that take part in clustering
    let mut nodes: Vec<usize> = Vec::new();
    let mut by_kind: BTreeMap<&str, Vec<(usize, BTreeSet<String>)>> = BTreeMap::new();
    for (idx, (label, kind)) in rows.iter().enumerate() {
        if config.is_blacklisted(kind) {
            continue;
        }
        let tokens = cluster_tokens(label);
        if tokens.is_empty() {
            continue;
        }
        let node = nodes.len();
        nodes.push(idx);
        by_kind.entry(*kind).or_default().push((node, tokens));
    }

    let mut components = UnionFind::<usize>::new(nodes.len());
    let mut edges = 0usize;
    for members in by_kind.values() {
        for ((a, a_tokens), (b, b_tokens)) in members.iter().tuple_combinations() {
            if jaccard(a_tokens, b_tokens) >= config.threshold {
                components.union(*a, *b);
                edges += 1;
            }
        }
    }

    // nodes are numbered in row order, so every member list comes out sorted
    let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, idx) in nodes.iter().enumerate() {
        by_root.entry(components.find(node)).or_default().push(*idx);
    }

    let mut clusters = 0usize;
    for members in by_root.into_values() {
        if members.len() < 2 {
            continue;
        }
        let words: Vec<Vec<String>> = members.iter().map(|idx| split_label(rows[*idx].0)).collect();
        let prefix = common_leading_words(&words);
        if prefix.is_empty() {
            continue;
        }
        let name = prefix.join(" ");
        for idx in members {
            assigned[idx] = Some(name.clone());
        }
        clusters += 1;
    }

    debug!(
        rows = rows.len(),
        nodes = nodes.len(),
        edges,
        clusters,
        "labels clustered"
    );
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(rows: &[(&str, &str)], config: &ClusterConfig) -> Vec<Option<String>> {
        cluster_labels(rows.iter().copied(), config)
    }

    #[test]
    fn sequels_share_the_series_name() {
        let out = labels(
            &[
                ("Zelda II", "Video Game"),
                ("Zelda III", "Video Game"),
                ("Hades", "Video Game"),
            ],
            &ClusterConfig::default(),
        );
        assert_eq!(out, vec![Some("zelda".into()), Some("zelda".into()), None]);
    }

    #[test]
    fn chained_labels_form_one_cluster() {
        // the outer two only overlap by a third, but both link to the middle one
        let config = ClusterConfig {
            threshold: 0.5,
            ..ClusterConfig::default()
        };
        let out = labels(
            &[
                ("Star Quest", "Video Game"),
                ("Star Quest Wars", "Video Game"),
                ("Star Wars", "Video Game"),
            ],
            &config,
        );
        assert_eq!(out, vec![Some("star".into()); 3]);
    }

    #[test]
    fn kinds_are_clustered_separately() {
        let out = labels(
            &[("Dune", "Movie"), ("Dune", "Video Game")],
            &ClusterConfig::default(),
        );
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn blacklisted_kinds_stay_unlabelled() {
        let rows = [("Season 1", "Season"), ("Season 2", "Season"), ("PC", "Platform")];
        let config = ClusterConfig::default().with_blacklist(["Season"]);
        assert_eq!(labels(&rows, &config), vec![None, None, None]);
    }

    #[test]
    fn hyphenated_single_words_are_split() {
        assert_eq!(split_label("Spider-Man"), vec!["spider", "man"]);
        assert_eq!(split_label("Spider-Man 2"), vec!["spider-man", "2"]);
        let out = labels(
            &[("Spider-Man", "Movie"), ("Spider-Man-Homecoming", "Movie")],
            &ClusterConfig::default(),
        );
        assert_eq!(out, vec![Some("spider man".into()), Some("spider man".into())]);
    }

    #[test]
    fn stopword_only_labels_never_connect() {
        let out = labels(&[("The", "Movie"), ("Part II", "Movie")], &ClusterConfig::default());
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn no_shared_prefix_keeps_default() {
        // connected through "knight" but the labels start differently
        let out = labels(
            &[("Dark Knight", "Movie"), ("Knight Rises", "Movie")],
            &ClusterConfig::default(),
        );
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn output_does_not_depend_on_row_order() {
        let forward = [
            ("Mass Effect", "Video Game"),
            ("Mass Effect 2", "Video Game"),
            ("Mass Effect Andromeda", "Video Game"),
            ("Portal", "Video Game"),
        ];
        let mut reversed = forward;
        reversed.reverse();

        let a = labels(&forward, &ClusterConfig::default());
        let mut b = labels(&reversed, &ClusterConfig::default());
        b.reverse();
        assert_eq!(a, b);
        assert_eq!(a[0].as_deref(), Some("mass effect"));
        assert_eq!(a[3], None);
    }
}
