//! The staged star-schema run: build, canonicalize, resolve, extract roles, bridge, cluster.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::builder::{build_rows, BuiltDocument};
use crate::canonical::{build_bridges, BridgeTable, CanonicalRow, DistinctStore};
use crate::cluster::cluster_labels;
use crate::config::EngineConfig;
use crate::corpus::ChunkedCorpus;
use crate::documents::{load_documents, DocumentBatch};
use crate::model::{
    Company, ForeignKey, Genre, MediaRecord, ReviewFact, Reviewer, Role, Section, TimeOfReview,
};
use crate::resolver::{CrossCorpusResolver, Resolution, ResolutionTarget, TitleBasics};
use crate::roles::{backfill_names, PersonName, Principal, RoleExtractor};
use crate::sink::{
    project_graph, CsvTableSink, GraphSink, NdjsonGraphSink, RelationalSink, StagedOutput, Table,
};

/// A lazily read reference dump, chunk by chunk.
pub type Chunks<R> = Box<dyn Iterator<Item = crate::error::Result<Vec<R>>>>;

/// Source of the three reference dumps. Each is only opened when the run needs it.
pub trait ReferenceCorpora {
    fn titles(&self) -> crate::error::Result<Chunks<TitleBasics>>;
    fn principals(&self) -> crate::error::Result<Chunks<Principal>>;
    fn names(&self) -> crate::error::Result<Chunks<PersonName>>;
}

/// The gzip TSV dumps on disk.
#[derive(Debug, Clone)]
pub struct ImdbDumps {
    pub titles: PathBuf,
    pub principals: PathBuf,
    pub names: PathBuf,
    pub chunk_size: usize,
}

impl ImdbDumps {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            titles: config.title_basics_path(),
            principals: config.principals_path(),
            names: config.names_path(),
            chunk_size: config.chunk_size,
        }
    }
}

impl ReferenceCorpora for ImdbDumps {
    fn titles(&self) -> crate::error::Result<Chunks<TitleBasics>> {
        Ok(Box::new(ChunkedCorpus::<TitleBasics>::open(&self.titles, self.chunk_size)?))
    }

    fn principals(&self) -> crate::error::Result<Chunks<Principal>> {
        Ok(Box::new(ChunkedCorpus::<Principal>::open(&self.principals, self.chunk_size)?))
    }

    fn names(&self) -> crate::error::Result<Chunks<PersonName>> {
        Ok(Box::new(ChunkedCorpus::<PersonName>::open(&self.names, self.chunk_size)?))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub documents_seen: usize,
    pub malformed_documents: usize,
    pub untitled_documents: usize,
    pub media_rows: usize,
    pub review_rows: usize,
    pub facts_without_rating: usize,
    pub resolution_targets: usize,
    pub matched_titles: usize,
    pub unmatched_titles: Vec<String>,
    pub roles: usize,
    pub named_roles: usize,
    pub franchises: usize,
}

impl RunReport {
    pub fn dropped_documents(&self) -> usize {
        self.malformed_documents + self.untitled_documents
    }
}

/// Finished output of one run.
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub media: Vec<MediaRecord>,
    pub genres: Vec<CanonicalRow<Genre>>,
    pub companies: Vec<CanonicalRow<Company>>,
    pub roles: Vec<CanonicalRow<Role>>,
    pub times: Vec<CanonicalRow<TimeOfReview>>,
    pub reviewers: Vec<CanonicalRow<Reviewer>>,
    pub sections: Vec<CanonicalRow<Section>>,
    pub bridges: Vec<BridgeTable>,
    pub facts: Vec<ReviewFact>,
    pub report: RunReport,
}

impl StarSchema {
    pub fn bridge(&self, name: &str) -> Option<&BridgeTable> {
        self.bridges.iter().find(|b| b.name == name)
    }

    /// Every table in emission order: dimensions, bridges, then the fact table.
    pub fn tables(&self) -> Result<Vec<Table>> {
        let mut tables = vec![
            Table::from_records("DIM_MEDIA_INFO", "media_id", &self.media)?,
            Table::from_records("GENRES", ForeignKey::Genre.column(), &self.genres)?,
            Table::from_records("COMPANIES", ForeignKey::Company.column(), &self.companies)?,
            Table::from_records("ROLES", ForeignKey::Role.column(), &self.roles)?,
            Table::from_records("DIM_TIME", ForeignKey::Time.column(), &self.times)?,
            Table::from_records("DIM_REVIEWER", ForeignKey::Reviewer.column(), &self.reviewers)?,
            Table::from_records("DIM_SECTION", ForeignKey::Section.column(), &self.sections)?,
        ];
        tables.extend(
            self.bridges
                .iter()
                .map(|bridge| Table::new(bridge.name.clone(), bridge.to_row_maps())),
        );
        tables.push(Table::from_records("FACT_REVIEWS", "review_id", &self.facts)?);
        Ok(tables)
    }

    /// Build the tables and, when a graph sink is given, the graph projection, then hand them
    /// to the sinks. No sink sees anything until both projections exist.
    pub fn write_all(
        &self,
        relational: &mut dyn RelationalSink,
        graph: Option<&mut dyn GraphSink>,
    ) -> Result<()> {
        let tables = self.tables()?;
        let projection = match graph {
            Some(_) => Some(project_graph(self).context("projecting graph")?),
            None => None,
        };

        for table in &tables {
            relational
                .write_table(table)
                .with_context(|| format!("writing table {}", table.name))?;
        }
        relational.commit().context("committing tables")?;

        if let (Some(sink), Some(projection)) = (graph, projection) {
            for (label, nodes) in &projection.nodes {
                sink.upsert_nodes(label, nodes)
                    .with_context(|| format!("writing {label} nodes"))?;
            }
            for (key, edges) in &projection.edges {
                sink.upsert_edges(key, edges)
                    .with_context(|| format!("writing {} edges", key.relationship))?;
            }
            sink.commit().context("committing graph")?;
        }
        Ok(())
    }

    /// Write every table, plus `graph/` when `with_graph` is set, into `out_dir`.
    ///
    /// Files are staged next to `out_dir` and moved in only after every write succeeded; on
    /// error the stage is dropped and `out_dir` is left as it was.
    pub fn write_files(&self, out_dir: &Path, with_graph: bool) -> Result<Vec<PathBuf>> {
        let stage = StagedOutput::create(out_dir)
            .with_context(|| format!("staging output for {}", out_dir.display()))?;
        let mut tables = CsvTableSink::create(stage.path()).context("preparing table sink")?;
        let mut graph = NdjsonGraphSink::new(stage.path().join("graph"));
        let graph_sink: Option<&mut dyn GraphSink> = if with_graph {
            Some(&mut graph)
        } else {
            None
        };
        self.write_all(&mut tables, graph_sink)?;
        stage.publish().context("publishing output")
    }
}

/// Rows and candidates collected from every document before canonicalization.
#[derive(Default)]
struct Staging {
    media: IndexMap<Uuid, MediaRecord>,
    facts: IndexMap<Uuid, ReviewFact>,
    genres: DistinctStore<Genre>,
    companies: DistinctStore<Company>,
    times: DistinctStore<TimeOfReview>,
    reviewers: DistinctStore<Reviewer>,
    sections: DistinctStore<Section>,
}

impl Staging {
    fn stage(&mut self, built: BuiltDocument) {
        let media_id = built.media.id;
        self.genres
            .map_distinct_all(built.genres.into_iter().map(|g| (g, media_id)));
        self.companies
            .map_distinct_all(built.companies.into_iter().map(|c| (c, media_id)));
        for review in built.reviews {
            let fact_id = review.fact.id;
            self.times.map_distinct(review.time, fact_id);
            self.reviewers.map_distinct(review.reviewer, fact_id);
            self.sections.map_distinct(review.section, fact_id);
            self.facts.insert(fact_id, review.fact);
        }
        self.media.insert(media_id, built.media);
    }
}

pub struct StarSchemaEngine {
    config: EngineConfig,
}

impl StarSchemaEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load documents and dumps from the configured directories and run every stage.
    pub fn run(&self) -> Result<StarSchema> {
        let batch = load_documents(&self.config.documents_dir).context("loading documents")?;
        self.run_batch(batch, &ImdbDumps::from_config(&self.config))
    }

    pub fn run_batch(
        &self,
        batch: DocumentBatch,
        corpora: &dyn ReferenceCorpora,
    ) -> Result<StarSchema> {
        let mut report = RunReport {
            documents_seen: batch.documents.len() + batch.malformed.len(),
            malformed_documents: batch.malformed.len(),
            ..RunReport::default()
        };

        // Row building
        let mut staging = Staging::default();
        for loaded in &batch.documents {
            match build_rows(&loaded.document, loaded.media_type) {
                Some(built) => staging.stage(built),
                None => {
                    warn!(path = %loaded.path.display(), "document has no title; skipped");
                    report.untitled_documents += 1;
                }
            }
        }
        info!(
            media = staging.media.len(),
            reviews = staging.facts.len(),
            dropped = report.dropped_documents(),
            "rows built"
        );

        // Canonical dimensions
        let Staging {
            mut media,
            mut facts,
            genres,
            companies,
            times,
            reviewers,
            sections,
        } = staging;
        let genres = genres.remap_and_finalize(&mut media)?;
        let companies = companies.remap_and_finalize(&mut media)?;
        let times = times.remap_and_finalize(&mut facts)?;
        let reviewers = reviewers.remap_and_finalize(&mut facts)?;
        let mut sections = sections.remap_and_finalize(&mut facts)?;
        info!(
            genres = genres.len(),
            companies = companies.len(),
            times = times.len(),
            reviewers = reviewers.len(),
            sections = sections.len(),
            "dimensions canonicalized"
        );

        // Cross-corpus resolution
        let targets: Vec<ResolutionTarget> =
            media.values().filter_map(ResolutionTarget::from_media).collect();
        report.resolution_targets = targets.len();
        let resolution = if targets.is_empty() {
            info!("no films or series to resolve");
            Resolution::default()
        } else {
            let resolver = CrossCorpusResolver::new(targets, self.config.resolver.clone());
            let titles = corpora.titles().context("opening title dump")?;
            resolver.resolve(titles).context("resolving titles")?
        };
        report.matched_titles = resolution.matches.len();
        report.unmatched_titles = resolution.unmatched.iter().map(|u| u.title.clone()).collect();

        // Roles
        let roles = if resolution.matches.is_empty() {
            Vec::new()
        } else {
            let principals = corpora.principals().context("opening principals dump")?;
            let mut extraction =
                RoleExtractor::new(&resolution, self.config.resolver.progress_every)
                    .extract(principals)
                    .context("extracting roles")?;
            if !extraction.required_people.is_empty() {
                let names = corpora.names().context("opening names dump")?;
                report.named_roles =
                    backfill_names(&mut extraction.roles, &extraction.required_people, names)
                        .context("back-filling person names")?;
            }
            extraction.roles.remap_and_finalize(&mut media)?
        };
        report.roles = roles.len();

        let bridges = build_bridges(
            &mut media,
            &[ForeignKey::Genre, ForeignKey::Company, ForeignKey::Role],
            "media_id",
        )?;
        for bridge in &bridges {
            info!(table = %bridge.name, rows = bridge.len(), "bridge built");
        }

        // Franchise and section group labels
        let franchise_labels = cluster_labels(
            media
                .values()
                .map(|m| (m.primary_title.as_str(), m.media_type.as_str())),
            &self.config.media_clusters(),
        );
        for (row, label) in media.values_mut().zip(franchise_labels) {
            row.franchise = label;
        }
        let group_labels = cluster_labels(
            sections
                .iter()
                .map(|s| (s.attrs.section_name.as_str(), s.attrs.section_type.as_str())),
            &self.config.section_clusters(),
        );
        for (row, label) in sections.iter_mut().zip(group_labels) {
            row.attrs.section_group = label;
        }
        let mut franchises: Vec<&str> =
            media.values().filter_map(|m| m.franchise.as_deref()).collect();
        franchises.sort_unstable();
        franchises.dedup();
        report.franchises = franchises.len();

        // Facts carry their media's franchise; unrated reviews are not facts
        let mut kept = Vec::with_capacity(facts.len());
        for (_, mut fact) in facts {
            if fact.rating.is_none() {
                report.facts_without_rating += 1;
                continue;
            }
            fact.franchise_title = media.get(&fact.media_id).and_then(|m| m.franchise.clone());
            kept.push(fact);
        }

        report.media_rows = media.len();
        report.review_rows = kept.len();
        info!(
            media = report.media_rows,
            facts = report.review_rows,
            unrated = report.facts_without_rating,
            matched = report.matched_titles,
            unmatched = report.unmatched_titles.len(),
            roles = report.roles,
            franchises = report.franchises,
            "star schema assembled"
        );

        Ok(StarSchema {
            media: media.into_values().collect(),
            genres,
            companies,
            roles,
            times,
            reviewers,
            sections,
            bridges,
            facts: kept,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::LoadedDocument;
    use crate::error::EngineError;
    use crate::model::{MediaType, ScrapedDocument};
    use serde_json::json;

    /// In-memory dumps, one chunk each.
    #[derive(Default)]
    struct MemoryCorpora {
        titles: Vec<TitleBasics>,
        principals: Vec<Principal>,
        names: Vec<PersonName>,
    }

    impl ReferenceCorpora for MemoryCorpora {
        fn titles(&self) -> crate::error::Result<Chunks<TitleBasics>> {
            Ok(Box::new(std::iter::once(Ok::<_, EngineError>(self.titles.clone()))))
        }
        fn principals(&self) -> crate::error::Result<Chunks<Principal>> {
            Ok(Box::new(std::iter::once(Ok::<_, EngineError>(self.principals.clone()))))
        }
        fn names(&self) -> crate::error::Result<Chunks<PersonName>> {
            Ok(Box::new(std::iter::once(Ok::<_, EngineError>(self.names.clone()))))
        }
    }

    /// Fails the test if any dump is opened.
    struct NoCorpora;

    impl ReferenceCorpora for NoCorpora {
        fn titles(&self) -> crate::error::Result<Chunks<TitleBasics>> {
            panic!("title dump opened")
        }
        fn principals(&self) -> crate::error::Result<Chunks<Principal>> {
            panic!("principals dump opened")
        }
        fn names(&self) -> crate::error::Result<Chunks<PersonName>> {
            panic!("names dump opened")
        }
    }

    fn loaded(media_type: MediaType, value: serde_json::Value) -> LoadedDocument {
        LoadedDocument {
            path: PathBuf::from("doc.json"),
            media_type,
            document: serde_json::from_value::<ScrapedDocument>(value).unwrap(),
        }
    }

    fn batch(documents: Vec<LoadedDocument>) -> DocumentBatch {
        DocumentBatch {
            documents,
            malformed: vec![PathBuf::from("broken.json")],
        }
    }

    #[test]
    fn games_only_run_never_touches_the_dumps() {
        let docs = vec![
            loaded(
                MediaType::VideoGame,
                json!({
                    "game_title": "Zelda II",
                    "media_details": { "genres": ["Action"], "developers": ["Nintendo"], "publishers": [] },
                    "critic_reviews": { "NES": [ { "author": "A", "publicationName": "Mag", "score": 70, "date": "1988-01-14" } ] },
                    "user_reviews": { "NES": [ { "author": "u1", "score": null } ] }
                }),
            ),
            loaded(
                MediaType::VideoGame,
                json!({
                    "game_title": "Zelda III",
                    "media_details": { "genres": ["action"] },
                    "critic_reviews": { "SNES": [ { "author": "A", "publicationName": "Mag", "score": 95 } ] }
                }),
            ),
            loaded(MediaType::VideoGame, json!({ "media_details": {} })),
        ];
        let engine = StarSchemaEngine::new(EngineConfig::default());
        let schema = engine.run_batch(batch(docs), &NoCorpora).unwrap();

        assert_eq!(schema.report.documents_seen, 4);
        assert_eq!(schema.report.dropped_documents(), 2);
        assert_eq!(schema.media.len(), 2);
        assert_eq!(schema.genres.len(), 1);
        assert_eq!(schema.reviewers.len(), 2);
        assert_eq!(schema.facts.len(), 2);
        assert_eq!(schema.report.facts_without_rating, 1);
        assert!(schema.media.iter().all(|m| m.franchise.as_deref() == Some("zelda")));
        assert!(schema.facts.iter().all(|f| f.franchise_title.as_deref() == Some("zelda")));
        assert!(schema
            .facts
            .iter()
            .all(|f| f.time_id.is_some() && f.reviewer_id.is_some() && f.section_id.is_some()));

        let genre_bridge = schema.bridge("BRIDGE_MEDIA_GENRE").unwrap();
        assert_eq!(genre_bridge.len(), 2);
        assert!(schema.bridge("BRIDGE_MEDIA_COMPANY").unwrap().len() == 1);
        assert!(schema.bridge("BRIDGE_MEDIA_ROLE").unwrap().is_empty());
    }

    #[test]
    fn resolved_film_gets_roles_and_names() {
        let docs = vec![loaded(
            MediaType::Movie,
            json!({
                "title": "Nova",
                "media_details": { "duration": "2 h 0 m", "initial_release_date": "Mar 1, 2010" },
                "critic_reviews": { "Display": [ { "author": "K", "score": 80, "date": "2010-03-02" } ] }
            }),
        )];
        let corpora = MemoryCorpora {
            titles: vec![TitleBasics {
                tconst: "tt1".into(),
                primary_title: "Nova".into(),
                start_year: 2010,
                title_type: "movie".into(),
                runtime_minutes: Some(121),
            }],
            principals: vec![
                Principal {
                    tconst: "tt1".into(),
                    nconst: "nm1".into(),
                    category: Some("actress".into()),
                    job: None,
                    characters: Some("[\"Captain Vey\"]".into()),
                },
                Principal {
                    tconst: "tt1".into(),
                    nconst: "nm2".into(),
                    category: Some("director".into()),
                    job: None,
                    characters: None,
                },
            ],
            names: vec![PersonName {
                nconst: "nm1".into(),
                primary_name: "Ada Vance".into(),
            }],
        };

        let engine = StarSchemaEngine::new(EngineConfig::default());
        let schema = engine.run_batch(batch(docs), &corpora).unwrap();

        assert_eq!(schema.report.matched_titles, 1);
        assert!(schema.report.unmatched_titles.is_empty());
        assert_eq!(schema.roles.len(), 1);
        let role = &schema.roles[0].attrs;
        assert_eq!(role.person_name.as_deref(), Some("Ada Vance"));
        assert_eq!(role.play_method.as_deref(), Some("actor"));
        let bridge = schema.bridge("BRIDGE_MEDIA_ROLE").unwrap();
        assert_eq!(bridge.rows[0].owner_id, schema.media[0].id);
        assert_eq!(bridge.rows[0].weight, 1.0);
        assert_eq!(schema.media[0].franchise, None);

        let tables = schema.tables().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "DIM_MEDIA_INFO",
                "GENRES",
                "COMPANIES",
                "ROLES",
                "DIM_TIME",
                "DIM_REVIEWER",
                "DIM_SECTION",
                "BRIDGE_MEDIA_GENRE",
                "BRIDGE_MEDIA_COMPANY",
                "BRIDGE_MEDIA_ROLE",
                "FACT_REVIEWS"
            ]
        );
        assert_eq!(tables[0].rows[0]["media_type"], json!("Movie"));
        assert_eq!(tables[0].columns[0], "media_id");
    }

    #[test]
    fn unmatched_film_is_reported() {
        let docs = vec![loaded(
            MediaType::Movie,
            json!({ "title": "Quiet Orbit", "media_details": { "initial_release_date": "2001" } }),
        )];
        let engine = StarSchemaEngine::new(EngineConfig::default());
        let schema = engine.run_batch(batch(docs), &MemoryCorpora::default()).unwrap();
        assert_eq!(schema.report.unmatched_titles, vec!["Quiet Orbit".to_string()]);
        assert!(schema.roles.is_empty());
    }
}
