//! Loads scraped documents from `<root>/{movies,tvshows,games}/*.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::model::{MediaType, ScrapedDocument};

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub media_type: MediaType,
    pub document: ScrapedDocument,
}

#[derive(Debug, Default)]
pub struct DocumentBatch {
    pub documents: Vec<LoadedDocument>,
    /// Files that could not be read or parsed; they are skipped, not fatal.
    pub malformed: Vec<PathBuf>,
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read every category directory under `root`. Missing categories are skipped.
pub fn load_documents(root: &Path) -> Result<DocumentBatch> {
    if !root.is_dir() {
        anyhow::bail!("documents directory {} does not exist", root.display());
    }
    let mut batch = DocumentBatch::default();

    for media_type in MediaType::ALL {
        let dir = root.join(media_type.category_dir());
        if !dir.is_dir() {
            info!(category = media_type.category_dir(), "no documents for category");
            continue;
        }
        let files = json_files(&dir)?;
        let before = batch.documents.len();
        for path in files {
            let parsed = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| serde_json::from_str::<ScrapedDocument>(&raw).map_err(Into::into));
            match parsed {
                Ok(document) => batch.documents.push(LoadedDocument {
                    path,
                    media_type,
                    document,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed document");
                    batch.malformed.push(path);
                }
            }
        }
        info!(
            category = media_type.category_dir(),
            documents = batch.documents.len() - before,
            "documents loaded"
        );
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_categories_and_counts_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let movies = dir.path().join("movies");
        let games = dir.path().join("games");
        fs::create_dir_all(&movies).unwrap();
        fs::create_dir_all(&games).unwrap();
        fs::write(movies.join("b.json"), r#"{"title": "Nova"}"#).unwrap();
        fs::write(movies.join("a.json"), r#"{"title": "Drift"}"#).unwrap();
        fs::write(movies.join("notes.txt"), "ignored").unwrap();
        fs::write(games.join("broken.json"), "{ not json").unwrap();

        let batch = load_documents(dir.path()).unwrap();
        let titles: Vec<_> = batch
            .documents
            .iter()
            .map(|d| (d.media_type, d.document.primary_title().unwrap_or_default()))
            .collect();
        assert_eq!(titles, vec![(MediaType::Movie, "Drift"), (MediaType::Movie, "Nova")]);
        assert_eq!(batch.malformed, vec![games.join("broken.json")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(load_documents(Path::new("/definitely/not/here")).is_err());
    }
}
