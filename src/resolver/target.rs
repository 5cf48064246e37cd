use std::collections::BTreeSet;

use uuid::Uuid;

use crate::corpus::{field_i32, field_str, field_u32, CorpusRecord};
use crate::model::MediaRecord;
use crate::normalization::{year_from_release_date, TitleKey};

/// Reference title kinds that can correspond to a scraped film or series.
pub const LISTED_TITLE_TYPES: [&str; 3] = ["movie", "tvSeries", "tvMiniSeries"];

/// One row of the reference title dump.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleBasics {
    pub tconst: String,
    pub primary_title: String,
    pub start_year: i32,
    pub title_type: String,
    pub runtime_minutes: Option<u32>,
}

impl TitleBasics {
    pub fn is_listed_type(&self) -> bool {
        LISTED_TITLE_TYPES.contains(&self.title_type.as_str())
    }
}

impl CorpusRecord for TitleBasics {
    const COLUMNS: &'static [&'static str] = &[
        "tconst",
        "primaryTitle",
        "startYear",
        "titleType",
        "runtimeMinutes",
    ];

    fn from_fields(fields: &[&[u8]]) -> Option<Self> {
        Some(Self {
            tconst: field_str(fields[0])?.to_string(),
            primary_title: field_str(fields[1])?.to_string(),
            start_year: field_i32(fields[2])?,
            title_type: field_str(fields[3])?.to_string(),
            runtime_minutes: field_u32(fields[4]),
        })
    }
}

/// A scraped film or series waiting for its reference id.
#[derive(Debug, Clone)]
pub struct ResolutionTarget {
    pub media_id: Uuid,
    pub title: String,
    pub key: TitleKey,
    pub year: i32,
    pub runtime_minutes: Option<u32>,
}

impl ResolutionTarget {
    /// `None` for games and for media without a usable title or release year.
    pub fn from_media(media: &MediaRecord) -> Option<Self> {
        if !media.media_type.is_resolvable() {
            return None;
        }
        let year = media.release_date.as_deref().and_then(year_from_release_date)?;
        let key = TitleKey::new(&media.primary_title);
        if key.is_empty() {
            return None;
        }
        Some(Self {
            media_id: media.id,
            title: media.primary_title.clone(),
            key,
            year,
            runtime_minutes: media.duration_minutes,
        })
    }
}

/// Release years the title dump is filtered on before any join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateYears {
    years: BTreeSet<i32>,
}

impl CandidateYears {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `year` and its `window` neighbours on both sides.
    pub fn insert_window(&mut self, year: i32, window: i32) {
        self.years.extend(year - window..=year + window);
    }

    pub(crate) fn contains(&self, year: i32) -> bool {
        self.years.contains(&year)
    }

    pub(crate) fn len(&self) -> usize {
        self.years.len()
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.iter().copied()
    }
}
