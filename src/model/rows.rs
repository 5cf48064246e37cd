//! Typed star-schema rows: the media dimension, the review fact and the canonical dimensions.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "Movie")]
    Movie,
    #[serde(rename = "TV Series")]
    TvSeries,
    #[serde(rename = "Video Game")]
    VideoGame,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Movie, MediaType::TvSeries, MediaType::VideoGame];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "Movie",
            MediaType::TvSeries => "TV Series",
            MediaType::VideoGame => "Video Game",
        }
    }

    /// What a review section means for this kind of media.
    pub fn section_type(&self) -> &'static str {
        match self {
            MediaType::Movie => "Display",
            MediaType::TvSeries => "Season",
            MediaType::VideoGame => "Platform",
        }
    }

    /// Only films and series exist in the reference title corpus.
    pub fn is_resolvable(&self) -> bool {
        matches!(self, MediaType::Movie | MediaType::TvSeries)
    }

    /// Scraped documents are grouped in one directory per category.
    pub fn category_dir(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::TvSeries => "tvshows",
            MediaType::VideoGame => "games",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Foreign-key columns that point at a canonical dimension row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForeignKey {
    Genre,
    Company,
    Role,
    Time,
    Section,
    Reviewer,
}

impl ForeignKey {
    pub fn column(&self) -> &'static str {
        match self {
            ForeignKey::Genre => "genre_id",
            ForeignKey::Company => "company_id",
            ForeignKey::Role => "role_id",
            ForeignKey::Time => "time_id",
            ForeignKey::Section => "section_id",
            ForeignKey::Reviewer => "reviewer_id",
        }
    }
}

/// Mutable view on one foreign-key slot of an owner row.
pub enum FkSlot<'a> {
    Many(&'a mut Vec<Uuid>),
    One(&'a mut Option<Uuid>),
}

/// A row that other rows' canonicalization writes foreign keys into.
pub trait ForeignKeyOwner {
    const ROW_KIND: &'static str;

    fn slot_mut(&mut self, key: ForeignKey) -> Option<FkSlot<'_>>;
}

/// A canonical dimension payload.
pub trait Dimension: Clone + Serialize {
    const TABLE: &'static str;
    const FOREIGN_KEY: ForeignKey;

    /// Case-insensitive identity; two candidates with equal keys are the same row.
    fn identity_key(&self) -> String;
}

// Parts are separated so ("ab", "c") and ("a", "bc") stay distinct; absent parts get their own
// marker so a missing value never equals an empty one.
pub(crate) struct IdentityKey {
    key: String,
    parts: usize,
}

impl IdentityKey {
    pub(crate) fn new() -> Self {
        Self {
            key: String::new(),
            parts: 0,
        }
    }

    pub(crate) fn part(mut self, value: Option<&str>) -> Self {
        if self.parts > 0 {
            self.key.push('\u{1f}');
        }
        match value {
            Some(v) => self.key.push_str(&v.to_lowercase()),
            None => self.key.push('\u{0}'),
        }
        self.parts += 1;
        self
    }

    pub(crate) fn finish(self) -> String {
        self.key
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub primary_title: String,
    pub title_language: Option<String>,
    pub original_title: Option<String>,
    pub media_type: MediaType,
    pub franchise: Option<String>,
    pub release_date: Option<String>,
    pub duration: Option<String>,
    pub duration_minutes: Option<u32>,
    pub description: Option<String>,
    #[serde(rename = "pegi_mpa_rating")]
    pub age_rating: Option<String>,
    #[serde(skip)]
    pub genre_ids: Vec<Uuid>,
    #[serde(skip)]
    pub company_ids: Vec<Uuid>,
    #[serde(skip)]
    pub role_ids: Vec<Uuid>,
}

impl ForeignKeyOwner for MediaRecord {
    const ROW_KIND: &'static str = "media";

    fn slot_mut(&mut self, key: ForeignKey) -> Option<FkSlot<'_>> {
        match key {
            ForeignKey::Genre => Some(FkSlot::Many(&mut self.genre_ids)),
            ForeignKey::Company => Some(FkSlot::Many(&mut self.company_ids)),
            ForeignKey::Role => Some(FkSlot::Many(&mut self.role_ids)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewFact {
    pub id: Uuid,
    pub media_id: Uuid,
    pub time_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    /// Franchise of the reviewed media, carried as a degenerate dimension.
    pub franchise_title: Option<String>,
    pub rating: Option<i32>,
}

impl ForeignKeyOwner for ReviewFact {
    const ROW_KIND: &'static str = "review";

    fn slot_mut(&mut self, key: ForeignKey) -> Option<FkSlot<'_>> {
        match key {
            ForeignKey::Time => Some(FkSlot::One(&mut self.time_id)),
            ForeignKey::Section => Some(FkSlot::One(&mut self.section_id)),
            ForeignKey::Reviewer => Some(FkSlot::One(&mut self.reviewer_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genre {
    pub genre_title: String,
}

impl Dimension for Genre {
    const TABLE: &'static str = "GENRES";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Genre;

    fn identity_key(&self) -> String {
        IdentityKey::new().part(Some(self.genre_title.as_str())).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompanyRole {
    #[serde(rename = "developer")]
    Developer,
    #[serde(rename = "publisher")]
    Publisher,
    #[serde(rename = "production_companies")]
    ProductionCompany,
}

impl CompanyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyRole::Developer => "developer",
            CompanyRole::Publisher => "publisher",
            CompanyRole::ProductionCompany => "production_companies",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub company_name: String,
    pub company_role: CompanyRole,
}

impl Dimension for Company {
    const TABLE: &'static str = "COMPANIES";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Company;

    fn identity_key(&self) -> String {
        IdentityKey::new()
            .part(Some(self.company_name.as_str()))
            .part(Some(self.company_role.as_str()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeOfReview {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl Dimension for TimeOfReview {
    const TABLE: &'static str = "DIM_TIME";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Time;

    fn identity_key(&self) -> String {
        IdentityKey::new()
            .part(self.year.map(|v| v.to_string()).as_deref())
            .part(self.month.map(|v| v.to_string()).as_deref())
            .part(self.day.map(|v| v.to_string()).as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reviewer {
    pub reviewer_username: Option<String>,
    pub association: Option<String>,
    pub is_critic: bool,
}

impl Dimension for Reviewer {
    const TABLE: &'static str = "DIM_REVIEWER";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Reviewer;

    fn identity_key(&self) -> String {
        IdentityKey::new()
            .part(self.reviewer_username.as_deref())
            .part(self.association.as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub section_name: String,
    pub section_type: String,
    pub section_group: Option<String>,
}

impl Dimension for Section {
    const TABLE: &'static str = "DIM_SECTION";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Section;

    fn identity_key(&self) -> String {
        IdentityKey::new()
            .part(Some(self.section_name.as_str()))
            .part(Some(self.section_type.as_str()))
            .finish()
    }
}

/// A person appearing in a title in one capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    #[serde(rename = "person_ref")]
    pub person_id: String,
    pub person_name: Option<String>,
    pub play_method: Option<String>,
    #[serde(rename = "role")]
    pub role_title: String,
}

impl Dimension for Role {
    const TABLE: &'static str = "ROLES";
    const FOREIGN_KEY: ForeignKey = ForeignKey::Role;

    fn identity_key(&self) -> String {
        IdentityKey::new()
            .part(Some(self.person_id.as_str()))
            .part(self.play_method.as_deref())
            .part(Some(self.role_title.as_str()))
            .finish()
    }
}
