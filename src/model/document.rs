//! Scraped per-title review documents, as produced by the scraper.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One scraped title. Which title key is present depends on the category page it came from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tv_title: Option<String>,
    #[serde(default)]
    pub game_title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_details: MediaDetails,
    /// Section name (platform, season, display) -> reviews.
    #[serde(default, deserialize_with = "null_as_default")]
    pub critic_reviews: IndexMap<String, Vec<ScrapedReview>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_reviews: IndexMap<String, Vec<ScrapedReview>>,
}

impl ScrapedDocument {
    /// First non-blank of `title`, `tv_title`, `game_title`.
    pub fn primary_title(&self) -> Option<&str> {
        [&self.title, &self.tv_title, &self.game_title]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .map(str::trim)
            .find(|t| !t.is_empty())
    }

    /// Critic sections first, then user sections, each flagged with `is_critic`.
    pub fn review_sections(&self) -> impl Iterator<Item = (&str, bool, &[ScrapedReview])> {
        let critics = self
            .critic_reviews
            .iter()
            .map(|(section, reviews)| (section.as_str(), true, reviews.as_slice()));
        let users = self
            .user_reviews
            .iter()
            .map(|(section, reviews)| (section.as_str(), false, reviews.as_slice()));
        critics.chain(users)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub developers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub publishers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub production_companies: Vec<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub initial_release_date: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rating: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
}

impl MediaDetails {
    /// Movies and shows carry `initial_release_date`, games `release_date`.
    pub fn release_date(&self) -> Option<&str> {
        self.initial_release_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or(self.release_date.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedReview {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, rename = "publicationName")]
    pub publication_name: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<i32>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub spoiler: Option<bool>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Age ratings show up as "PG-13" on film pages and occasionally as bare numbers (PEGI 12).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// Scores are integers on the site but "tbd" and numeric strings leak through.
// Anything that does not round into an i32 is treated as missing.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_i64() {
            Some(v) => i32::try_from(v).ok(),
            None => n.as_f64().and_then(rounded_score),
        },
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(rounded_score),
        _ => None,
    })
}

fn rounded_score(v: f64) -> Option<i32> {
    let rounded = v.round();
    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&rounded);
    in_range.then_some(rounded as i32)
}
