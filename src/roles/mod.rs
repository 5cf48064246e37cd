//! Person-role facts for resolved titles, taken from the principals and names dumps.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::canonical::DistinctStore;
use crate::corpus::{field_str, CorpusRecord};
use crate::error::Result;
use crate::model::Role;
use crate::normalization::{normalize_play_method, role_title};
use crate::resolver::Resolution;

/// One row of the principals dump.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub tconst: String,
    pub nconst: String,
    pub category: Option<String>,
    pub job: Option<String>,
    pub characters: Option<String>,
}

impl CorpusRecord for Principal {
    const COLUMNS: &'static [&'static str] = &["tconst", "nconst", "category", "job", "characters"];

    fn from_fields(fields: &[&[u8]]) -> Option<Self> {
        Some(Self {
            tconst: field_str(fields[0])?.to_string(),
            nconst: field_str(fields[1])?.to_string(),
            category: field_str(fields[2]).map(str::to_string),
            job: field_str(fields[3]).map(str::to_string),
            characters: field_str(fields[4]).map(str::to_string),
        })
    }
}

impl Principal {
    /// The role this credit describes, `None` when it names neither a character nor a job.
    pub fn to_role(&self) -> Option<Role> {
        let title = role_title(self.characters.as_deref(), self.job.as_deref())?;
        Some(Role {
            person_id: self.nconst.clone(),
            person_name: None,
            play_method: self.category.as_deref().and_then(normalize_play_method),
            role_title: title,
        })
    }
}

/// One row of the names dump.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonName {
    pub nconst: String,
    pub primary_name: String,
}

impl CorpusRecord for PersonName {
    const COLUMNS: &'static [&'static str] = &["nconst", "primaryName"];

    fn from_fields(fields: &[&[u8]]) -> Option<Self> {
        Some(Self {
            nconst: field_str(fields[0])?.to_string(),
            primary_name: field_str(fields[1])?.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct RoleExtraction {
    pub roles: DistinctStore<Role>,
    /// Person ids whose display name still has to be looked up.
    pub required_people: HashSet<String>,
    pub credits_kept: usize,
    pub credits_dropped: usize,
}

pub struct RoleExtractor<'a> {
    resolution: &'a Resolution,
    progress_every: usize,
}

impl<'a> RoleExtractor<'a> {
    pub fn new(resolution: &'a Resolution, progress_every: usize) -> Self {
        Self {
            resolution,
            progress_every,
        }
    }

    /// Keep credits of resolved titles only and fold them into canonical roles keyed by
    /// person, play method and role title. References point at media ids.
    pub fn extract<I>(&self, chunks: I) -> Result<RoleExtraction>
    where
        I: IntoIterator<Item = Result<Vec<Principal>>>,
    {
        let mut extraction = RoleExtraction::default();
        if self.resolution.matches.is_empty() {
            info!("no resolved titles; skipping principals dump");
            return Ok(extraction);
        }

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let chunk = chunk?;
            let relevant: Vec<(Uuid, Option<Role>)> = chunk
                .par_iter()
                .filter_map(|credit| {
                    let media_id = self.resolution.media_for(&credit.tconst)?;
                    Some((media_id, credit.to_role()))
                })
                .collect();

            for (media_id, role) in relevant {
                match role {
                    Some(role) => {
                        extraction.required_people.insert(role.person_id.clone());
                        extraction.roles.map_distinct(role, media_id);
                        extraction.credits_kept += 1;
                    }
                    None => extraction.credits_dropped += 1,
                }
            }

            let chunk_no = idx + 1;
            if self.progress_every > 0 && chunk_no % self.progress_every == 0 {
                info!(
                    chunk = chunk_no,
                    credits = extraction.credits_kept,
                    roles = extraction.roles.len(),
                    "principals progress"
                );
            }
        }

        info!(
            credits = extraction.credits_kept,
            dropped = extraction.credits_dropped,
            roles = extraction.roles.len(),
            people = extraction.required_people.len(),
            "roles extracted"
        );
        Ok(extraction)
    }
}

/// Fill `person_name` on every role from the names dump. Returns how many roles got a name;
/// people missing from the dump keep a null name.
pub fn backfill_names<I>(
    roles: &mut DistinctStore<Role>,
    required: &HashSet<String>,
    chunks: I,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<Vec<PersonName>>>,
{
    if required.is_empty() {
        return Ok(0);
    }
    let mut names: HashMap<String, String> = HashMap::with_capacity(required.len());
    for chunk in chunks {
        for person in chunk? {
            if required.contains(&person.nconst) {
                names.entry(person.nconst).or_insert(person.primary_name);
            }
        }
        if names.len() == required.len() {
            debug!("all required names found; stopping names scan");
            break;
        }
    }

    let mut named = 0usize;
    for role in roles.attrs_mut() {
        if let Some(name) = names.get(&role.person_id) {
            role.person_name = Some(name.clone());
            named += 1;
        }
    }
    info!(
        named,
        missing = required.len() - names.len(),
        "person names back-filled"
    );
    Ok(named)
}
