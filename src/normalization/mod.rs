//! Pure attribute and token normalizers shared by the builder, resolver and role extractor.

pub mod extract;
pub mod role;
pub mod title;

pub use extract::{
    is_null_field, parse_review_date, parse_runtime_minutes, year_from_release_date, NULL_SENTINEL,
};
pub use role::{clean_characters, clean_job, normalize_play_method, role_title};
pub use title::{jaccard, TitleKey, DEFAULT_MATCH_THRESHOLD};
