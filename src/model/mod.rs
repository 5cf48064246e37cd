pub mod document;
pub mod rows;

pub use document::{MediaDetails, ScrapedDocument, ScrapedReview};
pub use rows::{
    Company, CompanyRole, Dimension, FkSlot, ForeignKey, ForeignKeyOwner, Genre, MediaRecord,
    MediaType, ReviewFact, Reviewer, Role, Section, TimeOfReview,
};
