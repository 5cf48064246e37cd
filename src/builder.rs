//! Turns one scraped document into typed rows plus the dimension candidates they reference.

use uuid::Uuid;

use crate::model::{
    Company, CompanyRole, Genre, MediaRecord, MediaType, ReviewFact, Reviewer, ScrapedDocument,
    ScrapedReview, Section, TimeOfReview,
};
use crate::normalization::{parse_review_date, parse_runtime_minutes};

/// A review fact with its not-yet-canonical time, reviewer and section.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub fact: ReviewFact,
    pub time: TimeOfReview,
    pub reviewer: Reviewer,
    pub section: Section,
}

/// Everything one document contributes before canonicalization. Foreign-key slots are empty.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub media: MediaRecord,
    pub genres: Vec<Genre>,
    pub companies: Vec<Company>,
    pub reviews: Vec<ReviewRow>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `None` when the document carries none of the title keys.
pub fn build_rows(doc: &ScrapedDocument, media_type: MediaType) -> Option<BuiltDocument> {
    let title = doc.primary_title()?;
    let details = &doc.media_details;

    let media = MediaRecord {
        id: Uuid::new_v4(),
        primary_title: title.to_string(),
        title_language: non_blank(details.original_language.as_deref()),
        original_title: non_blank(details.original_title.as_deref()),
        media_type,
        franchise: None,
        release_date: non_blank(details.release_date()),
        duration: non_blank(details.duration.as_deref()),
        duration_minutes: details.duration.as_deref().and_then(parse_runtime_minutes),
        description: non_blank(details.summary.as_deref()),
        age_rating: non_blank(details.rating.as_deref()),
        genre_ids: Vec::new(),
        company_ids: Vec::new(),
        role_ids: Vec::new(),
    };

    let genres = details
        .genres
        .iter()
        .filter_map(|g| non_blank(Some(g.as_str())))
        .map(|genre_title| Genre { genre_title })
        .collect();

    let companies = [
        (&details.developers, CompanyRole::Developer),
        (&details.publishers, CompanyRole::Publisher),
        (&details.production_companies, CompanyRole::ProductionCompany),
    ]
    .into_iter()
    .flat_map(|(names, company_role)| {
        names
            .iter()
            .filter_map(|n| non_blank(Some(n.as_str())))
            .map(move |company_name| Company {
                company_name,
                company_role,
            })
    })
    .collect();

    let media_id = media.id;
    let reviews = doc
        .review_sections()
        .flat_map(|(section, is_critic, reviews)| {
            reviews
                .iter()
                .map(move |review| build_review(media_id, media_type, section, is_critic, review))
        })
        .collect();

    Some(BuiltDocument {
        media,
        genres,
        companies,
        reviews,
    })
}

fn build_review(
    media_id: Uuid,
    media_type: MediaType,
    section: &str,
    is_critic: bool,
    review: &ScrapedReview,
) -> ReviewRow {
    let date = parse_review_date(review.date.as_deref().unwrap_or_default());
    ReviewRow {
        fact: ReviewFact {
            id: Uuid::new_v4(),
            media_id,
            time_id: None,
            section_id: None,
            reviewer_id: None,
            franchise_title: None,
            rating: review.score,
        },
        time: TimeOfReview {
            year: date.year,
            month: date.month,
            day: date.day,
        },
        reviewer: Reviewer {
            reviewer_username: non_blank(review.author.as_deref()),
            association: non_blank(review.publication_name.as_deref()),
            is_critic,
        },
        section: Section {
            section_name: section.trim().to_string(),
            section_type: media_type.section_type().to_string(),
            section_group: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> ScrapedDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn movie_document_becomes_rows() {
        let built = build_rows(
            &doc(json!({
                "title": "Nova",
                "media_details": {
                    "genres": ["Sci-Fi", " ", "Drama"],
                    "production_companies": ["Lumen Pictures"],
                    "duration": "2 h 0 m",
                    "summary": "A star collapses.",
                    "initial_release_date": "Mar 1, 2010",
                    "rating": "PG-13",
                    "original_language": "English"
                },
                "critic_reviews": {
                    "Display": [
                        { "author": "Kim Reyes", "publicationName": "The Daily", "score": 80, "date": "2010-03-02" }
                    ]
                },
                "user_reviews": {
                    "Display": [ { "author": "moviefan", "score": 7, "date": null } ]
                }
            })),
            MediaType::Movie,
        )
        .unwrap();

        let media = &built.media;
        assert_eq!(media.primary_title, "Nova");
        assert_eq!(media.duration_minutes, Some(120));
        assert_eq!(media.release_date.as_deref(), Some("Mar 1, 2010"));
        assert_eq!(media.age_rating.as_deref(), Some("PG-13"));
        assert_eq!(media.title_language.as_deref(), Some("English"));
        assert!(media.genre_ids.is_empty());

        let genres: Vec<_> = built.genres.iter().map(|g| g.genre_title.as_str()).collect();
        assert_eq!(genres, vec!["Sci-Fi", "Drama"]);
        assert_eq!(built.companies.len(), 1);
        assert_eq!(built.companies[0].company_role, CompanyRole::ProductionCompany);

        assert_eq!(built.reviews.len(), 2);
        let critic = &built.reviews[0];
        assert_eq!(critic.fact.media_id, media.id);
        assert_eq!(critic.fact.rating, Some(80));
        assert!(critic.reviewer.is_critic);
        assert_eq!(critic.reviewer.association.as_deref(), Some("The Daily"));
        let march_second = TimeOfReview {
            year: Some(2010),
            month: Some(3),
            day: Some(2),
        };
        assert_eq!(critic.time, march_second);
        assert_eq!(critic.section.section_type, "Display");

        let user = &built.reviews[1];
        assert!(!user.reviewer.is_critic);
        assert_eq!(
            user.time,
            TimeOfReview {
                year: None,
                month: None,
                day: None,
            }
        );
        assert_ne!(user.fact.id, critic.fact.id);
    }

    #[test]
    fn game_companies_keep_their_role() {
        let built = build_rows(
            &doc(json!({
                "game_title": "Hades",
                "media_details": {
                    "developers": ["Supergiant Games"],
                    "publishers": ["Supergiant Games"],
                    "release_date": "Sep 17, 2020"
                },
                "critic_reviews": { "PC": [ { "author": "A", "score": 93 } ] }
            })),
            MediaType::VideoGame,
        )
        .unwrap();
        let roles: Vec<_> = built.companies.iter().map(|c| c.company_role).collect();
        assert_eq!(roles, vec![CompanyRole::Developer, CompanyRole::Publisher]);
        assert_eq!(built.reviews[0].section.section_type, "Platform");
        assert_eq!(built.reviews[0].section.section_name, "PC");
    }

    #[test]
    fn untitled_document_is_skipped() {
        let untitled = doc(json!({ "media_details": { "genres": ["Drama"] } }));
        assert!(build_rows(&untitled, MediaType::Movie).is_none());
    }
}
