//! crates/course_ratings_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database schema; the adapters map
//! their rows onto them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Academic Catalog
//=========================================================================================

/// A degree course. Reference data, matched case-insensitively by `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// A specialization inside exactly one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Emphasis {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub course_id: Uuid,
}

/// An individual subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Discipline {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub period: Option<String>,
    pub credit_hours: Option<i32>,
    /// Type tag as stored, e.g. "básica" or "específica".
    pub kind: Option<String>,
}

/// A discipline as offered by a course or an emphasis, with the attributes
/// carried by the association record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DisciplineOffering {
    pub discipline: Discipline,
    pub suggested_period: Option<String>,
    pub mandatory: bool,
}

/// A course association of one discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CourseAssociation {
    pub course: Course,
    pub suggested_period: Option<String>,
    pub mandatory: bool,
}

/// Whether a discipline listing comes from the course core or from an emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisciplineTier {
    Basic,
    Specific,
}

impl DisciplineTier {
    /// The type tag used by the catalog for this tier.
    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "básica",
            Self::Specific => "específica",
        }
    }
}

/// A discipline enriched with its association data and aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DisciplineSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub period: Option<String>,
    pub kind: Option<String>,
    pub credit_hours: Option<i32>,
    pub suggested_period: Option<String>,
    pub mandatory: bool,
    pub course_name: Option<String>,
    pub course_code: Option<String>,
    pub emphasis_name: Option<String>,
    pub emphasis_code: Option<String>,
    pub total_professors: i64,
    pub total_ratings: i64,
}

//=========================================================================================
// Professors and Ratings
//=========================================================================================

/// A professor. Names are not unique; de-duplication is done by searching first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Professor {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

/// A professor with aggregate rating statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfessorStats {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub total_disciplines: i64,
    pub total_ratings: i64,
    pub average_stars: f64,
}

/// A star rating left by one user for a professor in one discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Rating {
    pub id: Uuid,
    pub professor_id: Uuid,
    pub discipline_id: Uuid,
    pub user_id: Uuid,
    pub stars: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A validated rating that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRating {
    pub professor_id: Uuid,
    pub discipline_id: Uuid,
    pub user_id: Uuid,
    pub stars: u8,
    pub comment: Option<String>,
}

/// A rating joined with the discipline it was left for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RatingWithDiscipline {
    pub rating: Rating,
    pub discipline_name: String,
    pub discipline_code: String,
}

/// Rating aggregates of a professor inside one discipline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfessorDisciplineStats {
    pub discipline: Discipline,
    pub total_ratings: i64,
    pub average_stars: f64,
}

/// Everything the professor page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfessorProfile {
    pub professor: Professor,
    pub ratings: Vec<RatingWithDiscipline>,
    pub disciplines: Vec<ProfessorDisciplineStats>,
}

//=========================================================================================
// Feedback
//=========================================================================================

/// The category of a feedback report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum FeedbackKind {
    #[serde(rename = "erro")]
    Error,
    #[serde(rename = "sugestao")]
    Suggestion,
    #[serde(rename = "bug")]
    Bug,
}

impl FeedbackKind {
    /// The value stored in the `feedbacks.tipo` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "erro",
            Self::Suggestion => "sugestao",
            Self::Bug => "bug",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "erro" => Ok(Self::Error),
            "sugestao" => Ok(Self::Suggestion),
            "bug" => Ok(Self::Bug),
            other => Err(format!("unknown feedback kind '{other}'")),
        }
    }
}

/// A validated feedback report that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    pub user_email: String,
    pub kind: FeedbackKind,
    pub title: String,
    pub description: String,
    pub page: Option<String>,
}

/// A stored feedback report. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Feedback {
    pub id: Uuid,
    pub user_email: String,
    pub kind: FeedbackKind,
    pub title: String,
    pub description: String,
    pub page: Option<String>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Search and Statistics
//=========================================================================================

/// One entry of the combined discipline/professor search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchHit {
    Discipline {
        id: Uuid,
        code: String,
        name: String,
        /// Comma-separated professor names, or a placeholder when none are linked.
        professors: String,
    },
    Professor {
        id: Uuid,
        name: String,
        email: Option<String>,
        /// Up to three discipline names.
        disciplines: Vec<String>,
        average_stars: f64,
    },
}

/// Site-wide counters for the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeneralStats {
    pub total_courses: i64,
    pub total_disciplines: i64,
    pub total_professors: i64,
    pub total_ratings: i64,
}

/// Tables that can be counted as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Courses,
    Disciplines,
    Professors,
    Ratings,
}

//=========================================================================================
// Authentication
//=========================================================================================

/// The identity issued by the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A session issued by the auth provider after a magic link is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}
