//! crates/course_ratings_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted backend's query API, its auth provider and
//! the rate-limit counter store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthTokens, AuthUser, CatalogTable, Course, CourseAssociation, Discipline,
    DisciplineOffering, Emphasis, Feedback, NewFeedback, NewRating, Professor, Rating,
    RatingWithDiscipline,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend rejected a write because of a unique constraint.
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The relational query API of the hosted backend.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Counters ---
    async fn count_rows(&self, table: CatalogTable) -> PortResult<i64>;

    // --- Courses and Emphases ---
    async fn list_courses(&self) -> PortResult<Vec<Course>>;

    /// Exact match on the (already uppercased) code.
    async fn find_course_by_code(&self, code: &str) -> PortResult<Option<Course>>;

    async fn list_emphases_by_course(&self, course_id: Uuid) -> PortResult<Vec<Emphasis>>;

    async fn find_emphasis_by_code(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Option<Emphasis>>;

    // --- Disciplines ---
    /// Disciplines associated with a course, ordered by suggested period.
    async fn list_course_offerings(&self, course_code: &str) -> PortResult<Vec<DisciplineOffering>>;

    /// Disciplines associated with an emphasis of a course, ordered by suggested period.
    async fn list_emphasis_offerings(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Vec<DisciplineOffering>>;

    async fn find_discipline_by_code(&self, code: &str) -> PortResult<Option<Discipline>>;

    async fn find_discipline_by_id(&self, discipline_id: Uuid) -> PortResult<Option<Discipline>>;

    /// Case-insensitive substring search on code or name.
    async fn search_disciplines(&self, term: &str, limit: i64) -> PortResult<Vec<Discipline>>;

    /// Sets the type tag of every discipline whose code is in `codes`.
    async fn set_discipline_kind(&self, codes: &[String], kind: &str) -> PortResult<u64>;

    async fn count_ratings_for_discipline(&self, discipline_id: Uuid) -> PortResult<i64>;

    // --- Discipline/Course Associations ---
    async fn list_discipline_courses(
        &self,
        discipline_id: Uuid,
    ) -> PortResult<Vec<CourseAssociation>>;

    /// Inserts the association or updates its attributes when the pair exists.
    async fn upsert_discipline_course(
        &self,
        discipline_id: Uuid,
        course_id: Uuid,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) -> PortResult<()>;

    async fn delete_discipline_course(&self, discipline_id: Uuid, course_id: Uuid) -> PortResult<()>;

    // --- Professors ---
    async fn find_professor(&self, professor_id: Uuid) -> PortResult<Option<Professor>>;

    /// Case-insensitive substring search on the name.
    async fn search_professors(&self, name: &str, limit: i64) -> PortResult<Vec<Professor>>;

    async fn insert_professor(&self, name: &str, email: Option<&str>) -> PortResult<Professor>;

    async fn delete_professor(&self, professor_id: Uuid) -> PortResult<()>;

    // --- Professor/Discipline Links ---
    async fn professor_link_exists(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<bool>;

    async fn insert_professor_link(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<()>;

    async fn list_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<Vec<Professor>>;

    async fn list_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<Vec<Discipline>>;

    async fn count_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<i64>;

    async fn count_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<i64>;

    // --- Ratings ---
    async fn rating_exists(
        &self,
        professor_id: Uuid,
        discipline_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<bool>;

    async fn insert_rating(&self, rating: &NewRating) -> PortResult<Rating>;

    /// Star values of a professor, optionally restricted to one discipline.
    async fn list_stars(
        &self,
        professor_id: Uuid,
        discipline_id: Option<Uuid>,
    ) -> PortResult<Vec<u8>>;

    /// Ratings of a professor, newest first.
    async fn list_ratings_for_professor(
        &self,
        professor_id: Uuid,
    ) -> PortResult<Vec<RatingWithDiscipline>>;

    // --- Feedback ---
    async fn insert_feedback(&self, feedback: &NewFeedback) -> PortResult<Feedback>;
}

/// The hosted passwordless auth provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Emails a magic link that redirects to `redirect_to`. The PKCE challenge
    /// binds the link to the verifier kept by the requester.
    async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> PortResult<()>;

    /// Exchanges the one-time code from the callback query for a session.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> PortResult<AuthTokens>;

    /// Verifies a `token_hash`/`type` pair from the callback query.
    async fn verify_token_hash(&self, token_hash: &str, kind: &str) -> PortResult<AuthTokens>;

    /// Resolves an access token to the user it was issued for.
    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> PortResult<()>;
}

/// Counter store guarding write actions per identifier.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one action for `identifier` and returns whether it is allowed.
    async fn check(&self, identifier: &str) -> PortResult<bool>;
}
