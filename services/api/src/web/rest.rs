//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the catalog, rating, feedback and
//! administration endpoints, and the master definition for the OpenAPI
//! specification.

use crate::error::HttpError;
use crate::web::extract::AppJson;
use crate::web::auth::{self, MessageResponse};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use course_ratings_core::validation::{sanitize_value, stars_from_json};
use course_ratings_core::{
    AuthUser, Course, CourseAssociation, Discipline, DisciplineOffering, DisciplineSummary,
    Emphasis, Feedback, FeedbackKind, GeneralStats, Professor, ProfessorDisciplineStats,
    ProfessorProfile, ProfessorStats, Rating, RatingWithDiscipline, SearchHit,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_courses_handler,
        get_course_handler,
        list_emphases_handler,
        get_emphasis_handler,
        list_basic_disciplines_handler,
        list_emphasis_disciplines_handler,
        get_discipline_handler,
        list_discipline_professors_handler,
        list_discipline_courses_handler,
        get_professor_handler,
        search_professors_handler,
        search_handler,
        stats_handler,
        create_professor_handler,
        link_professor_handler,
        create_rating_handler,
        check_rating_handler,
        create_feedback_handler,
        associate_handler,
        remove_association_handler,
        list_course_offerings_handler,
        mark_basic_handler,
        auth::magic_link_handler,
        auth::callback_handler,
        auth::session_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::send_verification_handler,
    ),
    components(
        schemas(
            Course, Emphasis, Discipline, DisciplineOffering, DisciplineSummary,
            CourseAssociation, Professor, ProfessorStats, ProfessorProfile,
            ProfessorDisciplineStats, Rating, RatingWithDiscipline, Feedback, FeedbackKind,
            SearchHit, GeneralStats, AuthUser,
            CreateProfessorRequest, LinkProfessorRequest, CreateRatingRequest, RatedResponse,
            CreateFeedbackRequest, AssociationRequest, BasicDisciplinesRequest, UpdatedResponse,
            auth::MagicLinkRequest, auth::MessageResponse, auth::SessionRequest,
            auth::UserResponse, auth::MeResponse, auth::DeprecatedResponse,
        )
    ),
    tags(
        (name = "UERJ Avaliações API", description = "Catalog, professor ratings and feedback for UERJ students.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Free-text search term.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProfessorRequest {
    /// Non-string values are treated as empty.
    #[serde(default)]
    #[schema(value_type = String)]
    pub name: Value,
    pub email: Option<String>,
    /// When present, the new professor is linked to this discipline.
    pub discipline_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LinkProfessorRequest {
    pub professor_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateRatingRequest {
    pub professor_id: String,
    pub discipline_id: String,
    /// A whole number between 1 and 5.
    #[schema(value_type = Object)]
    pub stars: Value,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub comment: Value,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckRatingQuery {
    pub professor_id: String,
    pub discipline_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct RatedResponse {
    pub rated: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateFeedbackRequest {
    /// One of `erro`, `sugestao` or `bug`.
    #[serde(default)]
    #[schema(value_type = String)]
    pub kind: Value,
    #[serde(default)]
    #[schema(value_type = String)]
    pub title: Value,
    #[serde(default)]
    #[schema(value_type = String)]
    pub description: Value,
    pub page: Option<String>,
}

fn default_mandatory() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct AssociationRequest {
    pub discipline_code: String,
    pub course_codes: Vec<String>,
    pub suggested_period: Option<String>,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RemoveAssociationQuery {
    pub discipline_code: String,
    pub course_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BasicDisciplinesRequest {
    pub codes: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UpdatedResponse {
    pub updated: u64,
}

const INVALID_STARS: &str = "Número de estrelas deve ser entre 1 e 5";

//=========================================================================================
// Catalog Handlers
//=========================================================================================

/// List all courses, ordered by name.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "All courses", body = Vec<Course>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_courses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, HttpError> {
    Ok(Json(app_state.service.list_courses().await?))
}

/// Fetch one course by code, ignoring case.
#[utoipa::path(
    get,
    path = "/courses/{code}",
    params(("code" = String, Path, description = "Course code, e.g. CC")),
    responses(
        (status = 200, description = "The course", body = Course),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn get_course_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Course>, HttpError> {
    app_state
        .service
        .get_course_by_code(&code)
        .await?
        .map(Json)
        .ok_or_else(|| HttpError::not_found("Curso não encontrado"))
}

/// List the emphases offered by a course.
#[utoipa::path(
    get,
    path = "/courses/{code}/emphases",
    params(("code" = String, Path, description = "Course code")),
    responses(
        (status = 200, description = "Emphases of the course", body = Vec<Emphasis>),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn list_emphases_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Emphasis>>, HttpError> {
    let course = app_state
        .service
        .get_course_by_code(&code)
        .await?
        .ok_or_else(|| HttpError::not_found("Curso não encontrado"))?;
    let emphases = app_state
        .service
        .list_emphases(&course.id.to_string())
        .await?;
    Ok(Json(emphases))
}

/// Fetch one emphasis of a course by code.
#[utoipa::path(
    get,
    path = "/courses/{code}/emphases/{emphasis}",
    params(
        ("code" = String, Path, description = "Course code"),
        ("emphasis" = String, Path, description = "Emphasis code")
    ),
    responses(
        (status = 200, description = "The emphasis", body = Emphasis),
        (status = 404, description = "Unknown emphasis")
    )
)]
pub async fn get_emphasis_handler(
    State(app_state): State<Arc<AppState>>,
    Path((code, emphasis)): Path<(String, String)>,
) -> Result<Json<Emphasis>, HttpError> {
    app_state
        .service
        .get_emphasis_by_code(&code, &emphasis)
        .await?
        .map(Json)
        .ok_or_else(|| HttpError::not_found("Ênfase não encontrada"))
}

/// Disciplines of the course core, ordered by suggested period.
#[utoipa::path(
    get,
    path = "/courses/{code}/disciplines",
    params(("code" = String, Path, description = "Course code")),
    responses(
        (status = 200, description = "Basic disciplines with counts", body = Vec<DisciplineSummary>)
    )
)]
pub async fn list_basic_disciplines_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<DisciplineSummary>>, HttpError> {
    Ok(Json(app_state.service.list_basic_disciplines(&code).await?))
}

/// Disciplines specific to one emphasis, ordered by suggested period.
#[utoipa::path(
    get,
    path = "/courses/{code}/emphases/{emphasis}/disciplines",
    params(
        ("code" = String, Path, description = "Course code"),
        ("emphasis" = String, Path, description = "Emphasis code")
    ),
    responses(
        (status = 200, description = "Specific disciplines with counts", body = Vec<DisciplineSummary>)
    )
)]
pub async fn list_emphasis_disciplines_handler(
    State(app_state): State<Arc<AppState>>,
    Path((code, emphasis)): Path<(String, String)>,
) -> Result<Json<Vec<DisciplineSummary>>, HttpError> {
    let disciplines = app_state
        .service
        .list_emphasis_disciplines(&code, &emphasis)
        .await?;
    Ok(Json(disciplines))
}

/// A discipline by code or id, with its first course association and counts.
#[utoipa::path(
    get,
    path = "/disciplines/{id}",
    params(("id" = String, Path, description = "Discipline code or id")),
    responses(
        (status = 200, description = "The discipline", body = DisciplineSummary),
        (status = 404, description = "Unknown discipline")
    )
)]
pub async fn get_discipline_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code_or_id): Path<String>,
) -> Result<Json<DisciplineSummary>, HttpError> {
    let not_found = || HttpError::not_found("Disciplina não encontrada");
    let discipline = app_state
        .service
        .get_discipline(&code_or_id)
        .await?
        .ok_or_else(not_found)?;
    app_state
        .service
        .get_discipline_details(&discipline.id.to_string())
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// Professors who teach a discipline, with their rating aggregates.
#[utoipa::path(
    get,
    path = "/disciplines/{id}/professors",
    params(("id" = String, Path, description = "Discipline id")),
    responses(
        (status = 200, description = "Professors sorted by name", body = Vec<ProfessorStats>),
        (status = 400, description = "Malformed id")
    )
)]
pub async fn list_discipline_professors_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProfessorStats>>, HttpError> {
    let professors = app_state
        .service
        .list_professors_for_discipline(&id)
        .await?;
    Ok(Json(professors))
}

/// Courses that offer a discipline.
#[utoipa::path(
    get,
    path = "/disciplines/{id}/courses",
    params(("id" = String, Path, description = "Discipline code")),
    responses(
        (status = 200, description = "Course associations", body = Vec<CourseAssociation>),
        (status = 404, description = "Unknown discipline")
    )
)]
pub async fn list_discipline_courses_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<CourseAssociation>>, HttpError> {
    let courses = app_state
        .service
        .list_courses_of_discipline(&code)
        .await?;
    Ok(Json(courses))
}

/// The professor page: ratings newest first and per-discipline aggregates.
#[utoipa::path(
    get,
    path = "/professors/{id}",
    params(("id" = String, Path, description = "Professor id")),
    responses(
        (status = 200, description = "The professor profile", body = ProfessorProfile),
        (status = 404, description = "Unknown professor")
    )
)]
pub async fn get_professor_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProfessorProfile>, HttpError> {
    app_state
        .service
        .get_professor_profile(&id)
        .await?
        .map(Json)
        .ok_or_else(|| HttpError::not_found("Professor não encontrado"))
}

/// Professors whose name matches `q`, used before creating a new one.
#[utoipa::path(
    get,
    path = "/professors",
    params(SearchQuery),
    responses(
        (status = 200, description = "Up to ten professors", body = Vec<Professor>)
    )
)]
pub async fn search_professors_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Professor>>, HttpError> {
    let term = query.q.unwrap_or_default();
    Ok(Json(app_state.service.search_professors(&term).await?))
}

/// Combined discipline and professor search.
#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Disciplines first, then professors", body = Vec<SearchHit>)
    )
)]
pub async fn search_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, HttpError> {
    let term = query.q.unwrap_or_default();
    Ok(Json(app_state.service.search(&term).await?))
}

/// Site-wide counters.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Counts of courses, disciplines, professors and ratings", body = GeneralStats)
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<GeneralStats>, HttpError> {
    Ok(Json(app_state.service.general_stats().await?))
}

//=========================================================================================
// Authenticated Write Handlers
//=========================================================================================

/// Register a professor, optionally linking it to a discipline.
#[utoipa::path(
    post,
    path = "/professors",
    request_body = CreateProfessorRequest,
    responses(
        (status = 201, description = "Professor created", body = Professor),
        (status = 400, description = "Invalid name or email"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Already linked to the discipline"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn create_professor_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateProfessorRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let name = sanitize_value(&req.name);
    let email = req.email.as_deref();
    let professor = match req.discipline_id.as_deref() {
        Some(discipline_id) => {
            app_state
                .service
                .create_professor_for_discipline(&name, email, discipline_id)
                .await?
        }
        None => app_state.service.create_professor(&name, email).await?,
    };
    info!(user_id = %user.id, professor_id = %professor.id, "Professor registered");
    Ok((StatusCode::CREATED, Json(professor)))
}

/// Link an existing professor to a discipline.
#[utoipa::path(
    post,
    path = "/disciplines/{id}/professors",
    params(("id" = String, Path, description = "Discipline id")),
    request_body = LinkProfessorRequest,
    responses(
        (status = 201, description = "Professor linked", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Already linked"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn link_professor_handler(
    State(app_state): State<Arc<AppState>>,
    Path(discipline_id): Path<String>,
    AppJson(req): AppJson<LinkProfessorRequest>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .service
        .link_professor_to_discipline(&req.professor_id, &discipline_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Professor associado à disciplina".to_string(),
        }),
    ))
}

/// Rate a professor in a discipline. One rating per user and pair.
#[utoipa::path(
    post,
    path = "/ratings",
    request_body = CreateRatingRequest,
    responses(
        (status = 201, description = "Rating stored", body = Rating),
        (status = 400, description = "Invalid ids, stars or comment"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Already rated"),
        (status = 429, description = "Too many ratings")
    )
)]
pub async fn create_rating_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateRatingRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let stars = stars_from_json(&req.stars).ok_or_else(|| HttpError::bad_request(INVALID_STARS))?;
    let comment = sanitize_value(&req.comment);
    let rating = app_state
        .service
        .create_rating(
            &req.professor_id,
            &req.discipline_id,
            &user.id.to_string(),
            stars,
            Some(comment.as_str()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

/// Whether the signed-in user already rated the professor in the discipline.
#[utoipa::path(
    get,
    path = "/ratings/check",
    params(CheckRatingQuery),
    responses(
        (status = 200, description = "Rating state", body = RatedResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn check_rating_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CheckRatingQuery>,
) -> Json<RatedResponse> {
    let rated = app_state
        .service
        .has_user_rated(
            &query.professor_id,
            &query.discipline_id,
            &user.id.to_string(),
        )
        .await;
    Json(RatedResponse { rated })
}

/// Send a bug report or suggestion.
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, description = "Feedback stored", body = Feedback),
        (status = 400, description = "Invalid title, description or kind"),
        (status = 401, description = "Not signed in"),
        (status = 429, description = "Too many reports")
    )
)]
pub async fn create_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateFeedbackRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = user.email.as_deref().unwrap_or_default();
    let feedback = app_state
        .service
        .create_feedback(
            email,
            &sanitize_value(&req.kind),
            &sanitize_value(&req.title),
            &sanitize_value(&req.description),
            req.page.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

//=========================================================================================
// Administration Handlers
//=========================================================================================

/// Associate a discipline with one or more courses, updating existing pairs.
#[utoipa::path(
    post,
    path = "/admin/associations",
    request_body = AssociationRequest,
    responses(
        (status = 200, description = "Associations stored", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown discipline or course")
    )
)]
pub async fn associate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<AssociationRequest>,
) -> Result<Json<MessageResponse>, HttpError> {
    app_state
        .service
        .associate_discipline_courses(
            &req.discipline_code,
            &req.course_codes,
            req.suggested_period.as_deref(),
            req.mandatory,
        )
        .await?;
    info!(user_id = %user.id, discipline = %req.discipline_code, "Associations updated");
    Ok(Json(MessageResponse {
        message: "Associações atualizadas".to_string(),
    }))
}

/// Remove the association between a discipline and a course.
#[utoipa::path(
    delete,
    path = "/admin/associations",
    params(RemoveAssociationQuery),
    responses(
        (status = 204, description = "Association removed"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown discipline or course")
    )
)]
pub async fn remove_association_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<RemoveAssociationQuery>,
) -> Result<StatusCode, HttpError> {
    app_state
        .service
        .remove_discipline_course(&query.discipline_code, &query.course_code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every discipline offered by a course, with the association attributes.
#[utoipa::path(
    get,
    path = "/admin/courses/{code}/disciplines",
    params(("code" = String, Path, description = "Course code")),
    responses(
        (status = 200, description = "Course offerings", body = Vec<DisciplineOffering>),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_course_offerings_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<DisciplineOffering>>, HttpError> {
    Ok(Json(
        app_state.service.list_disciplines_of_course(&code).await?,
    ))
}

/// Tag the listed discipline codes as basic.
#[utoipa::path(
    post,
    path = "/admin/basic-disciplines",
    request_body = BasicDisciplinesRequest,
    responses(
        (status = 200, description = "Rows updated", body = UpdatedResponse),
        (status = 400, description = "No codes given"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn mark_basic_handler(
    State(app_state): State<Arc<AppState>>,
    AppJson(req): AppJson<BasicDisciplinesRequest>,
) -> Result<Json<UpdatedResponse>, HttpError> {
    let updated = app_state
        .service
        .mark_basic_disciplines(&req.codes)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}
