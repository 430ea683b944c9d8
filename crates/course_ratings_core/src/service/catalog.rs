//! Read-only catalog queries: courses, emphases, disciplines, professors,
//! search and site statistics.

use futures::future::{try_join, try_join4, try_join_all};
use tracing::warn;

use super::{average_stars, parse_id, RatingsService};
use crate::domain::{
    CatalogTable, Course, Discipline, DisciplineOffering, DisciplineSummary, DisciplineTier,
    Emphasis, GeneralStats, Professor, ProfessorDisciplineStats, ProfessorProfile, ProfessorStats,
    SearchHit,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::PortError;
use crate::validation::{sanitize_string, validate_uuid};

/// Shortest term the combined search accepts.
pub const MIN_SEARCH_LEN: usize = 3;
/// Maximum hits per section of a search.
pub const SEARCH_LIMIT: i64 = 10;
const SEARCH_PROFESSOR_DISCIPLINES: usize = 3;
const NO_PROFESSOR_PLACEHOLDER: &str = "Não informado";
const COURSE_CODE_REQUIRED: &str = "Código do curso é obrigatório";
const EMPHASIS_CODE_REQUIRED: &str = "Código da ênfase é obrigatório";

/// Sanitized, uppercased code; empty means the input was unusable.
fn clean_code(raw: &str) -> String {
    sanitize_string(raw).to_uppercase()
}

impl RatingsService {
    pub async fn list_courses(&self) -> ServiceResult<Vec<Course>> {
        self.db
            .list_courses()
            .await
            .map_err(|e| self.backend_failure("Failed to list courses", e))
    }

    /// Looks a course up by code, ignoring case.
    pub async fn get_course_by_code(&self, code: &str) -> ServiceResult<Option<Course>> {
        let code = clean_code(code);
        if code.is_empty() {
            return Err(ServiceError::validation(COURSE_CODE_REQUIRED));
        }
        self.log_event("Fetching course by code", &code);
        let course = self
            .db
            .find_course_by_code(&code)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch course", e))?;
        self.log_event("Course lookup finished", &course.as_ref().map(|c| c.id));
        Ok(course)
    }

    pub async fn list_emphases(&self, course_id: &str) -> ServiceResult<Vec<Emphasis>> {
        let course_id = parse_id(course_id, "ID do curso inválido")?;
        self.db
            .list_emphases_by_course(course_id)
            .await
            .map_err(|e| self.backend_failure("Failed to list emphases", e))
    }

    pub async fn get_emphasis_by_code(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> ServiceResult<Option<Emphasis>> {
        let (course_code, emphasis_code) = clean_code_pair(course_code, emphasis_code)?;
        self.db
            .find_emphasis_by_code(&course_code, &emphasis_code)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch emphasis", e))
    }

    /// Disciplines of the course core, ordered by suggested period.
    pub async fn list_basic_disciplines(
        &self,
        course_code: &str,
    ) -> ServiceResult<Vec<DisciplineSummary>> {
        let course_code = clean_code(course_code);
        if course_code.is_empty() {
            return Err(ServiceError::validation(COURSE_CODE_REQUIRED));
        }
        self.log_event("Fetching basic disciplines", &course_code);
        let offerings = self
            .db
            .list_course_offerings(&course_code)
            .await
            .map_err(|e| self.backend_failure("Failed to list basic disciplines", e))?;
        self.log_event("Basic disciplines found", &offerings.len());
        self.summarize_all(offerings, DisciplineTier::Basic).await
    }

    /// Disciplines specific to one emphasis, ordered by suggested period.
    pub async fn list_emphasis_disciplines(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> ServiceResult<Vec<DisciplineSummary>> {
        let (course_code, emphasis_code) = clean_code_pair(course_code, emphasis_code)?;
        let offerings = self
            .db
            .list_emphasis_offerings(&course_code, &emphasis_code)
            .await
            .map_err(|e| self.backend_failure("Failed to list emphasis disciplines", e))?;
        self.summarize_all(offerings, DisciplineTier::Specific).await
    }

    /// Finds a discipline by code first, then by id.
    pub async fn get_discipline(&self, code_or_id: &str) -> ServiceResult<Option<Discipline>> {
        let raw = code_or_id.trim();
        let code = clean_code(raw);
        if !code.is_empty() {
            let by_code = self
                .db
                .find_discipline_by_code(&code)
                .await
                .map_err(|e| self.backend_failure("Failed to fetch discipline by code", e))?;
            if by_code.is_some() {
                return Ok(by_code);
            }
        }
        if !validate_uuid(raw) {
            return Ok(None);
        }
        let id = parse_id(raw, "ID da disciplina inválido")?;
        self.db
            .find_discipline_by_id(id)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch discipline by id", e))
    }

    /// A discipline with its first course association and aggregate counts.
    pub async fn get_discipline_details(
        &self,
        discipline_id: &str,
    ) -> ServiceResult<Option<DisciplineSummary>> {
        let id = parse_id(discipline_id, "ID da disciplina inválido")?;
        let Some(discipline) = self
            .db
            .find_discipline_by_id(id)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch discipline", e))?
        else {
            return Ok(None);
        };

        let (associations, (total_professors, total_ratings)) = try_join(
            self.db.list_discipline_courses(id),
            try_join(
                self.db.count_professors_of_discipline(id),
                self.db.count_ratings_for_discipline(id),
            ),
        )
        .await
        .map_err(|e| self.backend_failure("Failed to load discipline details", e))?;

        let association = associations.into_iter().next();
        Ok(Some(DisciplineSummary {
            id: discipline.id,
            code: discipline.code,
            name: discipline.name,
            period: discipline.period,
            kind: discipline.kind,
            credit_hours: discipline.credit_hours,
            suggested_period: association
                .as_ref()
                .and_then(|a| a.suggested_period.clone()),
            mandatory: association.as_ref().is_some_and(|a| a.mandatory),
            course_name: association.as_ref().map(|a| a.course.name.clone()),
            course_code: association.as_ref().map(|a| a.course.code.clone()),
            emphasis_name: None,
            emphasis_code: None,
            total_professors,
            total_ratings,
        }))
    }

    /// Professors teaching a discipline with their rating statistics, by name.
    pub async fn list_professors_for_discipline(
        &self,
        discipline_id: &str,
    ) -> ServiceResult<Vec<ProfessorStats>> {
        let id = parse_id(discipline_id, "ID da disciplina inválido")?;
        let professors = self
            .db
            .list_professors_of_discipline(id)
            .await
            .map_err(|e| self.backend_failure("Failed to list professors of discipline", e))?;

        let mut stats = try_join_all(professors.into_iter().map(|professor| async move {
            let (stars, total_disciplines) = try_join(
                self.db.list_stars(professor.id, None),
                self.db.count_disciplines_of_professor(professor.id),
            )
            .await?;
            Ok::<_, PortError>(ProfessorStats {
                id: professor.id,
                name: professor.name,
                email: professor.email,
                total_disciplines,
                total_ratings: stars.len() as i64,
                average_stars: average_stars(&stars),
            })
        }))
        .await
        .map_err(|e| self.backend_failure("Failed to compute professor statistics", e))?;

        stats.sort_by_key(|p| p.name.to_lowercase());
        Ok(stats)
    }

    /// The professor page: ratings newest first plus per-discipline aggregates.
    pub async fn get_professor_profile(
        &self,
        professor_id: &str,
    ) -> ServiceResult<Option<ProfessorProfile>> {
        let id = parse_id(professor_id, "ID do professor inválido")?;
        let Some(professor) = self
            .db
            .find_professor(id)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch professor", e))?
        else {
            return Ok(None);
        };

        let (ratings, disciplines) = try_join(
            self.db.list_ratings_for_professor(id),
            self.db.list_disciplines_of_professor(id),
        )
        .await
        .map_err(|e| self.backend_failure("Failed to load professor profile", e))?;

        let disciplines = try_join_all(disciplines.into_iter().map(|discipline| async move {
            let stars = self.db.list_stars(id, Some(discipline.id)).await?;
            Ok::<_, PortError>(ProfessorDisciplineStats {
                discipline,
                total_ratings: stars.len() as i64,
                average_stars: average_stars(&stars),
            })
        }))
        .await
        .map_err(|e| self.backend_failure("Failed to compute discipline statistics", e))?;

        Ok(Some(ProfessorProfile {
            professor,
            ratings,
            disciplines,
        }))
    }

    /// Search-before-create lookup used when adding a professor.
    pub async fn search_professors(&self, term: &str) -> ServiceResult<Vec<Professor>> {
        let term = sanitize_string(term);
        if term.is_empty() {
            return Ok(Vec::new());
        }
        self.db
            .search_professors(&term, SEARCH_LIMIT)
            .await
            .map_err(|e| self.backend_failure("Failed to search professors", e))
    }

    /// Combined search over discipline code/name and professor name.
    ///
    /// Terms shorter than three characters return nothing. A failing section is
    /// logged and left empty so the other one can still be shown.
    pub async fn search(&self, term: &str) -> ServiceResult<Vec<SearchHit>> {
        let term = sanitize_string(term);
        if term.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        match self.search_discipline_hits(&term).await {
            Ok(found) => hits.extend(found),
            Err(e) => warn!(error = %e, "Discipline search failed"),
        }
        match self.search_professor_hits(&term).await {
            Ok(found) => hits.extend(found),
            Err(e) => warn!(error = %e, "Professor search failed"),
        }
        Ok(hits)
    }

    async fn search_discipline_hits(&self, term: &str) -> ServiceResult<Vec<SearchHit>> {
        let disciplines = self.db.search_disciplines(term, SEARCH_LIMIT).await?;
        let hits = try_join_all(disciplines.into_iter().map(|discipline| async move {
            let professors = self.db.list_professors_of_discipline(discipline.id).await?;
            let names = if professors.is_empty() {
                NO_PROFESSOR_PLACEHOLDER.to_string()
            } else {
                professors
                    .into_iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            Ok::<_, ServiceError>(SearchHit::Discipline {
                id: discipline.id,
                code: discipline.code,
                name: discipline.name,
                professors: names,
            })
        }))
        .await?;
        Ok(hits)
    }

    async fn search_professor_hits(&self, term: &str) -> ServiceResult<Vec<SearchHit>> {
        let professors = self.db.search_professors(term, SEARCH_LIMIT).await?;
        let hits = try_join_all(professors.into_iter().map(|professor| async move {
            let (disciplines, stars) = try_join(
                self.db.list_disciplines_of_professor(professor.id),
                self.db.list_stars(professor.id, None),
            )
            .await?;
            Ok::<_, ServiceError>(SearchHit::Professor {
                id: professor.id,
                name: professor.name,
                email: professor.email,
                disciplines: disciplines
                    .into_iter()
                    .take(SEARCH_PROFESSOR_DISCIPLINES)
                    .map(|d| d.name)
                    .collect(),
                average_stars: average_stars(&stars),
            })
        }))
        .await?;
        Ok(hits)
    }

    pub async fn general_stats(&self) -> ServiceResult<GeneralStats> {
        let (total_courses, total_disciplines, total_professors, total_ratings) = try_join4(
            self.db.count_rows(CatalogTable::Courses),
            self.db.count_rows(CatalogTable::Disciplines),
            self.db.count_rows(CatalogTable::Professors),
            self.db.count_rows(CatalogTable::Ratings),
        )
        .await
        .map_err(|e| self.backend_failure("Failed to count catalog rows", e))?;
        Ok(GeneralStats {
            total_courses,
            total_disciplines,
            total_professors,
            total_ratings,
        })
    }

    async fn summarize_all(
        &self,
        offerings: Vec<DisciplineOffering>,
        tier: DisciplineTier,
    ) -> ServiceResult<Vec<DisciplineSummary>> {
        try_join_all(offerings.into_iter().map(|offering| async move {
            let id = offering.discipline.id;
            let (total_professors, total_ratings) = try_join(
                self.db.count_professors_of_discipline(id),
                self.db.count_ratings_for_discipline(id),
            )
            .await?;
            let discipline = offering.discipline;
            Ok::<_, PortError>(DisciplineSummary {
                id: discipline.id,
                code: discipline.code,
                name: discipline.name,
                period: discipline.period,
                kind: Some(tier.label().to_string()),
                credit_hours: discipline.credit_hours,
                suggested_period: offering.suggested_period,
                mandatory: offering.mandatory,
                course_name: None,
                course_code: None,
                emphasis_name: None,
                emphasis_code: None,
                total_professors,
                total_ratings,
            })
        }))
        .await
        .map_err(|e| self.backend_failure("Failed to compute discipline statistics", e))
    }
}

fn clean_code_pair(course_code: &str, emphasis_code: &str) -> ServiceResult<(String, String)> {
    let course_code = clean_code(course_code);
    if course_code.is_empty() {
        return Err(ServiceError::validation(COURSE_CODE_REQUIRED));
    }
    let emphasis_code = clean_code(emphasis_code);
    if emphasis_code.is_empty() {
        return Err(ServiceError::validation(EMPHASIS_CODE_REQUIRED));
    }
    Ok((course_code, emphasis_code))
}
