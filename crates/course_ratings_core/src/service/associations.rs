//! Administration of discipline/course associations.

use futures::future::try_join;

use super::RatingsService;
use crate::domain::{Course, CourseAssociation, Discipline, DisciplineOffering};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::sanitize_string;

/// Type tag applied by [`RatingsService::mark_basic_disciplines`].
pub const BASIC_KIND: &str = "básica";

impl RatingsService {
    /// Associates a discipline with a course, updating the attributes when the
    /// pair is already associated.
    pub async fn associate_discipline_course(
        &self,
        discipline_code: &str,
        course_code: &str,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) -> ServiceResult<()> {
        let (discipline, course) = self.resolve_pair(discipline_code, course_code).await?;
        let discipline = discipline.ok_or_else(|| {
            ServiceError::NotFound(format!("Disciplina {discipline_code} não encontrada"))
        })?;
        let course = course
            .ok_or_else(|| ServiceError::NotFound(format!("Curso {course_code} não encontrado")))?;

        let suggested_period = suggested_period
            .map(sanitize_string)
            .filter(|p| !p.is_empty());
        self.db
            .upsert_discipline_course(
                discipline.id,
                course.id,
                suggested_period.as_deref(),
                mandatory,
            )
            .await
            .map_err(|e| self.backend_failure("Failed to associate discipline with course", e))?;
        self.log_event("Discipline associated", &(&discipline.code, &course.code));
        Ok(())
    }

    /// Applies [`Self::associate_discipline_course`] to each course in order,
    /// stopping at the first failure.
    pub async fn associate_discipline_courses(
        &self,
        discipline_code: &str,
        course_codes: &[String],
        suggested_period: Option<&str>,
        mandatory: bool,
    ) -> ServiceResult<()> {
        for course_code in course_codes {
            self.associate_discipline_course(
                discipline_code,
                course_code,
                suggested_period,
                mandatory,
            )
            .await?;
        }
        Ok(())
    }

    pub async fn remove_discipline_course(
        &self,
        discipline_code: &str,
        course_code: &str,
    ) -> ServiceResult<()> {
        let (Some(discipline), Some(course)) =
            self.resolve_pair(discipline_code, course_code).await?
        else {
            return Err(ServiceError::NotFound(
                "Disciplina ou curso não encontrado".to_string(),
            ));
        };
        self.db
            .delete_discipline_course(discipline.id, course.id)
            .await
            .map_err(|e| self.backend_failure("Failed to remove association", e))
    }

    pub async fn list_courses_of_discipline(
        &self,
        discipline_code: &str,
    ) -> ServiceResult<Vec<CourseAssociation>> {
        let code = sanitize_string(discipline_code).to_uppercase();
        let discipline = self
            .db
            .find_discipline_by_code(&code)
            .await
            .map_err(|e| self.backend_failure("Failed to fetch discipline", e))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Disciplina {discipline_code} não encontrada"))
            })?;
        self.db
            .list_discipline_courses(discipline.id)
            .await
            .map_err(|e| self.backend_failure("Failed to list discipline courses", e))
    }

    pub async fn list_disciplines_of_course(
        &self,
        course_code: &str,
    ) -> ServiceResult<Vec<DisciplineOffering>> {
        let code = sanitize_string(course_code).to_uppercase();
        if code.is_empty() {
            return Err(ServiceError::validation("Código do curso é obrigatório"));
        }
        self.db
            .list_course_offerings(&code)
            .await
            .map_err(|e| self.backend_failure("Failed to list course disciplines", e))
    }

    /// Tags every listed discipline code as basic. Returns the rows updated.
    pub async fn mark_basic_disciplines(&self, codes: &[String]) -> ServiceResult<u64> {
        let codes: Vec<String> = codes
            .iter()
            .map(|c| sanitize_string(c).to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if codes.is_empty() {
            return Err(ServiceError::validation(
                "Informe ao menos um código de disciplina",
            ));
        }
        let updated = self
            .db
            .set_discipline_kind(&codes, BASIC_KIND)
            .await
            .map_err(|e| self.backend_failure("Failed to tag basic disciplines", e))?;
        self.log_event("Basic disciplines tagged", &updated);
        Ok(updated)
    }

    async fn resolve_pair(
        &self,
        discipline_code: &str,
        course_code: &str,
    ) -> ServiceResult<(Option<Discipline>, Option<Course>)> {
        let discipline_code = sanitize_string(discipline_code).to_uppercase();
        let course_code = sanitize_string(course_code).to_uppercase();
        try_join(
            self.db.find_discipline_by_code(&discipline_code),
            self.db.find_course_by_code(&course_code),
        )
        .await
        .map_err(|e| self.backend_failure("Failed to resolve discipline and course", e))
    }
}
