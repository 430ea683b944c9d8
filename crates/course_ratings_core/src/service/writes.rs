//! Duplicate-checked writes: professors, professor/discipline links and ratings.
//!
//! Each write validates its input, charges the actor's rate limit, checks for an
//! existing record and then inserts. The check is not atomic; a unique
//! constraint violation reported by the backend is treated exactly like a
//! positive pre-check.

use tracing::{error, warn};
use uuid::Uuid;

use super::{parse_id, RatingsService};
use crate::domain::{NewRating, Professor, Rating};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::PortError;
use crate::validation::{sanitize_email, sanitize_string, validate_stars, validate_uuid};

pub const MIN_PROFESSOR_NAME_LEN: usize = 2;
pub const MAX_COMMENT_LEN: usize = 1000;

pub const ALREADY_LINKED: &str = "Professor já está associado a esta disciplina";
pub const ALREADY_RATED: &str = "Você já avaliou este professor nesta disciplina";

const INVALID_PROFESSOR_ID: &str = "ID do professor inválido";
const INVALID_DISCIPLINE_ID: &str = "ID da disciplina inválido";
const INVALID_USER_ID: &str = "ID do usuário inválido";

impl RatingsService {
    /// Creates a professor. The name must have at least two characters after
    /// sanitization; an email, when given, must be well formed.
    pub async fn create_professor(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> ServiceResult<Professor> {
        let name = sanitize_string(name);
        if name.chars().count() < MIN_PROFESSOR_NAME_LEN {
            return Err(ServiceError::validation(
                "Nome do professor deve ter pelo menos 2 caracteres",
            ));
        }

        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(raw) => {
                let cleaned = sanitize_email(raw);
                if cleaned.is_empty() {
                    return Err(ServiceError::validation("Email inválido"));
                }
                Some(cleaned)
            }
            None => None,
        };

        self.enforce_rate_limit(
            &format!("create_prof_{}", name.to_lowercase()),
            "Muitas tentativas de cadastro. Tente novamente em alguns instantes.",
        )
        .await?;

        self.log_event("Creating professor", &(&name, email.is_some()));
        let professor = self
            .db
            .insert_professor(&name, email.as_deref())
            .await
            .map_err(|e| self.backend_failure("Failed to create professor", e))?;
        self.log_event("Professor created", &professor.id);
        Ok(professor)
    }

    /// Associates a professor with a discipline. At most one link per pair.
    pub async fn link_professor_to_discipline(
        &self,
        professor_id: &str,
        discipline_id: &str,
    ) -> ServiceResult<()> {
        let professor_id = parse_id(professor_id, INVALID_PROFESSOR_ID)?;
        let discipline_id = parse_id(discipline_id, INVALID_DISCIPLINE_ID)?;

        self.enforce_rate_limit(
            &format!("link_{professor_id}_{discipline_id}"),
            "Muitas tentativas de associação. Tente novamente em alguns instantes.",
        )
        .await?;

        let exists = self
            .db
            .professor_link_exists(professor_id, discipline_id)
            .await
            .map_err(|e| self.backend_failure("Failed to check existing link", e))?;
        if exists {
            return Err(ServiceError::Duplicate(ALREADY_LINKED.to_string()));
        }

        self.log_event("Linking professor to discipline", &(professor_id, discipline_id));
        match self.db.insert_professor_link(professor_id, discipline_id).await {
            Ok(()) => {
                self.log_event("Professor linked", &(professor_id, discipline_id));
                Ok(())
            }
            Err(PortError::Duplicate(_)) => Err(ServiceError::Duplicate(ALREADY_LINKED.to_string())),
            Err(e) => Err(self.backend_failure("Failed to link professor", e)),
        }
    }

    /// Creates a professor and links it to a discipline as one unit.
    ///
    /// When linking fails the new professor is deleted again so no orphan is
    /// left behind, and the linking error is returned.
    pub async fn create_professor_for_discipline(
        &self,
        name: &str,
        email: Option<&str>,
        discipline_id: &str,
    ) -> ServiceResult<Professor> {
        if !validate_uuid(discipline_id) {
            return Err(ServiceError::validation(INVALID_DISCIPLINE_ID));
        }
        let professor = self.create_professor(name, email).await?;

        let linked = self
            .link_professor_to_discipline(&professor.id.to_string(), discipline_id)
            .await;
        if let Err(link_error) = linked {
            warn!(professor_id = %professor.id, "Linking new professor failed, removing it");
            if let Err(cleanup_error) = self.db.delete_professor(professor.id).await {
                error!(
                    professor_id = %professor.id,
                    error = %cleanup_error,
                    "Failed to remove orphaned professor"
                );
            }
            return Err(link_error);
        }
        Ok(professor)
    }

    /// Stores one rating per (professor, discipline, user).
    pub async fn create_rating(
        &self,
        professor_id: &str,
        discipline_id: &str,
        user_id: &str,
        stars: i64,
        comment: Option<&str>,
    ) -> ServiceResult<Rating> {
        let professor_id = parse_id(professor_id, INVALID_PROFESSOR_ID)?;
        let discipline_id = parse_id(discipline_id, INVALID_DISCIPLINE_ID)?;
        let user_id = parse_id(user_id, INVALID_USER_ID)?;
        if !validate_stars(stars) {
            return Err(ServiceError::validation(
                "Número de estrelas deve ser entre 1 e 5",
            ));
        }
        let stars = u8::try_from(stars)
            .map_err(|_| ServiceError::validation("Número de estrelas deve ser entre 1 e 5"))?;
        let comment = clean_comment(comment)?;

        self.enforce_rate_limit(
            &format!("avaliacao_{user_id}"),
            "Muitas avaliações em pouco tempo. Aguarde antes de avaliar novamente.",
        )
        .await?;

        let exists = self
            .db
            .rating_exists(professor_id, discipline_id, user_id)
            .await
            .map_err(|e| self.backend_failure("Failed to check existing rating", e))?;
        if exists {
            return Err(ServiceError::Duplicate(ALREADY_RATED.to_string()));
        }

        let new_rating = NewRating {
            professor_id,
            discipline_id,
            user_id,
            stars,
            comment,
        };
        self.log_event("Creating rating", &new_rating);
        match self.db.insert_rating(&new_rating).await {
            Ok(rating) => {
                self.log_event("Rating created", &rating.id);
                Ok(rating)
            }
            Err(PortError::Duplicate(_)) => Err(ServiceError::Duplicate(ALREADY_RATED.to_string())),
            Err(e) => Err(self.backend_failure("Failed to create rating", e)),
        }
    }

    /// Whether `user_id` already rated the professor in that discipline.
    ///
    /// Malformed ids and backend failures are logged and answer `false`; the
    /// insert path re-checks and the schema enforces uniqueness anyway.
    pub async fn has_user_rated(
        &self,
        professor_id: &str,
        discipline_id: &str,
        user_id: &str,
    ) -> bool {
        let ids = [professor_id, discipline_id, user_id];
        if !ids.iter().all(|id| validate_uuid(id)) {
            error!("Invalid ids supplied to rating check");
            return false;
        }
        let [Ok(professor_id), Ok(discipline_id), Ok(user_id)] = ids.map(Uuid::parse_str) else {
            return false;
        };
        match self
            .db
            .rating_exists(professor_id, discipline_id, user_id)
            .await
        {
            Ok(exists) => {
                self.log_event("Existing rating check", &exists);
                exists
            }
            Err(e) => {
                self.backend_failure("Failed to check existing rating", e);
                false
            }
        }
    }
}

/// Sanitized comment; empty becomes `None`.
fn clean_comment(comment: Option<&str>) -> ServiceResult<Option<String>> {
    let Some(raw) = comment else {
        return Ok(None);
    };
    let cleaned = sanitize_string(raw);
    if cleaned.chars().count() > MAX_COMMENT_LEN {
        return Err(ServiceError::validation(
            "Comentário muito longo (máximo 1000 caracteres)",
        ));
    }
    Ok(Some(cleaned).filter(|c| !c.is_empty()))
}
