//! Append-only feedback reports.

use super::RatingsService;
use crate::domain::{Feedback, FeedbackKind, NewFeedback};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::{sanitize_email, sanitize_string};

pub const TITLE_LEN: std::ops::RangeInclusive<usize> = 5..=100;
pub const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 10..=2000;

impl RatingsService {
    /// Validates and stores a feedback report, rate limited per email.
    pub async fn create_feedback(
        &self,
        user_email: &str,
        kind: &str,
        title: &str,
        description: &str,
        page: Option<&str>,
    ) -> ServiceResult<Feedback> {
        let user_email = sanitize_email(user_email);
        if user_email.is_empty() {
            return Err(ServiceError::validation("Email inválido"));
        }

        let title = sanitize_string(title);
        let title_len = title.chars().count();
        if title_len < *TITLE_LEN.start() {
            return Err(ServiceError::validation(
                "Título deve ter pelo menos 5 caracteres",
            ));
        }
        if title_len > *TITLE_LEN.end() {
            return Err(ServiceError::validation(
                "Título muito longo (máximo 100 caracteres)",
            ));
        }

        let description = sanitize_string(description);
        let description_len = description.chars().count();
        if description_len < *DESCRIPTION_LEN.start() {
            return Err(ServiceError::validation(
                "Descrição deve ter pelo menos 10 caracteres",
            ));
        }
        if description_len > *DESCRIPTION_LEN.end() {
            return Err(ServiceError::validation(
                "Descrição muito longa (máximo 2000 caracteres)",
            ));
        }

        let kind: FeedbackKind = kind
            .parse()
            .map_err(|_| ServiceError::validation("Tipo de feedback inválido"))?;

        let page = page.map(sanitize_string).filter(|p| !p.is_empty());

        self.enforce_rate_limit(
            &format!("feedback_{user_email}"),
            "Muitos feedbacks enviados. Aguarde antes de enviar outro.",
        )
        .await?;

        let feedback = NewFeedback {
            user_email,
            kind,
            title,
            description,
            page,
        };
        self.log_event(
            "Creating feedback",
            &(&feedback.user_email, kind, title_len, description_len),
        );
        let stored = self
            .db
            .insert_feedback(&feedback)
            .await
            .map_err(|e| self.backend_failure("Failed to create feedback", e))?;
        self.log_event("Feedback created", &stored.id);
        Ok(stored)
    }
}
