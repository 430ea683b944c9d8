pub mod domain;
pub mod error;
pub mod ports;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod validation;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use domain::{
    AuthTokens, AuthUser, CatalogTable, Course, CourseAssociation, Discipline,
    DisciplineOffering, DisciplineSummary, DisciplineTier, Emphasis, Feedback, FeedbackKind,
    GeneralStats, NewFeedback, NewRating, Professor, ProfessorDisciplineStats, ProfessorProfile,
    ProfessorStats, Rating, RatingWithDiscipline, SearchHit,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{AuthProvider, DatabaseService, PortError, PortResult, RateLimiter};
pub use rate_limit::InMemoryRateLimiter;
pub use service::{LogMode, RatingsService};
pub use session::{CallbackParams, PendingSignIn, SessionContext, SessionState};
