//! Shared fixture for the service integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use course_ratings_core::domain::{Course, Discipline, Emphasis, Professor};
use course_ratings_core::test_support::InMemoryDatabase;
use course_ratings_core::{InMemoryRateLimiter, LogMode, RateLimiter, RatingsService};

pub struct Fixture {
    pub db: Arc<InMemoryDatabase>,
    pub service: RatingsService,
    pub course: Course,
    pub emphasis: Emphasis,
    pub calculus: Discipline,
    pub networks: Discipline,
    pub ana: Professor,
}

impl Fixture {
    /// A small catalog with the default limiter.
    pub fn new() -> Self {
        Self::with_limiter(Arc::new(InMemoryRateLimiter::new()))
    }

    pub fn with_limiter(limiter: Arc<dyn RateLimiter>) -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let course = db.add_course("Ciência da Computação", "CC");
        let emphasis = db.add_emphasis(course.id, "Redes", "RED");
        let calculus = db.add_discipline("MAT01", "Cálculo I");
        let networks = db.add_discipline("CC42", "Redes de Computadores");
        db.offer_in_course(calculus.id, course.id, Some("1"), true);
        db.offer_in_emphasis(networks.id, emphasis.id, Some("5"), false);

        let ana = db.add_professor("Ana Souza");
        db.link(ana.id, calculus.id);

        let service = RatingsService::new(db.clone(), limiter, LogMode::Development);
        Self {
            db,
            service,
            course,
            emphasis,
            calculus,
            networks,
            ana,
        }
    }

    /// A fixture whose limiter never denies within a test.
    pub fn unlimited() -> Self {
        Self::with_limiter(Arc::new(InMemoryRateLimiter::with_limits(
            u32::MAX,
            Duration::from_secs(60),
        )))
    }
}

pub fn user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
