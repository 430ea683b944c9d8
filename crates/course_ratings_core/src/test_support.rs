//! In-memory implementations of the ports, for tests in this crate and in the
//! service crates. Compiled only with the `test-support` feature.
//!
//! `InMemoryDatabase` enforces the same unique keys as the relational schema:
//! one rating per (professor, discipline, user), one link per (professor,
//! discipline) and one association per (discipline, course).

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    AuthTokens, AuthUser, CatalogTable, Course, CourseAssociation, Discipline,
    DisciplineOffering, Emphasis, Feedback, NewFeedback, NewRating, Professor, Rating,
    RatingWithDiscipline,
};
use crate::ports::{AuthProvider, DatabaseService, PortError, PortResult, RateLimiter};
use crate::session::challenge_for;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Debug, Clone)]
struct Association {
    discipline_id: Uuid,
    owner_id: Uuid,
    suggested_period: Option<String>,
    mandatory: bool,
}

#[derive(Default)]
struct Tables {
    courses: Vec<Course>,
    emphases: Vec<Emphasis>,
    disciplines: Vec<Discipline>,
    course_links: Vec<Association>,
    emphasis_links: Vec<Association>,
    professors: Vec<Professor>,
    professor_links: Vec<(Uuid, Uuid)>,
    ratings: Vec<Rating>,
    feedback: Vec<Feedback>,
}

impl Tables {
    fn discipline(&self, id: Uuid) -> Option<&Discipline> {
        self.disciplines.iter().find(|d| d.id == id)
    }

    fn offerings(&self, links: &[Association], owner_id: Uuid) -> Vec<DisciplineOffering> {
        let mut offerings: Vec<DisciplineOffering> = links
            .iter()
            .filter(|l| l.owner_id == owner_id)
            .filter_map(|l| {
                self.discipline(l.discipline_id).map(|d| DisciplineOffering {
                    discipline: d.clone(),
                    suggested_period: l.suggested_period.clone(),
                    mandatory: l.mandatory,
                })
            })
            .collect();
        offerings.sort_by_key(|o| (o.suggested_period.is_none(), o.suggested_period.clone()));
        offerings
    }
}

/// A `DatabaseService` over plain vectors.
///
/// Named operations can be made to fail with [`InMemoryDatabase::fail_on`], and
/// [`InMemoryDatabase::hide_existing_records`] makes the existence checks blind
/// so a concurrent writer can be simulated.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<String>>,
    blind_checks: Mutex<bool>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_course(&self, name: &str, code: &str) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
        };
        lock(&self.tables).courses.push(course.clone());
        course
    }

    pub fn add_emphasis(&self, course_id: Uuid, name: &str, code: &str) -> Emphasis {
        let emphasis = Emphasis {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
            course_id,
        };
        lock(&self.tables).emphases.push(emphasis.clone());
        emphasis
    }

    pub fn add_discipline(&self, code: &str, name: &str) -> Discipline {
        let discipline = Discipline {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            period: None,
            credit_hours: None,
            kind: None,
        };
        lock(&self.tables).disciplines.push(discipline.clone());
        discipline
    }

    pub fn offer_in_course(
        &self,
        discipline_id: Uuid,
        course_id: Uuid,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) {
        lock(&self.tables).course_links.push(Association {
            discipline_id,
            owner_id: course_id,
            suggested_period: suggested_period.map(str::to_string),
            mandatory,
        });
    }

    pub fn offer_in_emphasis(
        &self,
        discipline_id: Uuid,
        emphasis_id: Uuid,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) {
        lock(&self.tables).emphasis_links.push(Association {
            discipline_id,
            owner_id: emphasis_id,
            suggested_period: suggested_period.map(str::to_string),
            mandatory,
        });
    }

    pub fn add_professor(&self, name: &str) -> Professor {
        let professor = Professor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
        };
        lock(&self.tables).professors.push(professor.clone());
        professor
    }

    pub fn link(&self, professor_id: Uuid, discipline_id: Uuid) {
        lock(&self.tables)
            .professor_links
            .push((professor_id, discipline_id));
    }

    pub fn add_rating(&self, professor_id: Uuid, discipline_id: Uuid, user_id: Uuid, stars: u8) {
        lock(&self.tables).ratings.push(Rating {
            id: Uuid::new_v4(),
            professor_id,
            discipline_id,
            user_id,
            stars,
            comment: None,
            created_at: Utc::now(),
        });
    }

    pub fn professors(&self) -> Vec<Professor> {
        lock(&self.tables).professors.clone()
    }

    pub fn professor_links(&self) -> Vec<(Uuid, Uuid)> {
        lock(&self.tables).professor_links.clone()
    }

    pub fn ratings(&self) -> Vec<Rating> {
        lock(&self.tables).ratings.clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        lock(&self.tables).feedback.clone()
    }

    pub fn discipline(&self, id: Uuid) -> Option<Discipline> {
        lock(&self.tables).discipline(id).cloned()
    }

    /// Makes the named port operation fail with `PortError::Unexpected`.
    pub fn fail_on(&self, operation: &str) {
        lock(&self.failing).insert(operation.to_string());
    }

    /// Existence checks report `false` while this is on; inserts still enforce
    /// the unique keys.
    pub fn hide_existing_records(&self, hide: bool) {
        *lock(&self.blind_checks) = hide;
    }

    fn guard(&self, operation: &str) -> PortResult<()> {
        if lock(&self.failing).contains(operation) {
            return Err(PortError::Unexpected(format!("{operation} failed")));
        }
        Ok(())
    }

    fn blind(&self) -> bool {
        *lock(&self.blind_checks)
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn count_rows(&self, table: CatalogTable) -> PortResult<i64> {
        self.guard("count_rows")?;
        let tables = lock(&self.tables);
        let count = match table {
            CatalogTable::Courses => tables.courses.len(),
            CatalogTable::Disciplines => tables.disciplines.len(),
            CatalogTable::Professors => tables.professors.len(),
            CatalogTable::Ratings => tables.ratings.len(),
        };
        Ok(count as i64)
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        self.guard("list_courses")?;
        let mut courses = lock(&self.tables).courses.clone();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn find_course_by_code(&self, code: &str) -> PortResult<Option<Course>> {
        self.guard("find_course_by_code")?;
        Ok(lock(&self.tables)
            .courses
            .iter()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn list_emphases_by_course(&self, course_id: Uuid) -> PortResult<Vec<Emphasis>> {
        self.guard("list_emphases_by_course")?;
        let mut emphases: Vec<Emphasis> = lock(&self.tables)
            .emphases
            .iter()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        emphases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(emphases)
    }

    async fn find_emphasis_by_code(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Option<Emphasis>> {
        self.guard("find_emphasis_by_code")?;
        let tables = lock(&self.tables);
        let Some(course) = tables.courses.iter().find(|c| c.code == course_code) else {
            return Ok(None);
        };
        Ok(tables
            .emphases
            .iter()
            .find(|e| e.course_id == course.id && e.code == emphasis_code)
            .cloned())
    }

    async fn list_course_offerings(&self, course_code: &str) -> PortResult<Vec<DisciplineOffering>> {
        self.guard("list_course_offerings")?;
        let tables = lock(&self.tables);
        let Some(course) = tables.courses.iter().find(|c| c.code == course_code) else {
            return Ok(Vec::new());
        };
        Ok(tables.offerings(&tables.course_links, course.id))
    }

    async fn list_emphasis_offerings(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Vec<DisciplineOffering>> {
        self.guard("list_emphasis_offerings")?;
        let tables = lock(&self.tables);
        let emphasis = tables
            .courses
            .iter()
            .find(|c| c.code == course_code)
            .and_then(|c| {
                tables
                    .emphases
                    .iter()
                    .find(|e| e.course_id == c.id && e.code == emphasis_code)
            });
        let Some(emphasis) = emphasis else {
            return Ok(Vec::new());
        };
        Ok(tables.offerings(&tables.emphasis_links, emphasis.id))
    }

    async fn find_discipline_by_code(&self, code: &str) -> PortResult<Option<Discipline>> {
        self.guard("find_discipline_by_code")?;
        Ok(lock(&self.tables)
            .disciplines
            .iter()
            .find(|d| d.code == code)
            .cloned())
    }

    async fn find_discipline_by_id(&self, discipline_id: Uuid) -> PortResult<Option<Discipline>> {
        self.guard("find_discipline_by_id")?;
        Ok(lock(&self.tables).discipline(discipline_id).cloned())
    }

    async fn search_disciplines(&self, term: &str, limit: i64) -> PortResult<Vec<Discipline>> {
        self.guard("search_disciplines")?;
        Ok(lock(&self.tables)
            .disciplines
            .iter()
            .filter(|d| contains_ignore_case(&d.code, term) || contains_ignore_case(&d.name, term))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn set_discipline_kind(&self, codes: &[String], kind: &str) -> PortResult<u64> {
        self.guard("set_discipline_kind")?;
        let mut tables = lock(&self.tables);
        let mut updated = 0;
        for discipline in tables
            .disciplines
            .iter_mut()
            .filter(|d| codes.contains(&d.code))
        {
            discipline.kind = Some(kind.to_string());
            updated += 1;
        }
        Ok(updated)
    }

    async fn count_ratings_for_discipline(&self, discipline_id: Uuid) -> PortResult<i64> {
        self.guard("count_ratings_for_discipline")?;
        Ok(lock(&self.tables)
            .ratings
            .iter()
            .filter(|r| r.discipline_id == discipline_id)
            .count() as i64)
    }

    async fn list_discipline_courses(
        &self,
        discipline_id: Uuid,
    ) -> PortResult<Vec<CourseAssociation>> {
        self.guard("list_discipline_courses")?;
        let tables = lock(&self.tables);
        Ok(tables
            .course_links
            .iter()
            .filter(|l| l.discipline_id == discipline_id)
            .filter_map(|l| {
                tables
                    .courses
                    .iter()
                    .find(|c| c.id == l.owner_id)
                    .map(|c| CourseAssociation {
                        course: c.clone(),
                        suggested_period: l.suggested_period.clone(),
                        mandatory: l.mandatory,
                    })
            })
            .collect())
    }

    async fn upsert_discipline_course(
        &self,
        discipline_id: Uuid,
        course_id: Uuid,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) -> PortResult<()> {
        self.guard("upsert_discipline_course")?;
        let mut tables = lock(&self.tables);
        let suggested_period = suggested_period.map(str::to_string);
        match tables
            .course_links
            .iter_mut()
            .find(|l| l.discipline_id == discipline_id && l.owner_id == course_id)
        {
            Some(existing) => {
                existing.suggested_period = suggested_period;
                existing.mandatory = mandatory;
            }
            None => tables.course_links.push(Association {
                discipline_id,
                owner_id: course_id,
                suggested_period,
                mandatory,
            }),
        }
        Ok(())
    }

    async fn delete_discipline_course(&self, discipline_id: Uuid, course_id: Uuid) -> PortResult<()> {
        self.guard("delete_discipline_course")?;
        lock(&self.tables)
            .course_links
            .retain(|l| !(l.discipline_id == discipline_id && l.owner_id == course_id));
        Ok(())
    }

    async fn find_professor(&self, professor_id: Uuid) -> PortResult<Option<Professor>> {
        self.guard("find_professor")?;
        Ok(lock(&self.tables)
            .professors
            .iter()
            .find(|p| p.id == professor_id)
            .cloned())
    }

    async fn search_professors(&self, name: &str, limit: i64) -> PortResult<Vec<Professor>> {
        self.guard("search_professors")?;
        let mut found: Vec<Professor> = lock(&self.tables)
            .professors
            .iter()
            .filter(|p| contains_ignore_case(&p.name, name))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn insert_professor(&self, name: &str, email: Option<&str>) -> PortResult<Professor> {
        self.guard("insert_professor")?;
        let professor = Professor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.map(str::to_string),
        };
        lock(&self.tables).professors.push(professor.clone());
        Ok(professor)
    }

    async fn delete_professor(&self, professor_id: Uuid) -> PortResult<()> {
        self.guard("delete_professor")?;
        lock(&self.tables).professors.retain(|p| p.id != professor_id);
        Ok(())
    }

    async fn professor_link_exists(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<bool> {
        self.guard("professor_link_exists")?;
        if self.blind() {
            return Ok(false);
        }
        Ok(lock(&self.tables)
            .professor_links
            .contains(&(professor_id, discipline_id)))
    }

    async fn insert_professor_link(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<()> {
        self.guard("insert_professor_link")?;
        let mut tables = lock(&self.tables);
        if tables.professor_links.contains(&(professor_id, discipline_id)) {
            return Err(PortError::Duplicate("professor_disciplinas".to_string()));
        }
        if tables.discipline(discipline_id).is_none() {
            return Err(PortError::Unexpected(
                "foreign key violation on disciplina_id".to_string(),
            ));
        }
        tables.professor_links.push((professor_id, discipline_id));
        Ok(())
    }

    async fn list_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<Vec<Professor>> {
        self.guard("list_professors_of_discipline")?;
        let tables = lock(&self.tables);
        Ok(tables
            .professor_links
            .iter()
            .filter(|(_, d)| *d == discipline_id)
            .filter_map(|(p, _)| tables.professors.iter().find(|prof| prof.id == *p).cloned())
            .collect())
    }

    async fn list_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<Vec<Discipline>> {
        self.guard("list_disciplines_of_professor")?;
        let tables = lock(&self.tables);
        Ok(tables
            .professor_links
            .iter()
            .filter(|(p, _)| *p == professor_id)
            .filter_map(|(_, d)| tables.discipline(*d).cloned())
            .collect())
    }

    async fn count_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<i64> {
        self.guard("count_professors_of_discipline")?;
        Ok(lock(&self.tables)
            .professor_links
            .iter()
            .filter(|(_, d)| *d == discipline_id)
            .count() as i64)
    }

    async fn count_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<i64> {
        self.guard("count_disciplines_of_professor")?;
        Ok(lock(&self.tables)
            .professor_links
            .iter()
            .filter(|(p, _)| *p == professor_id)
            .count() as i64)
    }

    async fn rating_exists(
        &self,
        professor_id: Uuid,
        discipline_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<bool> {
        self.guard("rating_exists")?;
        if self.blind() {
            return Ok(false);
        }
        Ok(lock(&self.tables).ratings.iter().any(|r| {
            r.professor_id == professor_id && r.discipline_id == discipline_id && r.user_id == user_id
        }))
    }

    async fn insert_rating(&self, rating: &NewRating) -> PortResult<Rating> {
        self.guard("insert_rating")?;
        let mut tables = lock(&self.tables);
        let taken = tables.ratings.iter().any(|r| {
            r.professor_id == rating.professor_id
                && r.discipline_id == rating.discipline_id
                && r.user_id == rating.user_id
        });
        if taken {
            return Err(PortError::Duplicate("avaliacoes".to_string()));
        }
        let stored = Rating {
            id: Uuid::new_v4(),
            professor_id: rating.professor_id,
            discipline_id: rating.discipline_id,
            user_id: rating.user_id,
            stars: rating.stars,
            comment: rating.comment.clone(),
            created_at: Utc::now(),
        };
        tables.ratings.push(stored.clone());
        Ok(stored)
    }

    async fn list_stars(
        &self,
        professor_id: Uuid,
        discipline_id: Option<Uuid>,
    ) -> PortResult<Vec<u8>> {
        self.guard("list_stars")?;
        Ok(lock(&self.tables)
            .ratings
            .iter()
            .filter(|r| r.professor_id == professor_id)
            .filter(|r| discipline_id.map_or(true, |d| r.discipline_id == d))
            .map(|r| r.stars)
            .collect())
    }

    async fn list_ratings_for_professor(
        &self,
        professor_id: Uuid,
    ) -> PortResult<Vec<RatingWithDiscipline>> {
        self.guard("list_ratings_for_professor")?;
        let tables = lock(&self.tables);
        let mut ratings: Vec<RatingWithDiscipline> = tables
            .ratings
            .iter()
            .filter(|r| r.professor_id == professor_id)
            .filter_map(|r| {
                tables.discipline(r.discipline_id).map(|d| RatingWithDiscipline {
                    rating: r.clone(),
                    discipline_name: d.name.clone(),
                    discipline_code: d.code.clone(),
                })
            })
            .collect();
        ratings.sort_by(|a, b| b.rating.created_at.cmp(&a.rating.created_at));
        Ok(ratings)
    }

    async fn insert_feedback(&self, feedback: &NewFeedback) -> PortResult<Feedback> {
        self.guard("insert_feedback")?;
        let stored = Feedback {
            id: Uuid::new_v4(),
            user_email: feedback.user_email.clone(),
            kind: feedback.kind,
            title: feedback.title.clone(),
            description: feedback.description.clone(),
            page: feedback.page.clone(),
            created_at: Utc::now(),
        };
        lock(&self.tables).feedback.push(stored.clone());
        Ok(stored)
    }
}

/// A limiter that always fails, for exercising the error path of writes.
pub struct UnavailableRateLimiter;

#[async_trait]
impl RateLimiter for UnavailableRateLimiter {
    async fn check(&self, _identifier: &str) -> PortResult<bool> {
        Err(PortError::Unexpected("counter store unavailable".to_string()))
    }
}

//=========================================================================================
// Auth provider
//=========================================================================================

/// A magic link request observed by [`FakeAuthProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentLink {
    pub email: String,
    pub redirect_to: String,
    pub code_challenge: String,
}

#[derive(Default)]
struct AuthState {
    sent: Vec<SentLink>,
    /// code -> (challenge, user)
    codes: HashMap<String, (String, AuthUser)>,
    token_hashes: HashMap<String, AuthUser>,
    sessions: HashMap<String, AuthUser>,
    unreachable: bool,
}

/// An `AuthProvider` that keeps sessions in memory and honours PKCE: a code
/// issued for an email can only be exchanged with the verifier whose challenge
/// was sent with that email's last magic link request.
#[derive(Default)]
pub struct FakeAuthProvider {
    state: Mutex<AuthState>,
}

impl FakeAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active session and returns its user.
    pub fn with_session(&self, access_token: &str, email: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        lock(&self.state)
            .sessions
            .insert(access_token.to_string(), user.clone());
        user
    }

    pub fn sent_links(&self) -> Vec<SentLink> {
        lock(&self.state).sent.clone()
    }

    /// What following the last magic link sent to `email` yields in code mode.
    pub fn issue_code(&self, email: &str, code: &str) -> Option<AuthUser> {
        let mut state = lock(&self.state);
        let challenge = state
            .sent
            .iter()
            .rev()
            .find(|s| s.email == email)?
            .code_challenge
            .clone();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        state
            .codes
            .insert(code.to_string(), (challenge, user.clone()));
        Some(user)
    }

    /// What following a magic link yields in token-hash mode.
    pub fn issue_token_hash(&self, email: &str, token_hash: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        lock(&self.state)
            .token_hashes
            .insert(token_hash.to_string(), user.clone());
        user
    }

    /// While set, session lookups fail as if the provider timed out.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    pub fn is_active(&self, access_token: &str) -> bool {
        lock(&self.state).sessions.contains_key(access_token)
    }

    fn open_session(state: &mut AuthState, user: AuthUser) -> AuthTokens {
        let access_token = format!("access-{}", Uuid::new_v4().simple());
        state.sessions.insert(access_token.clone(), user.clone());
        AuthTokens {
            access_token,
            refresh_token: format!("refresh-{}", Uuid::new_v4().simple()),
            expires_in: Some(3600),
            user,
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> PortResult<()> {
        lock(&self.state).sent.push(SentLink {
            email: email.to_string(),
            redirect_to: redirect_to.to_string(),
            code_challenge: code_challenge.to_string(),
        });
        Ok(())
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> PortResult<AuthTokens> {
        let mut state = lock(&self.state);
        let (challenge, user) = state
            .codes
            .remove(auth_code)
            .ok_or(PortError::Unauthorized)?;
        if challenge_for(code_verifier) != challenge {
            return Err(PortError::Unauthorized);
        }
        Ok(Self::open_session(&mut state, user))
    }

    async fn verify_token_hash(&self, token_hash: &str, _kind: &str) -> PortResult<AuthTokens> {
        let mut state = lock(&self.state);
        let user = state
            .token_hashes
            .remove(token_hash)
            .ok_or(PortError::Unauthorized)?;
        Ok(Self::open_session(&mut state, user))
    }

    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser> {
        let state = lock(&self.state);
        if state.unreachable {
            return Err(PortError::Unexpected("auth provider timed out".to_string()));
        }
        state
            .sessions
            .get(access_token)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }

    async fn sign_out(&self, access_token: &str) -> PortResult<()> {
        lock(&self.state).sessions.remove(access_token);
        Ok(())
    }
}
