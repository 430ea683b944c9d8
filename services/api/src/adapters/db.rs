//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the hosted PostgreSQL database using `sqlx`.
//!
//! Unique-key violations (SQLSTATE 23505) are reported as `PortError::Duplicate`
//! so the service can treat a lost insert race like a positive existence check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_ratings_core::domain::{
    CatalogTable, Course, CourseAssociation, Discipline, DisciplineOffering, Emphasis, Feedback,
    NewFeedback, NewRating, Professor, Rating, RatingWithDiscipline,
};
use course_ratings_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps driver errors onto the port's error vocabulary.
fn port_error(error: sqlx::Error) -> PortError {
    match error {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PortError::Duplicate(db_err.message().to_string())
        }
        sqlx::Error::RowNotFound => PortError::NotFound("row".to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

/// `%term%` for ILIKE, with the pattern metacharacters of `term` escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn table_name(table: CatalogTable) -> &'static str {
    match table {
        CatalogTable::Courses => "cursos",
        CatalogTable::Disciplines => "disciplinas",
        CatalogTable::Professors => "professores",
        CatalogTable::Ratings => "avaliacoes",
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    nome: String,
    codigo: String,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            name: self.nome,
            code: self.codigo,
        }
    }
}

#[derive(FromRow)]
struct EmphasisRecord {
    id: Uuid,
    nome: String,
    codigo: String,
    curso_id: Uuid,
}
impl EmphasisRecord {
    fn to_domain(self) -> Emphasis {
        Emphasis {
            id: self.id,
            name: self.nome,
            code: self.codigo,
            course_id: self.curso_id,
        }
    }
}

#[derive(FromRow)]
struct DisciplineRecord {
    id: Uuid,
    codigo: String,
    nome: String,
    periodo: Option<String>,
    carga_horaria: Option<i32>,
    tipo: Option<String>,
}
impl DisciplineRecord {
    fn to_domain(self) -> Discipline {
        Discipline {
            id: self.id,
            code: self.codigo,
            name: self.nome,
            period: self.periodo,
            credit_hours: self.carga_horaria,
            kind: self.tipo,
        }
    }
}

#[derive(FromRow)]
struct OfferingRecord {
    #[sqlx(flatten)]
    discipline: DisciplineRecord,
    periodo_sugerido: Option<String>,
    obrigatoria: bool,
}
impl OfferingRecord {
    fn to_domain(self) -> DisciplineOffering {
        DisciplineOffering {
            discipline: self.discipline.to_domain(),
            suggested_period: self.periodo_sugerido,
            mandatory: self.obrigatoria,
        }
    }
}

#[derive(FromRow)]
struct CourseAssociationRecord {
    #[sqlx(flatten)]
    course: CourseRecord,
    periodo_sugerido: Option<String>,
    obrigatoria: bool,
}
impl CourseAssociationRecord {
    fn to_domain(self) -> CourseAssociation {
        CourseAssociation {
            course: self.course.to_domain(),
            suggested_period: self.periodo_sugerido,
            mandatory: self.obrigatoria,
        }
    }
}

#[derive(FromRow)]
struct ProfessorRecord {
    id: Uuid,
    nome: String,
    email: Option<String>,
}
impl ProfessorRecord {
    fn to_domain(self) -> Professor {
        Professor {
            id: self.id,
            name: self.nome,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct RatingRecord {
    id: Uuid,
    professor_id: Uuid,
    disciplina_id: Uuid,
    usuario_id: Uuid,
    estrelas: i16,
    comentario: Option<String>,
    created_at: DateTime<Utc>,
}
impl RatingRecord {
    fn to_domain(self) -> PortResult<Rating> {
        Ok(Rating {
            id: self.id,
            professor_id: self.professor_id,
            discipline_id: self.disciplina_id,
            user_id: self.usuario_id,
            stars: stars_from_column(self.estrelas)?,
            comment: self.comentario,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct RatingWithDisciplineRecord {
    #[sqlx(flatten)]
    rating: RatingRecord,
    disciplina_nome: String,
    disciplina_codigo: String,
}
impl RatingWithDisciplineRecord {
    fn to_domain(self) -> PortResult<RatingWithDiscipline> {
        Ok(RatingWithDiscipline {
            rating: self.rating.to_domain()?,
            discipline_name: self.disciplina_nome,
            discipline_code: self.disciplina_codigo,
        })
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    id: Uuid,
    usuario_email: String,
    tipo: String,
    titulo: String,
    descricao: String,
    pagina: Option<String>,
    created_at: DateTime<Utc>,
}
impl FeedbackRecord {
    fn to_domain(self) -> PortResult<Feedback> {
        Ok(Feedback {
            id: self.id,
            user_email: self.usuario_email,
            kind: self.tipo.parse().map_err(PortError::Unexpected)?,
            title: self.titulo,
            description: self.descricao,
            page: self.pagina,
            created_at: self.created_at,
        })
    }
}

fn stars_from_column(value: i16) -> PortResult<u8> {
    u8::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("stored star value {value} out of range")))
}

const DISCIPLINE_COLUMNS: &str = "d.id, d.codigo, d.nome, d.periodo, d.carga_horaria, d.tipo";
const RATING_COLUMNS: &str =
    "a.id, a.professor_id, a.disciplina_id, a.usuario_id, a.estrelas, a.comentario, a.created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn count_rows(&self, table: CatalogTable) -> PortResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table_name(table));
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, nome, codigo FROM cursos ORDER BY nome",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn find_course_by_code(&self, code: &str) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, nome, codigo FROM cursos WHERE codigo = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn list_emphases_by_course(&self, course_id: Uuid) -> PortResult<Vec<Emphasis>> {
        let records = sqlx::query_as::<_, EmphasisRecord>(
            "SELECT id, nome, codigo, curso_id FROM enfases WHERE curso_id = $1 ORDER BY nome",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(EmphasisRecord::to_domain).collect())
    }

    async fn find_emphasis_by_code(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Option<Emphasis>> {
        let record = sqlx::query_as::<_, EmphasisRecord>(
            "SELECT e.id, e.nome, e.codigo, e.curso_id
             FROM enfases e JOIN cursos c ON c.id = e.curso_id
             WHERE c.codigo = $1 AND e.codigo = $2",
        )
        .bind(course_code)
        .bind(emphasis_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.map(EmphasisRecord::to_domain))
    }

    async fn list_course_offerings(&self, course_code: &str) -> PortResult<Vec<DisciplineOffering>> {
        let sql = format!(
            "SELECT {DISCIPLINE_COLUMNS}, dc.periodo_sugerido, dc.obrigatoria
             FROM disciplina_cursos dc
             JOIN disciplinas d ON d.id = dc.disciplina_id
             JOIN cursos c ON c.id = dc.curso_id
             WHERE c.codigo = $1
             ORDER BY dc.periodo_sugerido NULLS LAST, d.codigo"
        );
        let records = sqlx::query_as::<_, OfferingRecord>(&sql)
            .bind(course_code)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(records.into_iter().map(OfferingRecord::to_domain).collect())
    }

    async fn list_emphasis_offerings(
        &self,
        course_code: &str,
        emphasis_code: &str,
    ) -> PortResult<Vec<DisciplineOffering>> {
        let sql = format!(
            "SELECT {DISCIPLINE_COLUMNS}, de.periodo_sugerido, de.obrigatoria
             FROM disciplina_enfases de
             JOIN disciplinas d ON d.id = de.disciplina_id
             JOIN enfases e ON e.id = de.enfase_id
             JOIN cursos c ON c.id = e.curso_id
             WHERE c.codigo = $1 AND e.codigo = $2
             ORDER BY de.periodo_sugerido NULLS LAST, d.codigo"
        );
        let records = sqlx::query_as::<_, OfferingRecord>(&sql)
            .bind(course_code)
            .bind(emphasis_code)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(records.into_iter().map(OfferingRecord::to_domain).collect())
    }

    async fn find_discipline_by_code(&self, code: &str) -> PortResult<Option<Discipline>> {
        let sql = format!("SELECT {DISCIPLINE_COLUMNS} FROM disciplinas d WHERE d.codigo = $1");
        let record = sqlx::query_as::<_, DisciplineRecord>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(record.map(DisciplineRecord::to_domain))
    }

    async fn find_discipline_by_id(&self, discipline_id: Uuid) -> PortResult<Option<Discipline>> {
        let sql = format!("SELECT {DISCIPLINE_COLUMNS} FROM disciplinas d WHERE d.id = $1");
        let record = sqlx::query_as::<_, DisciplineRecord>(&sql)
            .bind(discipline_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(record.map(DisciplineRecord::to_domain))
    }

    async fn search_disciplines(&self, term: &str, limit: i64) -> PortResult<Vec<Discipline>> {
        let sql = format!(
            "SELECT {DISCIPLINE_COLUMNS} FROM disciplinas d
             WHERE d.codigo ILIKE $1 OR d.nome ILIKE $1
             ORDER BY d.codigo
             LIMIT $2"
        );
        let records = sqlx::query_as::<_, DisciplineRecord>(&sql)
            .bind(like_pattern(term))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(records.into_iter().map(DisciplineRecord::to_domain).collect())
    }

    async fn set_discipline_kind(&self, codes: &[String], kind: &str) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE disciplinas SET tipo = $1, updated_at = now() WHERE codigo = ANY($2)",
        )
        .bind(kind)
        .bind(codes)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(result.rows_affected())
    }

    async fn count_ratings_for_discipline(&self, discipline_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM avaliacoes WHERE disciplina_id = $1")
            .bind(discipline_id)
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)
    }

    async fn list_discipline_courses(
        &self,
        discipline_id: Uuid,
    ) -> PortResult<Vec<CourseAssociation>> {
        let records = sqlx::query_as::<_, CourseAssociationRecord>(
            "SELECT c.id, c.nome, c.codigo, dc.periodo_sugerido, dc.obrigatoria
             FROM disciplina_cursos dc JOIN cursos c ON c.id = dc.curso_id
             WHERE dc.disciplina_id = $1
             ORDER BY dc.created_at",
        )
        .bind(discipline_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records
            .into_iter()
            .map(CourseAssociationRecord::to_domain)
            .collect())
    }

    async fn upsert_discipline_course(
        &self,
        discipline_id: Uuid,
        course_id: Uuid,
        suggested_period: Option<&str>,
        mandatory: bool,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO disciplina_cursos (disciplina_id, curso_id, periodo_sugerido, obrigatoria)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (disciplina_id, curso_id)
             DO UPDATE SET periodo_sugerido = EXCLUDED.periodo_sugerido,
                           obrigatoria = EXCLUDED.obrigatoria",
        )
        .bind(discipline_id)
        .bind(course_id)
        .bind(suggested_period)
        .bind(mandatory)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn delete_discipline_course(&self, discipline_id: Uuid, course_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM disciplina_cursos WHERE disciplina_id = $1 AND curso_id = $2")
            .bind(discipline_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn find_professor(&self, professor_id: Uuid) -> PortResult<Option<Professor>> {
        let record = sqlx::query_as::<_, ProfessorRecord>(
            "SELECT id, nome, email FROM professores WHERE id = $1",
        )
        .bind(professor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.map(ProfessorRecord::to_domain))
    }

    async fn search_professors(&self, name: &str, limit: i64) -> PortResult<Vec<Professor>> {
        let records = sqlx::query_as::<_, ProfessorRecord>(
            "SELECT id, nome, email FROM professores WHERE nome ILIKE $1 ORDER BY nome LIMIT $2",
        )
        .bind(like_pattern(name))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(ProfessorRecord::to_domain).collect())
    }

    async fn insert_professor(&self, name: &str, email: Option<&str>) -> PortResult<Professor> {
        let record = sqlx::query_as::<_, ProfessorRecord>(
            "INSERT INTO professores (nome, email) VALUES ($1, $2) RETURNING id, nome, email",
        )
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn delete_professor(&self, professor_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM professores WHERE id = $1")
            .bind(professor_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn professor_link_exists(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM professor_disciplinas
                 WHERE professor_id = $1 AND disciplina_id = $2
             )",
        )
        .bind(professor_id)
        .bind(discipline_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn insert_professor_link(&self, professor_id: Uuid, discipline_id: Uuid) -> PortResult<()> {
        sqlx::query("INSERT INTO professor_disciplinas (professor_id, disciplina_id) VALUES ($1, $2)")
            .bind(professor_id)
            .bind(discipline_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn list_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<Vec<Professor>> {
        let records = sqlx::query_as::<_, ProfessorRecord>(
            "SELECT p.id, p.nome, p.email
             FROM professor_disciplinas pd JOIN professores p ON p.id = pd.professor_id
             WHERE pd.disciplina_id = $1
             ORDER BY p.nome",
        )
        .bind(discipline_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(ProfessorRecord::to_domain).collect())
    }

    async fn list_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<Vec<Discipline>> {
        let sql = format!(
            "SELECT {DISCIPLINE_COLUMNS}
             FROM professor_disciplinas pd JOIN disciplinas d ON d.id = pd.disciplina_id
             WHERE pd.professor_id = $1
             ORDER BY d.nome"
        );
        let records = sqlx::query_as::<_, DisciplineRecord>(&sql)
            .bind(professor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(records.into_iter().map(DisciplineRecord::to_domain).collect())
    }

    async fn count_professors_of_discipline(&self, discipline_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM professor_disciplinas WHERE disciplina_id = $1",
        )
        .bind(discipline_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn count_disciplines_of_professor(&self, professor_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM professor_disciplinas WHERE professor_id = $1",
        )
        .bind(professor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn rating_exists(
        &self,
        professor_id: Uuid,
        discipline_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM avaliacoes
                 WHERE professor_id = $1 AND disciplina_id = $2 AND usuario_id = $3
             )",
        )
        .bind(professor_id)
        .bind(discipline_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn insert_rating(&self, rating: &NewRating) -> PortResult<Rating> {
        let record = sqlx::query_as::<_, RatingRecord>(
            "INSERT INTO avaliacoes (professor_id, disciplina_id, usuario_id, estrelas, comentario)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, professor_id, disciplina_id, usuario_id, estrelas, comentario, created_at",
        )
        .bind(rating.professor_id)
        .bind(rating.discipline_id)
        .bind(rating.user_id)
        .bind(i16::from(rating.stars))
        .bind(rating.comment.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        record.to_domain()
    }

    async fn list_stars(
        &self,
        professor_id: Uuid,
        discipline_id: Option<Uuid>,
    ) -> PortResult<Vec<u8>> {
        let values = sqlx::query_scalar::<_, i16>(
            "SELECT estrelas FROM avaliacoes
             WHERE professor_id = $1 AND ($2::uuid IS NULL OR disciplina_id = $2)",
        )
        .bind(professor_id)
        .bind(discipline_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        values.into_iter().map(stars_from_column).collect()
    }

    async fn list_ratings_for_professor(
        &self,
        professor_id: Uuid,
    ) -> PortResult<Vec<RatingWithDiscipline>> {
        let sql = format!(
            "SELECT {RATING_COLUMNS}, d.nome AS disciplina_nome, d.codigo AS disciplina_codigo
             FROM avaliacoes a JOIN disciplinas d ON d.id = a.disciplina_id
             WHERE a.professor_id = $1
             ORDER BY a.created_at DESC"
        );
        let records = sqlx::query_as::<_, RatingWithDisciplineRecord>(&sql)
            .bind(professor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        records
            .into_iter()
            .map(RatingWithDisciplineRecord::to_domain)
            .collect()
    }

    async fn insert_feedback(&self, feedback: &NewFeedback) -> PortResult<Feedback> {
        let record = sqlx::query_as::<_, FeedbackRecord>(
            "INSERT INTO feedbacks (usuario_email, tipo, titulo, descricao, pagina)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, usuario_email, tipo, titulo, descricao, pagina, created_at",
        )
        .bind(&feedback.user_email)
        .bind(feedback.kind.as_str())
        .bind(&feedback.title)
        .bind(&feedback.description)
        .bind(feedback.page.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        record.to_domain()
    }
}
