// src/store/postgres.rs

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        enrollment::{StudentEnrollment, TeacherEnrollment},
        evaluation::{Evaluation, EvaluationEntry},
        exam::{Exam, Question},
        question_set::QuestionPaperSet,
        session::{QuestionAnswers, Session, SessionStatus},
        user::{Principal, Role},
    },
    store::{ExamStore, StoreError},
};

/// Exam columns plus the derived set and session id lists.
const EXAM_SELECT: &str = r#"
    SELECT
        e.id, e.teacher_id, e.exam_name, e.exam_type, e.available_dates,
        e.duration, e.questions, e.set_generation, e.created_at,
        ARRAY(
            SELECT s.id FROM question_sets s
            WHERE s.exam_id = e.id AND s.generation = e.set_generation
            ORDER BY s.set_number
        ) AS set_ids,
        ARRAY(
            SELECT a.id FROM sessions a
            WHERE a.exam_id = e.id
            ORDER BY a.created_at
        ) AS session_ids
    FROM exams e
"#;

const SESSION_SELECT: &str = r#"
    SELECT
        id, student_id, student_name, email, exam_id, exam_name, exam_type,
        set_id, set_number, data, status, submitted, ai_score, duration,
        started_at, submitted_at, created_at
    FROM sessions
"#;

const EVALUATION_SELECT: &str = r#"
    SELECT
        id, session_id, exam_id, teacher_id, student_name, email, exam_name,
        set_id, set_number, ai_score, data, total_marks, evaluated,
        created_at, updated_at
    FROM evaluations
"#;

fn parse_column<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(StoreError::Corrupt)
}

#[derive(FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: row.id,
            email: row.email,
            name: row.name,
            role: parse_column(&row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: Uuid,
    teacher_id: Uuid,
    exam_name: String,
    exam_type: String,
    available_dates: Vec<NaiveDate>,
    duration: i64,
    questions: Json<Vec<Question>>,
    set_generation: i32,
    created_at: DateTime<Utc>,
    set_ids: Vec<Uuid>,
    session_ids: Vec<Uuid>,
}

impl TryFrom<ExamRow> for Exam {
    type Error = StoreError;

    fn try_from(row: ExamRow) -> Result<Self, Self::Error> {
        Ok(Exam {
            id: row.id,
            teacher_id: row.teacher_id,
            exam_name: row.exam_name,
            exam_type: parse_column(&row.exam_type)?,
            available_dates: row.available_dates,
            duration: row.duration,
            questions: row.questions.0,
            set_ids: row.set_ids,
            session_ids: row.session_ids,
            set_generation: row.set_generation,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SetRow {
    id: Uuid,
    exam_id: Uuid,
    generation: i32,
    set_number: i32,
    questions: Json<Vec<Question>>,
    created_at: DateTime<Utc>,
}

impl From<SetRow> for QuestionPaperSet {
    fn from(row: SetRow) -> Self {
        QuestionPaperSet {
            id: row.id,
            exam_id: row.exam_id,
            generation: row.generation,
            set_number: row.set_number,
            questions: row.questions.0,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    student_id: Uuid,
    student_name: String,
    email: String,
    exam_id: Uuid,
    exam_name: String,
    exam_type: String,
    set_id: Uuid,
    set_number: i32,
    data: Json<Vec<QuestionAnswers>>,
    status: String,
    submitted: bool,
    ai_score: Option<f64>,
    duration: i64,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            student_id: row.student_id,
            student_name: row.student_name,
            email: row.email,
            exam_id: row.exam_id,
            exam_name: row.exam_name,
            exam_type: parse_column(&row.exam_type)?,
            set_id: row.set_id,
            set_number: row.set_number,
            data: row.data.0,
            status: parse_column(&row.status)?,
            submitted: row.submitted,
            ai_score: row.ai_score,
            duration: row.duration,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct EvaluationRow {
    id: Uuid,
    session_id: Uuid,
    exam_id: Uuid,
    teacher_id: Uuid,
    student_name: String,
    email: String,
    exam_name: String,
    set_id: Uuid,
    set_number: i32,
    ai_score: Option<f64>,
    data: Json<Vec<EvaluationEntry>>,
    total_marks: i32,
    evaluated: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EvaluationRow> for Evaluation {
    fn from(row: EvaluationRow) -> Self {
        Evaluation {
            id: row.id,
            session_id: row.session_id,
            exam_id: row.exam_id,
            teacher_id: row.teacher_id,
            student_name: row.student_name,
            email: row.email,
            exam_name: row.exam_name,
            set_id: row.set_id,
            set_number: row.set_number,
            ai_score: row.ai_score,
            data: row.data.0,
            total_marks: row.total_marks,
            evaluated: row.evaluated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRow {
    student_id: Uuid,
    exam_id: Uuid,
    set_id: Uuid,
    session_id: Uuid,
    created_at: DateTime<Utc>,
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_sessions(&self, filter: &str, id: Uuid) -> Result<Vec<Session>, StoreError> {
        let sql = format!("{SESSION_SELECT} WHERE {filter} = $1 ORDER BY created_at");
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Session::try_from)
            .collect()
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn upsert_principal(
        &self,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO principals (id, email, name, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                role = EXCLUDED.role,
                updated_at = NOW()
            RETURNING id, email, name, role, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Principal::try_from(row)
    }

    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, email, name, role, created_at, updated_at FROM principals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Principal::try_from)
        .transpose()
    }

    async fn insert_exam(&self, exam: &Exam) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO exams
            (id, teacher_id, exam_name, exam_type, available_dates, duration, questions, set_generation, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(exam.id)
        .bind(exam.teacher_id)
        .bind(&exam.exam_name)
        .bind(exam.exam_type.as_str())
        .bind(&exam.available_dates)
        .bind(exam.duration)
        .bind(Json(&exam.questions))
        .bind(exam.set_generation)
        .bind(exam.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO teacher_enrollments (teacher_id, exam_id) VALUES ($1, $2)")
            .bind(exam.teacher_id)
            .bind(exam.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_exam(&self, exam: &Exam) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE exams SET
                exam_name = $2,
                exam_type = $3,
                available_dates = $4,
                duration = $5,
                questions = $6
            WHERE id = $1
            "#,
        )
        .bind(exam.id)
        .bind(&exam.exam_name)
        .bind(exam.exam_type.as_str())
        .bind(&exam.available_dates)
        .bind(exam.duration)
        .bind(Json(&exam.questions))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_exam(&self, id: Uuid) -> Result<Option<Exam>, StoreError> {
        let sql = format!("{EXAM_SELECT} WHERE e.id = $1");
        sqlx::query_as::<_, ExamRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Exam::try_from)
            .transpose()
    }

    async fn find_exams(&self, ids: &[Uuid]) -> Result<Vec<Exam>, StoreError> {
        let sql = format!("{EXAM_SELECT} WHERE e.id = ANY($1) ORDER BY e.created_at");
        sqlx::query_as::<_, ExamRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Exam::try_from)
            .collect()
    }

    async fn list_exams_available_on(&self, day: NaiveDate) -> Result<Vec<Exam>, StoreError> {
        let sql = format!("{EXAM_SELECT} WHERE $1 = ANY(e.available_dates) ORDER BY e.created_at");
        sqlx::query_as::<_, ExamRow>(&sql)
            .bind(day)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Exam::try_from)
            .collect()
    }

    async fn teacher_enrollment(&self, teacher_id: Uuid) -> Result<TeacherEnrollment, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"
            SELECT exam_id, evaluation_id
            FROM teacher_enrollments
            WHERE teacher_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        let mut enrollment = TeacherEnrollment {
            teacher_id,
            exams: Vec::new(),
        };
        for (exam_id, evaluation_id) in rows {
            enrollment.push(exam_id, evaluation_id);
        }
        Ok(enrollment)
    }

    async fn replace_sets(
        &self,
        exam_id: Uuid,
        generation: i32,
        sets: &[QuestionPaperSet],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            "UPDATE exams SET set_generation = $2 WHERE id = $1 AND set_generation = $3",
        )
        .bind(exam_id)
        .bind(generation)
        .bind(generation - 1)
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "exam {exam_id} sets were regenerated concurrently"
            )));
        }

        if !sets.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO question_sets (id, exam_id, generation, set_number, questions, created_at) ",
            );
            builder.push_values(sets, |mut row, set| {
                row.push_bind(set.id)
                    .push_bind(set.exam_id)
                    .push_bind(set.generation)
                    .push_bind(set.set_number)
                    .push_bind(Json(&set.questions))
                    .push_bind(set.created_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_set(&self, id: Uuid) -> Result<Option<QuestionPaperSet>, StoreError> {
        let row = sqlx::query_as::<_, SetRow>(
            r#"
            SELECT id, exam_id, generation, set_number, questions, created_at
            FROM question_sets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuestionPaperSet::from))
    }

    async fn list_sets(&self, exam_id: Uuid) -> Result<Vec<QuestionPaperSet>, StoreError> {
        let rows = sqlx::query_as::<_, SetRow>(
            r#"
            SELECT s.id, s.exam_id, s.generation, s.set_number, s.questions, s.created_at
            FROM question_sets s
            JOIN exams e ON e.id = s.exam_id AND s.generation = e.set_generation
            WHERE s.exam_id = $1
            ORDER BY s.set_number
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QuestionPaperSet::from).collect())
    }

    async fn latest_enrollment(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<StudentEnrollment>, StoreError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT student_id, exam_id, set_id, session_id, created_at
            FROM student_enrollments
            WHERE student_id = $1 AND exam_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StudentEnrollment {
            student_id: r.student_id,
            exam_id: r.exam_id,
            set_id: r.set_id,
            session_id: r.session_id,
            created_at: r.created_at,
        }))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // The partial unique index turns a second active session into a no-op.
        let inserted = sqlx::query(
            r#"
            INSERT INTO sessions
            (id, student_id, student_name, email, exam_id, exam_name, exam_type,
             set_id, set_number, data, status, submitted, ai_score, duration,
             started_at, submitted_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(session.id)
        .bind(session.student_id)
        .bind(&session.student_name)
        .bind(&session.email)
        .bind(session.exam_id)
        .bind(&session.exam_name)
        .bind(session.exam_type.as_str())
        .bind(session.set_id)
        .bind(session.set_number)
        .bind(Json(&session.data))
        .bind(session.status.as_str())
        .bind(session.submitted)
        .bind(session.ai_score)
        .bind(session.duration)
        .bind(session.started_at)
        .bind(session.submitted_at)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "student {} already has an active session for exam {}",
                session.student_id, session.exam_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO student_enrollments (student_id, exam_id, set_id, session_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.student_id)
        .bind(session.exam_id)
        .bind(session.set_id)
        .bind(session.id)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let sql = format!("{SESSION_SELECT} WHERE id = $1");
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    async fn find_active_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let sql = format!("{SESSION_SELECT} WHERE student_id = $1 AND exam_id = $2 AND NOT submitted");
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(student_id)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    async fn list_sessions_by_exam(&self, exam_id: Uuid) -> Result<Vec<Session>, StoreError> {
        self.fetch_sessions("exam_id", exam_id).await
    }

    async fn list_sessions_by_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        self.fetch_sessions("student_id", student_id).await
    }

    async fn mark_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET status = 'started', started_at = $2
            WHERE id = $1 AND status = 'didnotstart'
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_submission(
        &self,
        id: Uuid,
        expected: SessionStatus,
        data: &[QuestionAnswers],
        ai_score: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                status = 'ended',
                submitted = TRUE,
                data = $3,
                ai_score = $4,
                submitted_at = $5
            WHERE id = $1 AND status = $2 AND NOT submitted
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(Json(data))
        .bind(ai_score)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO evaluations
            (id, session_id, exam_id, teacher_id, student_name, email, exam_name,
             set_id, set_number, ai_score, data, total_marks, evaluated, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(evaluation.id)
        .bind(evaluation.session_id)
        .bind(evaluation.exam_id)
        .bind(evaluation.teacher_id)
        .bind(&evaluation.student_name)
        .bind(&evaluation.email)
        .bind(&evaluation.exam_name)
        .bind(evaluation.set_id)
        .bind(evaluation.set_number)
        .bind(evaluation.ai_score)
        .bind(Json(&evaluation.data))
        .bind(evaluation.total_marks)
        .bind(evaluation.evaluated)
        .bind(evaluation.created_at)
        .bind(evaluation.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "session {} already has an evaluation",
                evaluation.session_id
            )));
        }

        sqlx::query(
            "INSERT INTO teacher_enrollments (teacher_id, exam_id, evaluation_id) VALUES ($1, $2, $3)",
        )
        .bind(evaluation.teacher_id)
        .bind(evaluation.exam_id)
        .bind(evaluation.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, StoreError> {
        let sql = format!("{EVALUATION_SELECT} WHERE id = $1");
        let row = sqlx::query_as::<_, EvaluationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Evaluation::from))
    }

    async fn find_evaluation_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, StoreError> {
        let sql = format!("{EVALUATION_SELECT} WHERE session_id = $1");
        let row = sqlx::query_as::<_, EvaluationRow>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Evaluation::from))
    }

    async fn replace_grading(
        &self,
        id: Uuid,
        data: &[EvaluationEntry],
        total_marks: i32,
        evaluated: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE evaluations SET
                data = $2,
                total_marks = $3,
                evaluated = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(data))
        .bind(total_marks)
        .bind(evaluated)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_evaluated(&self, exam_id: Uuid) -> Result<Vec<Evaluation>, StoreError> {
        let sql = format!("{EVALUATION_SELECT} WHERE exam_id = $1 AND evaluated ORDER BY created_at");
        let rows = sqlx::query_as::<_, EvaluationRow>(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Evaluation::from).collect())
    }
}
