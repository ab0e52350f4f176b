use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewQuestionnaire, Questionnaire};
use crate::{
    db::{timed, StoreError},
    filters::Filters,
};

#[async_trait]
pub trait QuestionnaireStore: Send + Sync {
    async fn insert(&self, q: &NewQuestionnaire) -> Result<Questionnaire, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Questionnaire>, StoreError>;
    /// Writes `q` if the stored `updated_at` still equals `expected_updated_at`.
    async fn update(
        &self,
        q: &Questionnaire,
        expected_updated_at: OffsetDateTime,
    ) -> Result<Questionnaire, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// `topic` matches case-insensitively and exactly when given.
    async fn list(
        &self,
        topic: Option<&str>,
        filters: &Filters,
    ) -> Result<(Vec<Questionnaire>, i64), StoreError>;
}

#[derive(Clone)]
pub struct PgQuestionnaireStore {
    db: PgPool,
    timeout: Duration,
}

impl PgQuestionnaireStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionnaireListRow {
    total: i64,
    #[sqlx(flatten)]
    questionnaire: Questionnaire,
}

#[async_trait]
impl QuestionnaireStore for PgQuestionnaireStore {
    async fn insert(&self, q: &NewQuestionnaire) -> Result<Questionnaire, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Questionnaire>(
                r#"
                INSERT INTO questionnaires (topic, questions, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, updated_at, topic, questions, user_id
                "#,
            )
            .bind(&q.topic)
            .bind(&q.questions)
            .bind(q.user_id)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Questionnaire>, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Questionnaire>(
                r#"
                SELECT id, created_at, updated_at, topic, questions, user_id
                FROM questionnaires
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn update(
        &self,
        q: &Questionnaire,
        expected_updated_at: OffsetDateTime,
    ) -> Result<Questionnaire, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Questionnaire>(
                r#"
                UPDATE questionnaires
                SET topic = $1, questions = $2, updated_at = clock_timestamp()
                WHERE id = $3 AND updated_at = $4
                RETURNING id, created_at, updated_at, topic, questions, user_id
                "#,
            )
            .bind(&q.topic)
            .bind(&q.questions)
            .bind(q.id)
            .bind(expected_updated_at)
            .fetch_optional(&self.db),
        )
        .await?
        .ok_or(StoreError::EditConflict)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = timed(
            self.timeout,
            sqlx::query("DELETE FROM questionnaires WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(
        &self,
        topic: Option<&str>,
        filters: &Filters,
    ) -> Result<(Vec<Questionnaire>, i64), StoreError> {
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total, id, created_at, updated_at, topic, questions, user_id
            FROM questionnaires
            WHERE (LOWER(topic) = LOWER($1) OR $1 = '')
            {}
            LIMIT $2 OFFSET $3
            "#,
            filters.order_by()
        );
        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, QuestionnaireListRow>(&sql)
                .bind(topic.unwrap_or(""))
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db),
        )
        .await?;
        // A page past the end has no rows to carry the window count.
        let total = match rows.first() {
            Some(r) => r.total,
            None if filters.offset() > 0 => {
                timed(
                    self.timeout,
                    sqlx::query_scalar::<_, i64>(
                        "SELECT count(*) FROM questionnaires WHERE (LOWER(topic) = LOWER($1) OR $1 = '')",
                    )
                    .bind(topic.unwrap_or(""))
                    .fetch_one(&self.db),
                )
                .await?
            }
            None => 0,
        };
        Ok((rows.into_iter().map(|r| r.questionnaire).collect(), total))
    }
}
