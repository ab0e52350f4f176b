use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Answer, NewAnswer};
use crate::{
    db::{timed, StoreError},
    filters::Filters,
};

#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn insert(&self, a: &NewAnswer) -> Result<Answer, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Answer>, StoreError>;
    async fn update(&self, a: &Answer, expected_updated_at: OffsetDateTime)
        -> Result<Answer, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// All answers, or only those of `questionnaire_id` when given.
    async fn list(
        &self,
        questionnaire_id: Option<Uuid>,
        filters: &Filters,
    ) -> Result<(Vec<Answer>, i64), StoreError>;

    async fn list_for_questionnaire(
        &self,
        questionnaire_id: Uuid,
        filters: &Filters,
    ) -> Result<(Vec<Answer>, i64), StoreError> {
        self.list(Some(questionnaire_id), filters).await
    }
}

#[derive(Clone)]
pub struct PgAnswerStore {
    db: PgPool,
    timeout: Duration,
}

impl PgAnswerStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerListRow {
    total: i64,
    #[sqlx(flatten)]
    answer: Answer,
}

#[async_trait]
impl AnswerStore for PgAnswerStore {
    async fn insert(&self, a: &NewAnswer) -> Result<Answer, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Answer>(
                r#"
                INSERT INTO answers (questionnaire_id, answer, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, updated_at, questionnaire_id, answer, user_id
                "#,
            )
            .bind(a.questionnaire_id)
            .bind(&a.answer)
            .bind(a.user_id)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Answer>, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Answer>(
                r#"
                SELECT id, created_at, updated_at, questionnaire_id, answer, user_id
                FROM answers
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
        a: &Answer,
        expected_updated_at: OffsetDateTime,
    ) -> Result<Answer, StoreError> {
        timed(
            self.timeout,
            sqlx::query_as::<_, Answer>(
                r#"
                UPDATE answers
                SET questionnaire_id = $1, answer = $2, updated_at = clock_timestamp()
                WHERE id = $3 AND updated_at = $4
                RETURNING id, created_at, updated_at, questionnaire_id, answer, user_id
                "#,
            )
            .bind(a.questionnaire_id)
            .bind(&a.answer)
            .bind(a.id)
            .bind(expected_updated_at)
            .fetch_optional(&self.db),
        )
        .await?
        .ok_or(StoreError::EditConflict)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = timed(
            self.timeout,
            sqlx::query("DELETE FROM answers WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(
        &self,
        questionnaire_id: Option<Uuid>,
        filters: &Filters,
    ) -> Result<(Vec<Answer>, i64), StoreError> {
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total, id, created_at, updated_at, questionnaire_id,
                   answer, user_id
            FROM answers
            WHERE ($1::uuid IS NULL OR questionnaire_id = $1)
            {}
            LIMIT $2 OFFSET $3
            "#,
            filters.order_by()
        );
        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, AnswerListRow>(&sql)
                .bind(questionnaire_id)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db),
        )
        .await?;
        let total = match rows.first() {
            Some(r) => r.total,
            None if filters.offset() > 0 => {
                timed(
                    self.timeout,
                    sqlx::query_scalar::<_, i64>(
                        "SELECT count(*) FROM answers WHERE ($1::uuid IS NULL OR questionnaire_id = $1)",
                    )
                    .bind(questionnaire_id)
                    .fetch_one(&self.db),
                )
                .await?
            }
            None => 0,
        };
        Ok((rows.into_iter().map(|r| r.answer).collect(), total))
    }
}
