use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::guard::Owned,
    error::ValidationErrors,
    filters::{field, SortField},
};

pub const SORT_FIELDS: &[SortField] = &[
    field("id", "id"),
    field("createdAt", "created_at"),
    field("updatedAt", "updated_at"),
    field("topic", "topic"),
    field("userId", "user_id"),
];

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub topic: String,
    pub questions: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewQuestionnaire {
    pub topic: String,
    pub questions: String,
    pub user_id: Uuid,
}

impl Owned for Questionnaire {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

pub fn validate(v: &mut ValidationErrors, topic: &str, questions: &str) {
    v.check(!topic.is_empty(), "topic", "must be provided");
    v.check(topic.len() <= 100, "topic", "must not be more than 100 bytes long");
    v.check(
        questions.len() <= 1000,
        "questions",
        "must not be more than 1000 bytes long",
    );
}
