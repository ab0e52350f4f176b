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
    field("questionnaireId", "questionnaire_id"),
    field("userId", "user_id"),
];

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub questionnaire_id: Uuid,
    pub answer: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub questionnaire_id: Uuid,
    pub answer: String,
    pub user_id: Uuid,
}

impl Owned for Answer {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

pub fn validate(v: &mut ValidationErrors, answer: &str) {
    v.check(!answer.is_empty(), "answer", "must be provided");
    v.check(answer.len() <= 1000, "answer", "must not be more than 1000 bytes long");
}
