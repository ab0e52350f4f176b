use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnswerRequest {
    pub questionnaire_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnswerRequest {
    pub questionnaire_id: Option<Uuid>,
    pub answer: Option<String>,
}
