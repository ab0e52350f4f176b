use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateAnswerRequest, UpdateAnswerRequest},
    model::{self, Answer, NewAnswer, SORT_FIELDS},
};
use crate::{
    auth::guard::{require_ownership, AuthUser},
    error::{AppError, ValidationErrors},
    extract::{JsonBody, PathParam, QueryParams},
    filters::{build_filters, ListQuery, Page},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/answers", get(list_answers).post(create_answer))
        .route(
            "/answers/:id",
            get(get_answer).put(update_answer).delete(delete_answer),
        )
        .route("/questionnaires/:id/answers", get(list_for_questionnaire))
}

async fn fetch(state: &AppState, id: Uuid) -> Result<Answer, AppError> {
    state.answers.get(id).await?.ok_or(AppError::NotFound)
}

/// Answers may only point at questionnaires that exist.
async fn ensure_questionnaire(state: &AppState, questionnaire_id: Uuid) -> Result<(), AppError> {
    match state.questionnaires.get(questionnaire_id).await? {
        Some(_) => Ok(()),
        None => {
            warn!(%questionnaire_id, "answer refers to a missing questionnaire");
            Err(AppError::NotFound)
        }
    }
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<CreateAnswerRequest>,
) -> Result<(StatusCode, Json<Answer>), AppError> {
    let mut v = ValidationErrors::new();
    model::validate(&mut v, &payload.answer);
    if !v.is_empty() {
        warn!("answer rejected");
        return Err(AppError::Validation(v));
    }
    ensure_questionnaire(&state, payload.questionnaire_id).await?;

    let a = state
        .answers
        .insert(&NewAnswer {
            questionnaire_id: payload.questionnaire_id,
            answer: payload.answer,
            user_id: user.id,
        })
        .await?;
    info!(answer_id = %a.id, questionnaire_id = %a.questionnaire_id, "answer created");
    Ok((StatusCode::CREATED, Json(a)))
}

#[instrument(skip(state, _user))]
pub async fn list_answers(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Page<Answer>>, AppError> {
    let filters = build_filters(&query, SORT_FIELDS, &state.config.paging)?;
    let (items, total) = state.answers.list(None, &filters).await?;
    Ok(Json(Page::new(items, total, &filters)))
}

#[instrument(skip(state, _user))]
pub async fn list_for_questionnaire(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    PathParam(id): PathParam<Uuid>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Page<Answer>>, AppError> {
    let filters = build_filters(&query, SORT_FIELDS, &state.config.paging)?;
    state
        .questionnaires
        .get(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let (items, total) = state.answers.list_for_questionnaire(id, &filters).await?;
    Ok(Json(Page::new(items, total, &filters)))
}

#[instrument(skip(state, _user))]
pub async fn get_answer(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Answer>, AppError> {
    Ok(Json(fetch(&state, id).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateAnswerRequest>,
) -> Result<Json<Answer>, AppError> {
    let mut a = fetch(&state, id).await?;
    require_ownership(&a, user.id)?;

    let read_at = a.updated_at;
    if let Some(answer) = payload.answer {
        a.answer = answer;
    }

    let mut v = ValidationErrors::new();
    model::validate(&mut v, &a.answer);
    if !v.is_empty() {
        warn!(answer_id = %id, "answer update rejected");
        return Err(AppError::Validation(v));
    }
    if let Some(questionnaire_id) = payload.questionnaire_id {
        if questionnaire_id != a.questionnaire_id {
            ensure_questionnaire(&state, questionnaire_id).await?;
            a.questionnaire_id = questionnaire_id;
        }
    }

    let a = state.answers.update(&a, read_at).await?;
    info!(answer_id = %a.id, "answer updated");
    Ok(Json(a))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<StatusCode, AppError> {
    let a = fetch(&state, id).await?;
    require_ownership(&a, user.id)?;

    if !state.answers.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(answer_id = %id, "answer deleted");
    Ok(StatusCode::NO_CONTENT)
}
