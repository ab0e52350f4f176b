use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateQuestionnaireRequest, ListQuestionnairesQuery, UpdateQuestionnaireRequest},
    model::{self, NewQuestionnaire, Questionnaire, SORT_FIELDS},
};
use crate::{
    auth::guard::{require_ownership, AuthUser},
    error::{AppError, ValidationErrors},
    extract::{JsonBody, PathParam, QueryParams},
    filters::{build_filters, Page},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/questionnaires",
            get(list_questionnaires).post(create_questionnaire),
        )
        .route(
            "/questionnaires/:id",
            get(get_questionnaire)
                .put(update_questionnaire)
                .delete(delete_questionnaire),
        )
}

async fn fetch(state: &AppState, id: Uuid) -> Result<Questionnaire, AppError> {
    state.questionnaires.get(id).await?.ok_or(AppError::NotFound)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_questionnaire(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<CreateQuestionnaireRequest>,
) -> Result<(StatusCode, Json<Questionnaire>), AppError> {
    let new = NewQuestionnaire {
        topic: payload.topic.trim().to_owned(),
        questions: payload.questions,
        user_id: user.id,
    };

    let mut v = ValidationErrors::new();
    model::validate(&mut v, &new.topic, &new.questions);
    if !v.is_empty() {
        warn!("questionnaire rejected");
        return Err(AppError::Validation(v));
    }

    let q = state.questionnaires.insert(&new).await?;
    info!(questionnaire_id = %q.id, "questionnaire created");
    Ok((StatusCode::CREATED, Json(q)))
}

#[instrument(skip(state, _user))]
pub async fn list_questionnaires(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    QueryParams(query): QueryParams<ListQuestionnairesQuery>,
) -> Result<Json<Page<Questionnaire>>, AppError> {
    let filters = build_filters(&query.paging(), SORT_FIELDS, &state.config.paging)?;
    let topic = query.topic.as_deref().map(str::trim);
    let (items, total) = state.questionnaires.list(topic, &filters).await?;
    Ok(Json(Page::new(items, total, &filters)))
}

#[instrument(skip(state, _user))]
pub async fn get_questionnaire(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Questionnaire>, AppError> {
    Ok(Json(fetch(&state, id).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_questionnaire(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateQuestionnaireRequest>,
) -> Result<Json<Questionnaire>, AppError> {
    let mut q = fetch(&state, id).await?;
    require_ownership(&q, user.id)?;

    let read_at = q.updated_at;
    if let Some(topic) = payload.topic {
        q.topic = topic.trim().to_owned();
    }
    if let Some(questions) = payload.questions {
        q.questions = questions;
    }

    let mut v = ValidationErrors::new();
    model::validate(&mut v, &q.topic, &q.questions);
    if !v.is_empty() {
        warn!(questionnaire_id = %id, "questionnaire update rejected");
        return Err(AppError::Validation(v));
    }

    let q = state.questionnaires.update(&q, read_at).await?;
    info!(questionnaire_id = %q.id, "questionnaire updated");
    Ok(Json(q))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_questionnaire(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<StatusCode, AppError> {
    let q = fetch(&state, id).await?;
    require_ownership(&q, user.id)?;

    if !state.questionnaires.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(questionnaire_id = %id, "questionnaire deleted");
    Ok(StatusCode::NO_CONTENT)
}
