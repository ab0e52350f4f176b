//! In-memory store implementations for tests.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
        Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    answers::{
        model::{Answer, NewAnswer},
        repo::AnswerStore,
    },
    auth::{
        password::Password,
        tokens::{self, Scope, TokenRecord, TokenStore},
    },
    db::StoreError,
    filters::{Filters, SortDirection},
    questionnaires::{
        model::{NewQuestionnaire, Questionnaire},
        repo::QuestionnaireStore,
    },
    state::AppState,
    users::{
        model::{NewUser, User},
        repo::UserStore,
    },
};

/// Sorts by the filter column, then by id, and slices out the requested page.
fn paginate<T: Clone>(
    mut items: Vec<T>,
    filters: &Filters,
    by_column: impl Fn(&T, &T, &str) -> Ordering,
    id: impl Fn(&T) -> Uuid,
) -> (Vec<T>, i64) {
    items.sort_by(|a, b| {
        let primary = by_column(a, b, filters.sort.column);
        let primary = match filters.sort.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| id(a).cmp(&id(b)))
    });
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(filters.offset() as usize)
        .take(filters.limit() as usize)
        .collect();
    (page, total)
}

/// A user with a placeholder hash that never verifies. The username is the email's local part.
fn seeded_user(email: &str, activated: bool) -> NewUser {
    NewUser {
        name: "Seeded".into(),
        surname: "User".into(),
        username: email.split('@').next().unwrap_or(email).to_owned(),
        email: email.to_owned(),
        password: Password::from_hash("$argon2id$seeded".into()),
        activated,
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUsers {
    pub async fn seed(&self, email: &str, activated: bool) -> User {
        self.insert(&seeded_user(email, activated))
            .await
            .expect("seed user")
    }

    fn check_unique(rows: &HashMap<Uuid, User>, id: Option<Uuid>, email: &str, username: &str) -> Result<(), StoreError> {
        for other in rows.values().filter(|u| Some(u.id) != id) {
            if other.email == email {
                return Err(StoreError::Duplicate("email"));
            }
            if other.username == username {
                return Err(StoreError::Duplicate("username"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_unique(&rows, None, &user.email, &user.username)?;
        let now = OffsetDateTime::now_utc();
        let stored = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: user.name.clone(),
            surname: user.surname.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            password: Password::from_hash(user.password.persisted_hash().to_owned()),
            activated: user.activated,
            version: 1,
        };
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_unique(&rows, Some(user.id), &user.email, &user.username)?;
        let current = rows.get_mut(&user.id).ok_or(StoreError::EditConflict)?;
        if current.version != user.version {
            return Err(StoreError::EditConflict);
        }
        *current = User {
            password: Password::from_hash(user.password.persisted_hash().to_owned()),
            version: user.version + 1,
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(current.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(&self, filters: &Filters) -> Result<(Vec<User>, i64), StoreError> {
        let items = self.rows.lock().unwrap().values().cloned().collect();
        Ok(paginate(
            items,
            filters,
            |a, b, column| match column {
                "created_at" => a.created_at.cmp(&b.created_at),
                "name" => a.name.cmp(&b.name),
                "surname" => a.surname.cmp(&b.surname),
                "username" => a.username.cmp(&b.username),
                "email" => a.email.cmp(&b.email),
                _ => a.id.cmp(&b.id),
            },
            |u| u.id,
        ))
    }
}

#[derive(Default)]
pub struct MemoryTokens {
    rows: Mutex<Vec<TokenRecord>>,
    lookups: AtomicUsize,
}

impl MemoryTokens {
    pub fn records(&self) -> Vec<TokenRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Number of `get_by_hash` calls served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for MemoryTokens {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn get_by_hash(&self, hash: &[u8]) -> Result<Option<TokenRecord>, StoreError> {
        self.lookups.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.hash == hash)
            .cloned())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: Uuid) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.scope == scope && r.user_id == user_id));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryQuestionnaires {
    rows: Mutex<HashMap<Uuid, Questionnaire>>,
}

#[async_trait]
impl QuestionnaireStore for MemoryQuestionnaires {
    async fn insert(&self, q: &NewQuestionnaire) -> Result<Questionnaire, StoreError> {
        let now = OffsetDateTime::now_utc();
        let stored = Questionnaire {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            topic: q.topic.clone(),
            questions: q.questions.clone(),
            user_id: q.user_id,
        };
        self.rows.lock().unwrap().insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Questionnaire>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn update(
        &self,
        q: &Questionnaire,
        expected_updated_at: OffsetDateTime,
    ) -> Result<Questionnaire, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let current = rows.get_mut(&q.id).ok_or(StoreError::EditConflict)?;
        if current.updated_at != expected_updated_at {
            return Err(StoreError::EditConflict);
        }
        current.topic = q.topic.clone();
        current.questions = q.questions.clone();
        current.updated_at = OffsetDateTime::now_utc();
        Ok(current.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(
        &self,
        topic: Option<&str>,
        filters: &Filters,
    ) -> Result<(Vec<Questionnaire>, i64), StoreError> {
        let items = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|q| match topic {
                Some(t) if !t.is_empty() => q.topic.to_lowercase() == t.to_lowercase(),
                _ => true,
            })
            .cloned()
            .collect();
        Ok(paginate(
            items,
            filters,
            |a, b, column| match column {
                "created_at" => a.created_at.cmp(&b.created_at),
                "updated_at" => a.updated_at.cmp(&b.updated_at),
                "topic" => a.topic.cmp(&b.topic),
                "user_id" => a.user_id.cmp(&b.user_id),
                _ => a.id.cmp(&b.id),
            },
            |q| q.id,
        ))
    }
}

#[derive(Default)]
pub struct MemoryAnswers {
    rows: Mutex<HashMap<Uuid, Answer>>,
}

#[async_trait]
impl AnswerStore for MemoryAnswers {
    async fn insert(&self, a: &NewAnswer) -> Result<Answer, StoreError> {
        let now = OffsetDateTime::now_utc();
        let stored = Answer {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            questionnaire_id: a.questionnaire_id,
            answer: a.answer.clone(),
            user_id: a.user_id,
        };
        self.rows.lock().unwrap().insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Answer>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn update(
        &self,
        a: &Answer,
        expected_updated_at: OffsetDateTime,
    ) -> Result<Answer, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let current = rows.get_mut(&a.id).ok_or(StoreError::EditConflict)?;
        if current.updated_at != expected_updated_at {
            return Err(StoreError::EditConflict);
        }
        current.questionnaire_id = a.questionnaire_id;
        current.answer = a.answer.clone();
        current.updated_at = OffsetDateTime::now_utc();
        Ok(current.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(
        &self,
        questionnaire_id: Option<Uuid>,
        filters: &Filters,
    ) -> Result<(Vec<Answer>, i64), StoreError> {
        let items = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| questionnaire_id.map_or(true, |q| a.questionnaire_id == q))
            .cloned()
            .collect();
        Ok(paginate(
            items,
            filters,
            |a, b, column| match column {
                "created_at" => a.created_at.cmp(&b.created_at),
                "updated_at" => a.updated_at.cmp(&b.updated_at),
                "questionnaire_id" => a.questionnaire_id.cmp(&b.questionnaire_id),
                "user_id" => a.user_id.cmp(&b.user_id),
                _ => a.id.cmp(&b.id),
            },
            |a| a.id,
        ))
    }
}

/// Issues an authentication token for the user with `email`, seeding it first if needed.
pub async fn sign_in(state: &AppState, email: &str, activated: bool) -> (User, String) {
    let user = match state.users.get_by_email(email).await.expect("lookup user") {
        Some(user) => user,
        None => state
            .users
            .insert(&seeded_user(email, activated))
            .await
            .expect("seed user"),
    };
    let token = tokens::issue(
        state.tokens.as_ref(),
        user.id,
        state.config.tokens.authentication_ttl(),
        Scope::Authentication,
    )
    .await
    .expect("issue token");
    (user, token.plaintext)
}

/// Sends a JSON request through `app`. A reply that is not JSON comes back as a string.
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}
