use std::sync::Arc;

use sqlx::PgPool;

use crate::answers::repo::{AnswerStore, PgAnswerStore};
use crate::auth::repo::PgTokenStore;
use crate::auth::tokens::TokenStore;
use crate::config::AppConfig;
use crate::questionnaires::repo::{PgQuestionnaireStore, QuestionnaireStore};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub questionnaires: Arc<dyn QuestionnaireStore>,
    pub answers: Arc<dyn AnswerStore>,
}

impl AppState {
    pub fn from_pool(db: PgPool, config: Arc<AppConfig>) -> Self {
        let timeout = config.store_timeout();
        Self {
            users: Arc::new(PgUserStore::new(db.clone(), timeout)),
            tokens: Arc::new(PgTokenStore::new(db.clone(), timeout)),
            questionnaires: Arc::new(PgQuestionnaireStore::new(db.clone(), timeout)),
            answers: Arc::new(PgAnswerStore::new(db, timeout)),
            config,
        }
    }

    /// State backed by in-memory stores.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::testing::{MemoryAnswers, MemoryQuestionnaires, MemoryTokens, MemoryUsers};

        Self {
            config: Arc::new(AppConfig::for_tests()),
            users: Arc::new(MemoryUsers::default()),
            tokens: Arc::new(MemoryTokens::default()),
            questionnaires: Arc::new(MemoryQuestionnaires::default()),
            answers: Arc::new(MemoryAnswers::default()),
        }
    }
}
