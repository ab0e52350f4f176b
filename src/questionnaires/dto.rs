use serde::Deserialize;

use crate::filters::ListQuery;

#[derive(Debug, Deserialize)]
pub struct CreateQuestionnaireRequest {
    pub topic: String,
    #[serde(default)]
    pub questions: String,
}

/// Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuestionnaireRequest {
    pub topic: Option<String>,
    pub questions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuestionnairesQuery {
    pub topic: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListQuestionnairesQuery {
    pub fn paging(&self) -> ListQuery {
        ListQuery {
            sort: self.sort.clone(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}
