use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailTemplateId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    pub user_id: String,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
