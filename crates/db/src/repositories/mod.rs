use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use relay_core::domain::activity::Activity;
use relay_core::domain::campaign::{Campaign, CampaignId};
use relay_core::domain::company::{Company, CompanyId};
use relay_core::domain::contact::{Contact, ContactId};
use relay_core::domain::email_log::{EmailLog, EmailLogId};
use relay_core::domain::operation::{ApprovedOperation, OperationKey};
use relay_core::domain::segment::SegmentFilter;
use relay_core::domain::template::{EmailTemplate, EmailTemplateId};

pub mod activity;
pub mod campaign;
pub mod company;
pub mod contact;
pub mod email_log;
pub mod memory;
pub mod operation;
pub mod template;

pub use activity::SqlActivityRepository;
pub use campaign::SqlCampaignRepository;
pub use company::SqlCompanyRepository;
pub use contact::SqlContactRepository;
pub use email_log::SqlEmailLogRepository;
pub use memory::{
    InMemoryActivityRepository, InMemoryCampaignRepository, InMemoryCompanyRepository,
    InMemoryContactRepository, InMemoryEmailLogRepository, InMemoryOperationRepository,
    InMemoryTemplateRepository,
};
pub use operation::SqlOperationRepository;
pub use template::SqlTemplateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// A segment query hit: the contact plus its company name for previews.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentMember {
    pub contact: Contact,
    pub company_name: Option<String>,
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    async fn save(&self, company: Company) -> Result<(), RepositoryError>;
    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError>;
    async fn sample_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Company>, RepositoryError>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, RepositoryError>;
    async fn find_by_email(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Contact>, RepositoryError>;
    async fn save(&self, contact: Contact) -> Result<(), RepositoryError>;
    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError>;
    async fn sample_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SegmentMember>, RepositoryError>;
    async fn find_matching(
        &self,
        user_id: &str,
        filter: &SegmentFilter,
    ) -> Result<Vec<SegmentMember>, RepositoryError>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError>;
    async fn save(&self, campaign: Campaign) -> Result<(), RepositoryError>;
    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait EmailLogRepository: Send + Sync {
    async fn save(&self, log: EmailLog) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &EmailLogId) -> Result<Option<EmailLog>, RepositoryError>;
    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<EmailLog>, RepositoryError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn record(&self, activity: Activity) -> Result<(), RepositoryError>;
    async fn count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError>;
    async fn list_recent(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Activity>, RepositoryError>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError>;
    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EmailTemplate>, RepositoryError>;
}

#[async_trait]
pub trait OperationRepository: Send + Sync {
    async fn find(
        &self,
        key: &OperationKey,
        user_id: &str,
    ) -> Result<Option<ApprovedOperation>, RepositoryError>;
    async fn save(&self, operation: ApprovedOperation) -> Result<(), RepositoryError>;
}
