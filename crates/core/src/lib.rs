pub mod actions;
pub mod config;
pub mod domain;
pub mod errors;
pub mod orchestration;
pub mod templates;

pub use actions::{ActionError, ApprovedAction, Recipient};
pub use domain::activity::{Activity, ActivityId};
pub use domain::campaign::{Campaign, CampaignId, CampaignStatus};
pub use domain::company::{Company, CompanyId};
pub use domain::contact::{Contact, ContactId};
pub use domain::email_log::{EmailLog, EmailLogId, EmailLogStatus};
pub use domain::operation::{ApprovedOperation, OperationKey};
pub use domain::segment::SegmentFilter;
pub use domain::template::{EmailTemplate, EmailTemplateId};
pub use errors::{DomainError, InterfaceError};
pub use orchestration::{parse_reply, ApprovalData, OrchestrationResponse};
