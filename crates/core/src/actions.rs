use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const CREATE_CAMPAIGN: &str = "create_campaign";
pub const SEND_EMAIL: &str = "send_email";
pub const CREATE_SEGMENT: &str = "create_segment";
pub const SCHEDULE_CAMPAIGN: &str = "schedule_campaign";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid payload for {action}: {message}")]
    InvalidPayload { action: String, message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub contact_ids: Vec<String>,
    #[serde(default)]
    pub scheduled: bool,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Either a literal subject/html pair or a stored template rendered per
/// recipient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateSegmentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCampaignRequest {
    pub campaign_id: String,
    pub scheduled_at: DateTime<Utc>,
}

/// The four operations a human can approve, decoded and checked before any
/// handler runs. Everything else is rejected by name.
#[derive(Clone, Debug, PartialEq)]
pub enum ApprovedAction {
    CreateCampaign(CreateCampaignRequest),
    SendEmail(SendEmailRequest),
    CreateSegment(CreateSegmentRequest),
    ScheduleCampaign(ScheduleCampaignRequest),
}

impl ApprovedAction {
    pub fn from_parts(action: &str, details: Value) -> Result<Self, ActionError> {
        match action {
            CREATE_CAMPAIGN => {
                let request: CreateCampaignRequest = decode(action, details)?;
                if request.name.trim().is_empty() {
                    return Err(invalid(action, "campaign name must not be empty"));
                }
                if request.subject.trim().is_empty() {
                    return Err(invalid(action, "campaign subject must not be empty"));
                }
                Ok(Self::CreateCampaign(request))
            }
            SEND_EMAIL => {
                let request: SendEmailRequest = decode(action, details)?;
                if request.recipients.is_empty() {
                    return Err(invalid(action, "at least one recipient is required"));
                }
                if request.template_id.is_none()
                    && (request.subject.is_none() || request.html.is_none())
                {
                    return Err(invalid(
                        action,
                        "subject and html are required when templateId is not set",
                    ));
                }
                Ok(Self::SendEmail(request))
            }
            CREATE_SEGMENT => Ok(Self::CreateSegment(decode(action, details)?)),
            SCHEDULE_CAMPAIGN => {
                let request: ScheduleCampaignRequest = decode(action, details)?;
                if request.campaign_id.trim().is_empty() {
                    return Err(invalid(action, "campaignId must not be empty"));
                }
                Ok(Self::ScheduleCampaign(request))
            }
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCampaign(_) => CREATE_CAMPAIGN,
            Self::SendEmail(_) => SEND_EMAIL,
            Self::CreateSegment(_) => CREATE_SEGMENT,
            Self::ScheduleCampaign(_) => SCHEDULE_CAMPAIGN,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: &str, details: Value) -> Result<T, ActionError> {
    serde_json::from_value(details)
        .map_err(|error| invalid(action, error.to_string()))
}

fn invalid(action: &str, message: impl Into<String>) -> ActionError {
    ActionError::InvalidPayload { action: action.to_string(), message: message.into() }
}
