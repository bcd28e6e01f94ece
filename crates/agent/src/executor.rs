use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use relay_core::actions::{
    ApprovedAction, CreateCampaignRequest, CreateSegmentRequest, Recipient,
    ScheduleCampaignRequest, SendEmailRequest,
};
use relay_core::domain::activity::{Activity, ActivityId};
use relay_core::domain::campaign::{Campaign, CampaignId, CampaignStatus};
use relay_core::domain::contact::ContactId;
use relay_core::domain::email_log::{EmailLog, EmailLogId, EmailLogStatus};
use relay_core::domain::operation::{ApprovedOperation, OperationKey};
use relay_core::domain::segment::SegmentFilter;
use relay_core::domain::template::{EmailTemplate, EmailTemplateId};
use relay_core::templates::render_for_contact;
use relay_db::repositories::{
    ActivityRepository, CampaignRepository, CompanyRepository, ContactRepository,
    EmailLogRepository, OperationRepository, TemplateRepository,
};
use relay_mailer::{Mailer, OutboundEmail};

const SEGMENT_PREVIEW_SIZE: usize = 10;

/// What the approver sees after execution. Failures are data, not errors:
/// `success: false` with the reason in `result`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub result: Value,
}

impl ExecutionOutcome {
    fn ok(result: Value) -> Self {
        Self { success: true, result }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, result: Value::String(message.into()) }
    }
}

/// Runs human-approved actions against the CRM. Every dependency is injected,
/// so tests swap in in-memory repositories and a recording mailer.
pub struct ActionExecutor {
    contacts: Arc<dyn ContactRepository>,
    companies: Arc<dyn CompanyRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    email_logs: Arc<dyn EmailLogRepository>,
    templates: Arc<dyn TemplateRepository>,
    activities: Arc<dyn ActivityRepository>,
    operations: Arc<dyn OperationRepository>,
    mailer: Arc<dyn Mailer>,
}

impl ActionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contacts: Arc<dyn ContactRepository>,
        companies: Arc<dyn CompanyRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        email_logs: Arc<dyn EmailLogRepository>,
        templates: Arc<dyn TemplateRepository>,
        activities: Arc<dyn ActivityRepository>,
        operations: Arc<dyn OperationRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self { contacts, companies, campaigns, email_logs, templates, activities, operations, mailer }
    }

    /// Executes one approved action. Never returns an error: validation
    /// failures, missing rows, and delivery problems all surface as an
    /// unsuccessful outcome with a human-readable reason.
    ///
    /// When `idempotency_key` is set, a repeated submission with the same key
    /// replays the stored outcome instead of running the action again.
    pub async fn execute(
        &self,
        action: &str,
        details: Value,
        user_id: &str,
        idempotency_key: Option<&str>,
    ) -> ExecutionOutcome {
        let payload_hash = hash_payload(&details);

        if let Some(key) = idempotency_key {
            let operation_key = OperationKey(key.to_string());
            match self.operations.find(&operation_key, user_id).await {
                Ok(Some(stored)) if stored.payload_hash != payload_hash => {
                    warn!(
                        event_name = "executor.operation.key_conflict",
                        %user_id,
                        action = %stored.action,
                        "idempotency key reused with a different payload"
                    );
                    return ExecutionOutcome::failed(format!(
                        "Idempotency key {key} was already used with a different payload"
                    ));
                }
                Ok(Some(stored)) => {
                    info!(
                        event_name = "executor.operation.replayed",
                        %user_id,
                        action = %stored.action,
                        "replaying stored outcome for repeated submission"
                    );
                    let result = serde_json::from_str(&stored.result_json)
                        .unwrap_or(Value::String(stored.result_json));
                    return ExecutionOutcome { success: stored.success, result };
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "executor.operation.lookup_failed",
                        %user_id,
                        error = %error,
                        "idempotency lookup failed, executing anyway"
                    );
                }
            }
        }

        let outcome = match ApprovedAction::from_parts(action, details) {
            Ok(approved) => match self.run(approved, user_id).await {
                Ok(result) => ExecutionOutcome::ok(result),
                Err(error) => ExecutionOutcome::failed(error.to_string()),
            },
            Err(error) => ExecutionOutcome::failed(error.to_string()),
        };

        if let Some(key) = idempotency_key {
            let record = ApprovedOperation {
                operation_key: OperationKey(key.to_string()),
                user_id: user_id.to_string(),
                action: action.to_string(),
                payload_hash,
                success: outcome.success,
                result_json: outcome.result.to_string(),
                executed_at: Utc::now(),
            };
            if let Err(error) = self.operations.save(record).await {
                warn!(
                    event_name = "executor.operation.save_failed",
                    %user_id,
                    error = %error,
                    "failed to record executed operation"
                );
            }
        }

        outcome
    }

    async fn run(&self, action: ApprovedAction, user_id: &str) -> Result<Value> {
        let name = action.name();
        let result = match action {
            ApprovedAction::CreateCampaign(request) => {
                self.create_campaign(request, user_id).await?
            }
            ApprovedAction::SendEmail(request) => self.send_email(request, user_id).await?,
            ApprovedAction::CreateSegment(request) => {
                self.create_segment(request, user_id).await?
            }
            ApprovedAction::ScheduleCampaign(request) => {
                self.schedule_campaign(request, user_id).await?
            }
        };
        info!(event_name = "executor.action.completed", %user_id, action = name);
        Ok(result)
    }

    async fn create_campaign(
        &self,
        request: CreateCampaignRequest,
        user_id: &str,
    ) -> Result<Value> {
        let now = Utc::now();
        let status =
            if request.scheduled { CampaignStatus::Scheduled } else { CampaignStatus::Draft };
        // Plain-text body falls back to the HTML content with tags removed.
        let text_content =
            request.text_content.clone().or_else(|| Some(strip_html(&request.content)));
        let campaign = Campaign {
            id: CampaignId(Uuid::new_v4().to_string()),
            user_id: user_id.to_string(),
            name: request.name.clone(),
            subject: request.subject,
            html_content: request.content,
            text_content,
            status,
            scheduled_at: request.scheduled_at,
            created_at: now,
            updated_at: now,
        };
        let campaign_id = campaign.id.clone();
        self.campaigns.save(campaign).await?;

        for contact_id in &request.contact_ids {
            self.email_logs
                .save(EmailLog {
                    id: EmailLogId(Uuid::new_v4().to_string()),
                    campaign_id: campaign_id.clone(),
                    contact_id: ContactId(contact_id.clone()),
                    status: EmailLogStatus::Pending,
                    error: None,
                    sent_at: None,
                    created_at: Utc::now(),
                })
                .await?;
        }

        self.record_activity(
            user_id,
            "campaign_created",
            format!("Created campaign {}", request.name),
        )
        .await;

        Ok(json!({
            "campaignId": campaign_id.0,
            "name": request.name,
            "contactCount": request.contact_ids.len(),
        }))
    }

    async fn send_email(&self, request: SendEmailRequest, user_id: &str) -> Result<Value> {
        let template = match &request.template_id {
            Some(id) => Some(
                self.templates
                    .find_by_id(&EmailTemplateId(id.clone()))
                    .await?
                    .filter(|template| template.user_id == user_id)
                    .ok_or_else(|| anyhow!("Template not found"))?,
            ),
            None => None,
        };

        let mut sent = 0usize;
        let mut failed = 0usize;
        let mut details = Vec::with_capacity(request.recipients.len());

        // Sequential on purpose: delivery order is predictable and provider
        // rate limits stay easy to reason about.
        for recipient in &request.recipients {
            let email = match self.compose(&request, template.as_ref(), recipient, user_id).await
            {
                Ok(email) => email,
                Err(error) => {
                    failed += 1;
                    details.push(json!({
                        "email": recipient.email,
                        "status": "failed",
                        "error": error.to_string(),
                    }));
                    continue;
                }
            };
            match self.mailer.send(&email).await {
                Ok(()) => {
                    sent += 1;
                    details.push(json!({"email": recipient.email, "status": "sent"}));
                }
                Err(error) => {
                    failed += 1;
                    details.push(json!({
                        "email": recipient.email,
                        "status": "failed",
                        "error": error.to_string(),
                    }));
                }
            }
        }

        self.record_activity(user_id, "emails_sent", format!("Sent {sent} emails ({failed} failed)"))
            .await;

        Ok(json!({"sent": sent, "failed": failed, "details": details}))
    }

    /// Builds the outbound message for one recipient. With a template, the
    /// subject and body are rendered against the recipient's contact record;
    /// a recipient with no contact record fails individually.
    async fn compose(
        &self,
        request: &SendEmailRequest,
        template: Option<&EmailTemplate>,
        recipient: &Recipient,
        user_id: &str,
    ) -> Result<OutboundEmail> {
        let Some(template) = template else {
            return Ok(OutboundEmail {
                to: recipient.email.clone(),
                subject: request.subject.clone().unwrap_or_default(),
                html: request.html.clone().unwrap_or_default(),
                text: None,
            });
        };

        let contact = self
            .contacts
            .find_by_email(user_id, &recipient.email)
            .await?
            .ok_or_else(|| anyhow!("no contact record for {}", recipient.email))?;
        let company = match &contact.company_id {
            Some(id) => self.companies.find_by_id(id).await?,
            None => None,
        };
        let rendered = render_for_contact(template, &contact, company.as_ref())?;

        Ok(OutboundEmail {
            to: recipient.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            text: None,
        })
    }

    async fn create_segment(&self, request: CreateSegmentRequest, user_id: &str) -> Result<Value> {
        let filter = SegmentFilter {
            industry: request.industry,
            title_contains: request.title,
            location_contains: request.location,
        };
        let members = self.contacts.find_matching(user_id, &filter).await?;

        let preview: Vec<Value> = members
            .iter()
            .take(SEGMENT_PREVIEW_SIZE)
            .map(|member| {
                json!({
                    "name": member.contact.full_name(),
                    "email": member.contact.email,
                    "company": member.company_name,
                })
            })
            .collect();

        let segment_name = request.name.clone().map(Value::String).unwrap_or(Value::Null);
        self.record_activity(
            user_id,
            "segment_previewed",
            format!("Previewed segment with {} contacts", members.len()),
        )
        .await;

        Ok(json!({
            "segmentName": segment_name,
            "contactCount": members.len(),
            "contacts": preview,
        }))
    }

    async fn schedule_campaign(
        &self,
        request: ScheduleCampaignRequest,
        user_id: &str,
    ) -> Result<Value> {
        if request.scheduled_at <= Utc::now() {
            bail!("scheduledAt must be in the future");
        }

        let campaign_id = CampaignId(request.campaign_id.clone());
        let mut campaign = self
            .campaigns
            .find_by_id(&campaign_id)
            .await?
            .ok_or_else(|| anyhow!("Campaign not found"))?;
        if campaign.user_id != user_id {
            bail!("Campaign not found");
        }

        // Rescheduling an already scheduled campaign only moves the timestamp.
        if campaign.status != CampaignStatus::Scheduled {
            campaign.transition_to(CampaignStatus::Scheduled)?;
        }
        campaign.scheduled_at = Some(request.scheduled_at);
        campaign.updated_at = Utc::now();
        self.campaigns.save(campaign).await?;

        self.record_activity(
            user_id,
            "campaign_scheduled",
            format!("Scheduled campaign {}", request.campaign_id),
        )
        .await;

        Ok(json!({
            "campaignId": request.campaign_id,
            "scheduledAt": request.scheduled_at.to_rfc3339(),
        }))
    }

    async fn record_activity(&self, user_id: &str, kind: &str, detail: String) {
        let activity = Activity {
            id: ActivityId(Uuid::new_v4().to_string()),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            detail,
            created_at: Utc::now(),
        };
        if let Err(error) = self.activities.record(activity).await {
            warn!(
                event_name = "executor.activity.save_failed",
                %user_id,
                error = %error,
                "failed to record activity"
            );
        }
    }
}

fn hash_payload(details: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(details.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    use relay_core::domain::campaign::{Campaign, CampaignId, CampaignStatus};
    use relay_core::domain::company::{Company, CompanyId};
    use relay_core::domain::contact::{Contact, ContactId};
    use relay_core::domain::template::{EmailTemplate, EmailTemplateId};
    use relay_db::repositories::{
        CampaignRepository, CompanyRepository, ContactRepository, EmailLogRepository,
        InMemoryActivityRepository, InMemoryCampaignRepository, InMemoryCompanyRepository,
        InMemoryContactRepository, InMemoryEmailLogRepository, InMemoryOperationRepository,
        InMemoryTemplateRepository, TemplateRepository,
    };
    use relay_mailer::RecordingMailer;

    use super::{strip_html, ActionExecutor};

    struct Harness {
        executor: ActionExecutor,
        contacts: Arc<InMemoryContactRepository>,
        companies: Arc<InMemoryCompanyRepository>,
        campaigns: Arc<InMemoryCampaignRepository>,
        email_logs: Arc<InMemoryEmailLogRepository>,
        templates: Arc<InMemoryTemplateRepository>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        harness_with_mailer(RecordingMailer::default())
    }

    fn harness_with_mailer(mailer: RecordingMailer) -> Harness {
        let companies = Arc::new(InMemoryCompanyRepository::default());
        let contacts = Arc::new(InMemoryContactRepository::new(companies.clone()));
        let campaigns = Arc::new(InMemoryCampaignRepository::default());
        let email_logs = Arc::new(InMemoryEmailLogRepository::default());
        let templates = Arc::new(InMemoryTemplateRepository::default());
        let mailer = Arc::new(mailer);

        let executor = ActionExecutor::new(
            contacts.clone(),
            companies.clone(),
            campaigns.clone(),
            email_logs.clone(),
            templates.clone(),
            Arc::new(InMemoryActivityRepository::default()),
            Arc::new(InMemoryOperationRepository::default()),
            mailer.clone(),
        );

        Harness { executor, contacts, companies, campaigns, email_logs, templates, mailer }
    }

    async fn seed_contact(h: &Harness, id: &str, title: &str, company_id: Option<&str>) {
        let now = Utc::now();
        h.contacts
            .save(Contact {
                id: ContactId(id.to_string()),
                user_id: "user-1".to_string(),
                company_id: company_id.map(|v| CompanyId(v.to_string())),
                first_name: "Contact".to_string(),
                last_name: id.to_string(),
                email: format!("{id}@example.com"),
                title: Some(title.to_string()),
                location: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save contact");
    }

    #[tokio::test]
    async fn unknown_action_fails_with_exact_message() {
        let h = harness();

        let outcome =
            h.executor.execute("delete_everything", json!({}), "user-1", None).await;

        assert!(!outcome.success);
        assert_eq!(outcome.result, Value::String("Unknown action: delete_everything".into()));
    }

    #[tokio::test]
    async fn invalid_payload_fails_without_side_effects() {
        let h = harness();

        let outcome = h
            .executor
            .execute("create_campaign", json!({"name": "No subject"}), "user-1", None)
            .await;

        assert!(!outcome.success);
        assert_eq!(h.campaigns.count_for_user("user-1").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn create_campaign_saves_draft_and_pending_logs() {
        let h = harness();
        seed_contact(&h, "ct-1", "Engineer", None).await;
        seed_contact(&h, "ct-2", "Designer", None).await;

        let outcome = h
            .executor
            .execute(
                "create_campaign",
                json!({
                    "name": "Spring Launch",
                    "subject": "Big news",
                    "content": "<p>Hi</p>",
                    "contactIds": ["ct-1", "ct-2"],
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["name"], "Spring Launch");
        assert_eq!(outcome.result["contactCount"], 2);

        let campaign_id =
            CampaignId(outcome.result["campaignId"].as_str().expect("id").to_string());
        let campaign =
            h.campaigns.find_by_id(&campaign_id).await.expect("find").expect("exists");
        assert_eq!(campaign.status, CampaignStatus::Draft);

        let logs = h.email_logs.list_for_campaign(&campaign_id).await.expect("logs");
        assert_eq!(logs.len(), 2);
        assert!(logs
            .iter()
            .all(|log| log.status == relay_core::domain::email_log::EmailLogStatus::Pending));
    }

    #[tokio::test]
    async fn create_campaign_with_scheduled_flag_starts_scheduled() {
        let h = harness();

        let scheduled_at = (Utc::now() + Duration::days(2)).to_rfc3339();
        let outcome = h
            .executor
            .execute(
                "create_campaign",
                json!({
                    "name": "Launch",
                    "subject": "Soon",
                    "content": "<p>Hi</p>",
                    "scheduled": true,
                    "scheduledAt": scheduled_at,
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        let campaign_id =
            CampaignId(outcome.result["campaignId"].as_str().expect("id").to_string());
        let campaign =
            h.campaigns.find_by_id(&campaign_id).await.expect("find").expect("exists");
        assert_eq!(campaign.status, CampaignStatus::Scheduled);
        assert!(campaign.scheduled_at.is_some());
    }

    #[tokio::test]
    async fn send_email_tallies_sent_and_failed_per_recipient() {
        let h = harness_with_mailer(RecordingMailer::failing_for(vec![
            "bounce@example.com".to_string(),
        ]));

        let outcome = h
            .executor
            .execute(
                "send_email",
                json!({
                    "recipients": [
                        {"email": "ok@example.com"},
                        {"email": "bounce@example.com"},
                        {"email": "not-an-address"},
                    ],
                    "subject": "Hello",
                    "html": "<p>Hi</p>",
                }),
                "user-1",
                None,
            )
            .await;

        // Per-recipient failures are reported in the tally, not as a batch failure.
        assert!(outcome.success);
        assert_eq!(outcome.result["sent"], 1);
        assert_eq!(outcome.result["failed"], 2);

        let details = outcome.result["details"].as_array().expect("details");
        assert_eq!(details.len(), 3);
        assert_eq!(details[0]["status"], "sent");
        assert_eq!(details[1]["status"], "failed");
        assert_eq!(details[2]["status"], "failed");

        assert_eq!(h.mailer.sent().await.len(), 1);
    }

    async fn seed_company(h: &Harness, id: &str, name: &str) {
        let now = Utc::now();
        h.companies
            .save(Company {
                id: CompanyId(id.to_string()),
                user_id: "user-1".to_string(),
                name: name.to_string(),
                industry: Some("Software".to_string()),
                website: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save company");
    }

    async fn seed_template(h: &Harness, id: &str, subject: &str, html_body: &str) {
        let now = Utc::now();
        h.templates
            .save(EmailTemplate {
                id: EmailTemplateId(id.to_string()),
                user_id: "user-1".to_string(),
                name: "welcome".to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save template");
    }

    #[tokio::test]
    async fn create_campaign_derives_text_content_from_html() {
        let h = harness();

        let outcome = h
            .executor
            .execute(
                "create_campaign",
                json!({
                    "name": "Launch",
                    "subject": "Hi",
                    "content": "<p>Hello <strong>there</strong></p>",
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        let campaign_id =
            CampaignId(outcome.result["campaignId"].as_str().expect("id").to_string());
        let campaign =
            h.campaigns.find_by_id(&campaign_id).await.expect("find").expect("exists");
        assert_eq!(campaign.text_content.as_deref(), Some("Hello there"));
    }

    #[tokio::test]
    async fn create_campaign_keeps_explicit_text_content() {
        let h = harness();

        let outcome = h
            .executor
            .execute(
                "create_campaign",
                json!({
                    "name": "Launch",
                    "subject": "Hi",
                    "content": "<p>Hello</p>",
                    "textContent": "custom plain text",
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        let campaign_id =
            CampaignId(outcome.result["campaignId"].as_str().expect("id").to_string());
        let campaign =
            h.campaigns.find_by_id(&campaign_id).await.expect("find").expect("exists");
        assert_eq!(campaign.text_content.as_deref(), Some("custom plain text"));
    }

    #[test]
    fn strip_html_removes_tags_and_trims() {
        assert_eq!(strip_html("<p>Hello <strong>there</strong></p>"), "Hello there");
        assert_eq!(strip_html("no markup"), "no markup");
    }

    #[tokio::test]
    async fn send_email_with_template_personalizes_each_recipient() {
        let h = harness();
        seed_company(&h, "co-1", "Acme").await;
        seed_contact(&h, "ct-1", "Engineer", Some("co-1")).await;
        seed_template(
            &h,
            "tpl-1",
            "Hello {{ first_name }}",
            "<p>{{ full_name }} at {{ company }}</p>",
        )
        .await;

        let outcome = h
            .executor
            .execute(
                "send_email",
                json!({
                    "recipients": [{"email": "ct-1@example.com"}],
                    "templateId": "tpl-1",
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["sent"], 1);

        let sent = h.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hello Contact");
        assert_eq!(sent[0].html, "<p>Contact ct-1 at Acme</p>");
    }

    #[tokio::test]
    async fn send_email_with_template_fails_recipients_without_a_contact() {
        let h = harness();
        seed_contact(&h, "ct-1", "Engineer", None).await;
        seed_template(&h, "tpl-1", "Hello {{ first_name }}", "<p>Hi</p>").await;

        let outcome = h
            .executor
            .execute(
                "send_email",
                json!({
                    "recipients": [
                        {"email": "ct-1@example.com"},
                        {"email": "stranger@example.com"},
                    ],
                    "templateId": "tpl-1",
                }),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["sent"], 1);
        assert_eq!(outcome.result["failed"], 1);

        let details = outcome.result["details"].as_array().expect("details");
        assert_eq!(details[1]["status"], "failed");
        assert!(details[1]["error"]
            .as_str()
            .expect("error")
            .contains("no contact record"));
    }

    #[tokio::test]
    async fn send_email_with_missing_template_fails_without_sending() {
        let h = harness();

        let outcome = h
            .executor
            .execute(
                "send_email",
                json!({
                    "recipients": [{"email": "a@example.com"}],
                    "templateId": "tpl-missing",
                }),
                "user-1",
                None,
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result, Value::String("Template not found".into()));
        assert!(h.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn create_segment_previews_first_ten_of_full_count() {
        let h = harness();
        for index in 0..15 {
            seed_contact(&h, &format!("ct-{index}"), "Engineer", None).await;
        }

        let outcome = h
            .executor
            .execute(
                "create_segment",
                json!({"name": "Engineers", "title": "engineer"}),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["segmentName"], "Engineers");
        assert_eq!(outcome.result["contactCount"], 15);
        assert_eq!(outcome.result["contacts"].as_array().expect("preview").len(), 10);
    }

    #[tokio::test]
    async fn create_segment_resolves_company_names() {
        let h = harness();
        let now = Utc::now();
        h.companies
            .save(Company {
                id: CompanyId("co-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Acme".to_string(),
                industry: Some("Software".to_string()),
                website: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save company");
        seed_contact(&h, "ct-1", "Engineer", Some("co-1")).await;

        let outcome = h
            .executor
            .execute("create_segment", json!({"industry": "Software"}), "user-1", None)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["segmentName"], Value::Null);
        assert_eq!(outcome.result["contacts"][0]["company"], "Acme");
    }

    #[tokio::test]
    async fn schedule_campaign_moves_draft_to_scheduled() {
        let h = harness();
        let now = Utc::now();
        h.campaigns
            .save(Campaign {
                id: CampaignId("cmp-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Launch".to_string(),
                subject: "Soon".to_string(),
                html_content: "<p>Hi</p>".to_string(),
                text_content: None,
                status: CampaignStatus::Draft,
                scheduled_at: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save campaign");

        let scheduled_at = (Utc::now() + Duration::days(1)).to_rfc3339();
        let outcome = h
            .executor
            .execute(
                "schedule_campaign",
                json!({"campaignId": "cmp-1", "scheduledAt": scheduled_at}),
                "user-1",
                None,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["campaignId"], "cmp-1");

        let campaign = h
            .campaigns
            .find_by_id(&CampaignId("cmp-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(campaign.status, CampaignStatus::Scheduled);
        assert!(campaign.scheduled_at.is_some());
    }

    #[tokio::test]
    async fn schedule_campaign_rejects_past_timestamp() {
        let h = harness();

        let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
        let outcome = h
            .executor
            .execute(
                "schedule_campaign",
                json!({"campaignId": "cmp-1", "scheduledAt": past}),
                "user-1",
                None,
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result, Value::String("scheduledAt must be in the future".into()));
    }

    #[tokio::test]
    async fn schedule_campaign_for_missing_or_foreign_campaign_fails() {
        let h = harness();
        let now = Utc::now();
        h.campaigns
            .save(Campaign {
                id: CampaignId("cmp-other".to_string()),
                user_id: "user-2".to_string(),
                name: "Theirs".to_string(),
                subject: "Soon".to_string(),
                html_content: "<p>Hi</p>".to_string(),
                text_content: None,
                status: CampaignStatus::Draft,
                scheduled_at: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("save campaign");

        let future = (Utc::now() + Duration::days(1)).to_rfc3339();
        for campaign_id in ["cmp-missing", "cmp-other"] {
            let outcome = h
                .executor
                .execute(
                    "schedule_campaign",
                    json!({"campaignId": campaign_id, "scheduledAt": future}),
                    "user-1",
                    None,
                )
                .await;

            assert!(!outcome.success);
            assert_eq!(outcome.result, Value::String("Campaign not found".into()));
        }
    }

    #[tokio::test]
    async fn repeated_submission_with_same_key_replays_first_outcome() {
        let h = harness();

        let payload = json!({
            "name": "Launch",
            "subject": "Soon",
            "content": "<p>Hi</p>",
        });

        let first = h
            .executor
            .execute("create_campaign", payload.clone(), "user-1", Some("op-1"))
            .await;
        let second =
            h.executor.execute("create_campaign", payload, "user-1", Some("op-1")).await;

        assert!(first.success);
        assert_eq!(first.result, second.result);
        assert_eq!(h.campaigns.count_for_user("user-1").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn reused_key_with_different_payload_is_rejected() {
        let h = harness();

        let first = h
            .executor
            .execute(
                "create_campaign",
                json!({"name": "Launch", "subject": "Soon", "content": "<p>Hi</p>"}),
                "user-1",
                Some("op-1"),
            )
            .await;
        assert!(first.success);

        let second = h
            .executor
            .execute(
                "create_campaign",
                json!({"name": "Different", "subject": "Soon", "content": "<p>Hi</p>"}),
                "user-1",
                Some("op-1"),
            )
            .await;

        assert!(!second.success);
        assert_eq!(
            second.result,
            Value::String("Idempotency key op-1 was already used with a different payload".into())
        );
        assert_eq!(h.campaigns.count_for_user("user-1").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn different_users_do_not_share_idempotency_keys() {
        let h = harness();

        let payload = json!({"name": "Launch", "subject": "Soon", "content": "<p>Hi</p>"});
        h.executor.execute("create_campaign", payload.clone(), "user-1", Some("op-1")).await;
        h.executor.execute("create_campaign", payload, "user-2", Some("op-1")).await;

        assert_eq!(h.campaigns.count_for_user("user-1").await.expect("count"), 1);
        assert_eq!(h.campaigns.count_for_user("user-2").await.expect("count"), 1);
    }
}
