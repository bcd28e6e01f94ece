use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use relay_core::domain::activity::Activity;
use relay_core::domain::campaign::{Campaign, CampaignId};
use relay_core::domain::company::{Company, CompanyId};
use relay_core::domain::contact::{Contact, ContactId};
use relay_core::domain::email_log::{EmailLog, EmailLogId};
use relay_core::domain::operation::{ApprovedOperation, OperationKey};
use relay_core::domain::segment::SegmentFilter;
use relay_core::domain::template::{EmailTemplate, EmailTemplateId};

use super::{
    ActivityRepository, CampaignRepository, CompanyRepository, ContactRepository,
    EmailLogRepository, OperationRepository, RepositoryError, SegmentMember, TemplateRepository,
};

#[derive(Default)]
pub struct InMemoryCompanyRepository {
    companies: RwLock<HashMap<String, Company>>,
}

#[async_trait::async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let companies = self.companies.read().await;
        Ok(companies.get(&id.0).cloned())
    }

    async fn save(&self, company: Company) -> Result<(), RepositoryError> {
        let mut companies = self.companies.write().await;
        companies.insert(company.id.0.clone(), company);
        Ok(())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let companies = self.companies.read().await;
        Ok(companies.values().filter(|c| c.user_id == user_id).count() as i64)
    }

    async fn sample_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Company>, RepositoryError> {
        let companies = self.companies.read().await;
        let mut sample: Vec<Company> =
            companies.values().filter(|c| c.user_id == user_id).cloned().collect();
        sample.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sample.truncate(limit as usize);
        Ok(sample)
    }
}

/// Company lookups for segment previews go through the shared company store,
/// so tests wire one `InMemoryCompanyRepository` into both repositories.
pub struct InMemoryContactRepository {
    contacts: RwLock<HashMap<String, Contact>>,
    companies: Arc<InMemoryCompanyRepository>,
}

impl InMemoryContactRepository {
    pub fn new(companies: Arc<InMemoryCompanyRepository>) -> Self {
        Self { contacts: RwLock::new(HashMap::new()), companies }
    }

    async fn to_member(&self, contact: Contact) -> SegmentMember {
        let company = match &contact.company_id {
            Some(id) => self.companies.companies.read().await.get(&id.0).cloned(),
            None => None,
        };
        SegmentMember { contact, company_name: company.map(|c| c.name) }
    }
}

impl Default for InMemoryContactRepository {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryCompanyRepository::default()))
    }
}

#[async_trait::async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, RepositoryError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.get(&id.0).cloned())
    }

    async fn find_by_email(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Contact>, RepositoryError> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .values()
            .find(|c| c.user_id == user_id && c.email == email)
            .cloned())
    }

    async fn save(&self, contact: Contact) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        contacts.insert(contact.id.0.clone(), contact);
        Ok(())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.values().filter(|c| c.user_id == user_id).count() as i64)
    }

    async fn sample_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SegmentMember>, RepositoryError> {
        let mut sample: Vec<Contact> = {
            let contacts = self.contacts.read().await;
            contacts.values().filter(|c| c.user_id == user_id).cloned().collect()
        };
        sample.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sample.truncate(limit as usize);

        let mut members = Vec::with_capacity(sample.len());
        for contact in sample {
            members.push(self.to_member(contact).await);
        }
        Ok(members)
    }

    async fn find_matching(
        &self,
        user_id: &str,
        filter: &SegmentFilter,
    ) -> Result<Vec<SegmentMember>, RepositoryError> {
        let mut candidates: Vec<Contact> = {
            let contacts = self.contacts.read().await;
            contacts.values().filter(|c| c.user_id == user_id).cloned().collect()
        };
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let companies = self.companies.companies.read().await;
        let mut members = Vec::new();
        for contact in candidates {
            let company = contact.company_id.as_ref().and_then(|id| companies.get(&id.0));
            if filter.matches(&contact, company) {
                let company_name = company.map(|c| c.name.clone());
                members.push(SegmentMember { contact, company_name });
            }
        }
        Ok(members)
    }
}

#[derive(Default)]
pub struct InMemoryCampaignRepository {
    campaigns: RwLock<HashMap<String, Campaign>>,
}

#[async_trait::async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        let campaigns = self.campaigns.read().await;
        Ok(campaigns.get(&id.0).cloned())
    }

    async fn save(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut campaigns = self.campaigns.write().await;
        campaigns.insert(campaign.id.0.clone(), campaign);
        Ok(())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let campaigns = self.campaigns.read().await;
        Ok(campaigns.values().filter(|c| c.user_id == user_id).count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryEmailLogRepository {
    logs: RwLock<HashMap<String, EmailLog>>,
}

#[async_trait::async_trait]
impl EmailLogRepository for InMemoryEmailLogRepository {
    async fn save(&self, log: EmailLog) -> Result<(), RepositoryError> {
        let mut logs = self.logs.write().await;
        logs.insert(log.id.0.clone(), log);
        Ok(())
    }

    async fn find_by_id(&self, id: &EmailLogId) -> Result<Option<EmailLog>, RepositoryError> {
        let logs = self.logs.read().await;
        Ok(logs.get(&id.0).cloned())
    }

    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<EmailLog>, RepositoryError> {
        let logs = self.logs.read().await;
        let mut matching: Vec<EmailLog> =
            logs.values().filter(|l| l.campaign_id == *campaign_id).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryActivityRepository {
    activities: RwLock<Vec<Activity>>,
}

#[async_trait::async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn record(&self, activity: Activity) -> Result<(), RepositoryError> {
        let mut activities = self.activities.write().await;
        activities.push(activity);
        Ok(())
    }

    async fn count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let activities = self.activities.read().await;
        Ok(activities
            .iter()
            .filter(|a| a.user_id == user_id && a.created_at >= since)
            .count() as i64)
    }

    async fn list_recent(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let activities = self.activities.read().await;
        let mut recent: Vec<Activity> =
            activities.iter().filter(|a| a.user_id == user_id).cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<String, EmailTemplate>>,
}

#[async_trait::async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.get(&id.0).cloned())
    }

    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError> {
        let mut templates = self.templates.write().await;
        templates.insert(template.id.0.clone(), template);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EmailTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        let mut listing: Vec<EmailTemplate> =
            templates.values().filter(|t| t.user_id == user_id).cloned().collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}

#[derive(Default)]
pub struct InMemoryOperationRepository {
    operations: RwLock<HashMap<(String, String), ApprovedOperation>>,
}

#[async_trait::async_trait]
impl OperationRepository for InMemoryOperationRepository {
    async fn find(
        &self,
        key: &OperationKey,
        user_id: &str,
    ) -> Result<Option<ApprovedOperation>, RepositoryError> {
        let operations = self.operations.read().await;
        Ok(operations.get(&(key.0.clone(), user_id.to_string())).cloned())
    }

    async fn save(&self, operation: ApprovedOperation) -> Result<(), RepositoryError> {
        let mut operations = self.operations.write().await;
        let slot = (operation.operation_key.0.clone(), operation.user_id.clone());
        operations.entry(slot).or_insert(operation);
        Ok(())
    }
}
