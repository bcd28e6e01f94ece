use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use relay_db::repositories::{
    ActivityRepository, CampaignRepository, CompanyRepository, ContactRepository, SegmentMember,
};

const SAMPLE_SIZE: u32 = 10;
const RECENT_ACTIVITY_DAYS: i64 = 7;

/// Point-in-time view of a user's CRM, folded into the system prompt so the
/// model grounds its answers in real counts instead of guessing.
#[derive(Debug, Default)]
pub struct CrmSnapshot {
    pub contact_count: i64,
    pub company_count: i64,
    pub campaign_count: i64,
    pub recent_activity_count: i64,
    pub contact_sample: Vec<SegmentMember>,
    pub industries: Vec<String>,
}

pub struct SnapshotLoader {
    contacts: Arc<dyn ContactRepository>,
    companies: Arc<dyn CompanyRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    activities: Arc<dyn ActivityRepository>,
}

impl SnapshotLoader {
    pub fn new(
        contacts: Arc<dyn ContactRepository>,
        companies: Arc<dyn CompanyRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        activities: Arc<dyn ActivityRepository>,
    ) -> Self {
        Self { contacts, companies, campaigns, activities }
    }

    /// Loads the snapshot, degrading to an empty view on failure so a broken
    /// query never blocks the conversation.
    pub async fn load(&self, user_id: &str) -> CrmSnapshot {
        match self.try_load(user_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    event_name = "agent.snapshot.degraded",
                    %user_id,
                    error = %error,
                    "CRM snapshot unavailable, continuing without context"
                );
                CrmSnapshot::default()
            }
        }
    }

    async fn try_load(
        &self,
        user_id: &str,
    ) -> Result<CrmSnapshot, relay_db::repositories::RepositoryError> {
        let since = Utc::now() - Duration::days(RECENT_ACTIVITY_DAYS);

        let (contact_count, company_count, campaign_count, recent_activity_count) = tokio::try_join!(
            self.contacts.count_for_user(user_id),
            self.companies.count_for_user(user_id),
            self.campaigns.count_for_user(user_id),
            self.activities.count_since(user_id, since),
        )?;

        let (contact_sample, company_sample) = tokio::try_join!(
            self.contacts.sample_for_user(user_id, SAMPLE_SIZE),
            self.companies.sample_for_user(user_id, SAMPLE_SIZE),
        )?;

        let mut industries: Vec<String> =
            company_sample.into_iter().filter_map(|company| company.industry).collect();
        industries.sort();
        industries.dedup();
        industries.truncate(5);

        Ok(CrmSnapshot {
            contact_count,
            company_count,
            campaign_count,
            recent_activity_count,
            contact_sample,
            industries,
        })
    }
}
