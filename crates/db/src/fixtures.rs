use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_COMPANY_IDS: &[&str] = &["co-demo-001", "co-demo-002", "co-demo-003"];

const SEED_CONTACT_IDS: &[&str] =
    &["ct-demo-001", "ct-demo-002", "ct-demo-003", "ct-demo-004", "ct-demo-005"];

const SEED_CAMPAIGN_ID: &str = "cmp-demo-001";
const SEED_TEMPLATE_ID: &str = "tpl-demo-001";
const SEED_USER_ID: &str = "demo-user";

/// Deterministic demo dataset for local development and smoke checks.
///
/// Seeds a small CRM for the `demo-user` account: three companies across
/// distinct industries, five contacts, one draft campaign, and one
/// email template.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// SQL fixture content for the demo seed data.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset into the database.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            user_id: SEED_USER_ID,
            companies: SEED_COMPANY_IDS.len(),
            contacts: SEED_CONTACT_IDS.len(),
            campaigns: 1,
            templates: 1,
        })
    }

    /// Verify that the seed data exists and matches the expected shape.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_companies = sql_array_from_ids(SEED_COMPANY_IDS);
        let company_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM company WHERE id IN {quoted_companies}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("companies", company_count == SEED_COMPANY_IDS.len() as i64));

        let quoted_contacts = sql_array_from_ids(SEED_CONTACT_IDS);
        let contact_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM contact WHERE id IN {quoted_contacts}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("contacts", contact_count == SEED_CONTACT_IDS.len() as i64));

        let draft_campaign: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM campaign WHERE id = ?1 AND status = 'DRAFT')",
        )
        .bind(SEED_CAMPAIGN_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("draft-campaign", draft_campaign == 1));

        let template_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM email_template WHERE id = ?1)")
                .bind(SEED_TEMPLATE_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("welcome-template", template_exists == 1));

        let orphaned_contacts: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM contact c
             WHERE c.company_id IS NOT NULL
               AND NOT EXISTS(SELECT 1 FROM company co WHERE co.id = c.company_id)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("contact-company-links", orphaned_contacts == 0));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub user_id: &'static str,
    pub companies: usize,
    pub contacts: usize,
    pub campaigns: usize,
    pub templates: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
