use chrono::{DateTime, Utc};
use sqlx::Row;

use relay_core::domain::campaign::CampaignId;
use relay_core::domain::contact::ContactId;
use relay_core::domain::email_log::{EmailLog, EmailLogId, EmailLogStatus};

use super::company::parse_timestamp;
use super::{EmailLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEmailLogRepository {
    pool: DbPool,
}

impl SqlEmailLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_email_log(row: &sqlx::sqlite::SqliteRow) -> Result<EmailLog, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let campaign_id: String =
        row.try_get("campaign_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contact_id: String =
        row.try_get("contact_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let error: Option<String> =
        row.try_get("error").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sent_at_str: Option<String> =
        row.try_get("sent_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = EmailLogStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown email log status `{status_str}`"))
    })?;
    let sent_at = sent_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(EmailLog {
        id: EmailLogId(id),
        campaign_id: CampaignId(campaign_id),
        contact_id: ContactId(contact_id),
        status,
        error,
        sent_at,
        created_at: parse_timestamp(&created_at_str),
    })
}

#[async_trait::async_trait]
impl EmailLogRepository for SqlEmailLogRepository {
    async fn save(&self, log: EmailLog) -> Result<(), RepositoryError> {
        let sent_at_str = log.sent_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO email_log (id, campaign_id, contact_id, status, error, sent_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 error = excluded.error,
                 sent_at = excluded.sent_at",
        )
        .bind(&log.id.0)
        .bind(&log.campaign_id.0)
        .bind(&log.contact_id.0)
        .bind(log.status.as_str())
        .bind(&log.error)
        .bind(&sent_at_str)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &EmailLogId) -> Result<Option<EmailLog>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, campaign_id, contact_id, status, error, sent_at, created_at
             FROM email_log WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_email_log(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<EmailLog>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, campaign_id, contact_id, status, error, sent_at, created_at
             FROM email_log WHERE campaign_id = ? ORDER BY created_at",
        )
        .bind(&campaign_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_email_log).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use relay_core::domain::campaign::{Campaign, CampaignId, CampaignStatus};
    use relay_core::domain::contact::{Contact, ContactId};
    use relay_core::domain::email_log::{EmailLog, EmailLogId, EmailLogStatus};

    use super::SqlEmailLogRepository;
    use crate::repositories::{
        CampaignRepository, ContactRepository, EmailLogRepository, SqlCampaignRepository,
        SqlContactRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        // Foreign keys are enforced, so logs need a campaign and contact.
        let now = Utc::now();
        SqlCampaignRepository::new(pool.clone())
            .save(Campaign {
                id: CampaignId("cmp-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Launch".to_string(),
                subject: "Hello".to_string(),
                html_content: "<p>Hi</p>".to_string(),
                text_content: None,
                status: CampaignStatus::Draft,
                scheduled_at: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("insert campaign");
        SqlContactRepository::new(pool.clone())
            .save(Contact {
                id: ContactId("ct-1".to_string()),
                user_id: "user-1".to_string(),
                company_id: None,
                first_name: "Dana".to_string(),
                last_name: "Reyes".to_string(),
                email: "dana@example.com".to_string(),
                title: None,
                location: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("insert contact");

        pool
    }

    fn pending_log(id: &str) -> EmailLog {
        EmailLog {
            id: EmailLogId(id.to_string()),
            campaign_id: CampaignId("cmp-1".to_string()),
            contact_id: ContactId("ct-1".to_string()),
            status: EmailLogStatus::Pending,
            error: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips() {
        let pool = setup().await;
        let repo = SqlEmailLogRepository::new(pool);

        repo.save(pending_log("log-1")).await.expect("save");

        let found = repo
            .find_by_id(&EmailLogId("log-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.status, EmailLogStatus::Pending);
        assert!(found.sent_at.is_none());
    }

    #[tokio::test]
    async fn save_updates_status_on_conflict() {
        let pool = setup().await;
        let repo = SqlEmailLogRepository::new(pool);

        let log = pending_log("log-1");
        repo.save(log.clone()).await.expect("save");

        let mut failed = log;
        failed.status = EmailLogStatus::Failed;
        failed.error = Some("mailbox unavailable".to_string());
        repo.save(failed).await.expect("upsert");

        let found = repo.find_by_id(&EmailLogId("log-1".to_string())).await.expect("find");
        let found = found.expect("should exist");
        assert_eq!(found.status, EmailLogStatus::Failed);
        assert_eq!(found.error.as_deref(), Some("mailbox unavailable"));
    }

    #[tokio::test]
    async fn list_for_campaign_returns_all_logs() {
        let pool = setup().await;
        let repo = SqlEmailLogRepository::new(pool);

        repo.save(pending_log("log-1")).await.expect("save 1");
        repo.save(pending_log("log-2")).await.expect("save 2");

        let logs =
            repo.list_for_campaign(&CampaignId("cmp-1".to_string())).await.expect("list");
        assert_eq!(logs.len(), 2);
    }
}
