use chrono::{DateTime, Utc};
use sqlx::Row;

use relay_core::domain::campaign::{Campaign, CampaignId, CampaignStatus};

use super::company::parse_timestamp;
use super::{CampaignRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCampaignRepository {
    pool: DbPool,
}

impl SqlCampaignRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_campaign(row: &sqlx::sqlite::SqliteRow) -> Result<Campaign, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject: String =
        row.try_get("subject").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let html_content: String =
        row.try_get("html_content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let text_content: Option<String> =
        row.try_get("text_content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let scheduled_at_str: Option<String> =
        row.try_get("scheduled_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = CampaignStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown campaign status `{status_str}`"))
    })?;
    let scheduled_at = scheduled_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Campaign {
        id: CampaignId(id),
        user_id,
        name,
        subject,
        html_content,
        text_content,
        status,
        scheduled_at,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

#[async_trait::async_trait]
impl CampaignRepository for SqlCampaignRepository {
    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, subject, html_content, text_content, status,
                    scheduled_at, created_at, updated_at
             FROM campaign WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_campaign(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let scheduled_at_str = campaign.scheduled_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO campaign (id, user_id, name, subject, html_content, text_content,
                                   status, scheduled_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 subject = excluded.subject,
                 html_content = excluded.html_content,
                 text_content = excluded.text_content,
                 status = excluded.status,
                 scheduled_at = excluded.scheduled_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&campaign.id.0)
        .bind(&campaign.user_id)
        .bind(&campaign.name)
        .bind(&campaign.subject)
        .bind(&campaign.html_content)
        .bind(&campaign.text_content)
        .bind(campaign.status.as_str())
        .bind(&scheduled_at_str)
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaign WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
