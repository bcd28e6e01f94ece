use chrono::{DateTime, Utc};
use sqlx::Row;

use relay_core::domain::activity::{Activity, ActivityId};

use super::company::parse_timestamp;
use super::{ActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> Result<Activity, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind: String = row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let detail: String =
        row.try_get("detail").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Activity {
        id: ActivityId(id),
        user_id,
        kind,
        detail,
        created_at: parse_timestamp(&created_at_str),
    })
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn record(&self, activity: Activity) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity (id, user_id, kind, detail, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&activity.id.0)
        .bind(&activity.user_id)
        .bind(&activity.kind)
        .bind(&activity.detail)
        .bind(activity.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_recent(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, kind, detail, created_at
             FROM activity WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_activity).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use relay_core::domain::activity::{Activity, ActivityId};

    use super::SqlActivityRepository;
    use crate::repositories::ActivityRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn activity_at(id: &str, created_at: chrono::DateTime<Utc>) -> Activity {
        Activity {
            id: ActivityId(id.to_string()),
            user_id: "user-1".to_string(),
            kind: "campaign_created".to_string(),
            detail: "Created campaign Launch".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn record_and_list_recent() {
        let pool = setup().await;
        let repo = SqlActivityRepository::new(pool);

        let now = Utc::now();
        repo.record(activity_at("act-1", now - Duration::minutes(5))).await.expect("record 1");
        repo.record(activity_at("act-2", now)).await.expect("record 2");

        let recent = repo.list_recent("user-1", 10).await.expect("list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id.0, "act-2");
    }

    #[tokio::test]
    async fn count_since_ignores_older_entries() {
        let pool = setup().await;
        let repo = SqlActivityRepository::new(pool);

        let now = Utc::now();
        repo.record(activity_at("act-1", now - Duration::days(10))).await.expect("record old");
        repo.record(activity_at("act-2", now - Duration::days(1))).await.expect("record new");

        let count = repo.count_since("user-1", now - Duration::days(7)).await.expect("count");
        assert_eq!(count, 1);
    }
}
