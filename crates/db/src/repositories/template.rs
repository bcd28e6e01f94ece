use sqlx::Row;

use relay_core::domain::template::{EmailTemplate, EmailTemplateId};

use super::company::parse_timestamp;
use super::{RepositoryError, TemplateRepository};
use crate::DbPool;

pub struct SqlTemplateRepository {
    pool: DbPool,
}

impl SqlTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<EmailTemplate, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject: String =
        row.try_get("subject").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let html_body: String =
        row.try_get("html_body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(EmailTemplate {
        id: EmailTemplateId(id),
        user_id,
        name,
        subject,
        html_body,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

#[async_trait::async_trait]
impl TemplateRepository for SqlTemplateRepository {
    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, subject, html_body, created_at, updated_at
             FROM email_template WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_template(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_template (id, user_id, name, subject, html_body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 subject = excluded.subject,
                 html_body = excluded.html_body,
                 updated_at = excluded.updated_at",
        )
        .bind(&template.id.0)
        .bind(&template.user_id)
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.html_body)
        .bind(template.created_at.to_rfc3339())
        .bind(template.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EmailTemplate>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, name, subject, html_body, created_at, updated_at
             FROM email_template WHERE user_id = ? ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_template).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use relay_core::domain::template::{EmailTemplate, EmailTemplateId};

    use super::SqlTemplateRepository;
    use crate::repositories::TemplateRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_template(id: &str, name: &str) -> EmailTemplate {
        let now = Utc::now();
        EmailTemplate {
            id: EmailTemplateId(id.to_string()),
            user_id: "user-1".to_string(),
            name: name.to_string(),
            subject: "Welcome, {{ first_name }}".to_string(),
            html_body: "<p>Hi {{ first_name }}</p>".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips() {
        let pool = setup().await;
        let repo = SqlTemplateRepository::new(pool);

        repo.save(sample_template("tpl-1", "Welcome")).await.expect("save");

        let found = repo
            .find_by_id(&EmailTemplateId("tpl-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.name, "Welcome");
        assert!(found.html_body.contains("{{ first_name }}"));
    }

    #[tokio::test]
    async fn list_for_user_orders_by_name() {
        let pool = setup().await;
        let repo = SqlTemplateRepository::new(pool);

        repo.save(sample_template("tpl-2", "Winback")).await.expect("save 1");
        repo.save(sample_template("tpl-1", "Welcome")).await.expect("save 2");

        let mut other = sample_template("tpl-3", "Other");
        other.user_id = "user-2".to_string();
        repo.save(other).await.expect("save 3");

        let templates = repo.list_for_user("user-1").await.expect("list");
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "Welcome");
        assert_eq!(templates[1].name, "Winback");
    }
}
