use sqlx::Row;

use relay_core::domain::company::CompanyId;
use relay_core::domain::contact::{Contact, ContactId};
use relay_core::domain::segment::SegmentFilter;

use super::company::parse_timestamp;
use super::{ContactRepository, RepositoryError, SegmentMember};
use crate::DbPool;

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<Contact, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_id: Option<String> =
        row.try_get("company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let first_name: String =
        row.try_get("first_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_name: String =
        row.try_get("last_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: Option<String> =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: Option<String> =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Contact {
        id: ContactId(id),
        user_id,
        company_id: company_id.map(CompanyId),
        first_name,
        last_name,
        email,
        title,
        location,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<SegmentMember, RepositoryError> {
    let company_name: Option<String> =
        row.try_get("company_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(SegmentMember { contact: row_to_contact(row)?, company_name })
}

const MEMBER_SELECT: &str = "SELECT c.id, c.user_id, c.company_id, c.first_name, c.last_name,
            c.email, c.title, c.location, c.created_at, c.updated_at,
            co.name AS company_name
     FROM contact c
     LEFT JOIN company co ON co.id = c.company_id";

#[async_trait::async_trait]
impl ContactRepository for SqlContactRepository {
    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, company_id, first_name, last_name, email, title, location,
                    created_at, updated_at
             FROM contact WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_contact(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, company_id, first_name, last_name, email, title, location,
                    created_at, updated_at
             FROM contact WHERE user_id = ? AND email = ?",
        )
        .bind(user_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_contact(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, contact: Contact) -> Result<(), RepositoryError> {
        let company_id = contact.company_id.as_ref().map(|id| id.0.clone());

        sqlx::query(
            "INSERT INTO contact (id, user_id, company_id, first_name, last_name, email,
                                  title, location, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 company_id = excluded.company_id,
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 email = excluded.email,
                 title = excluded.title,
                 location = excluded.location,
                 updated_at = excluded.updated_at",
        )
        .bind(&contact.id.0)
        .bind(&contact.user_id)
        .bind(&company_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.title)
        .bind(&contact.location)
        .bind(contact.created_at.to_rfc3339())
        .bind(contact.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contact WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn sample_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SegmentMember>, RepositoryError> {
        let sql = format!("{MEMBER_SELECT} WHERE c.user_id = ? ORDER BY c.created_at DESC LIMIT ?");
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&sql).bind(user_id).bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_member).collect::<Result<Vec<_>, _>>()
    }

    async fn find_matching(
        &self,
        user_id: &str,
        filter: &SegmentFilter,
    ) -> Result<Vec<SegmentMember>, RepositoryError> {
        let sql = format!(
            "{MEMBER_SELECT}
             WHERE c.user_id = ?
               AND (? IS NULL OR co.industry = ?)
               AND (? IS NULL OR LOWER(IFNULL(c.title, '')) LIKE '%' || LOWER(?) || '%')
               AND (? IS NULL OR LOWER(IFNULL(c.location, '')) LIKE '%' || LOWER(?) || '%')
             ORDER BY c.created_at DESC"
        );

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&sql)
            .bind(user_id)
            .bind(&filter.industry)
            .bind(&filter.industry)
            .bind(&filter.title_contains)
            .bind(&filter.title_contains)
            .bind(&filter.location_contains)
            .bind(&filter.location_contains)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_member).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use relay_core::domain::company::{Company, CompanyId};
    use relay_core::domain::contact::{Contact, ContactId};
    use relay_core::domain::segment::SegmentFilter;

    use super::SqlContactRepository;
    use crate::repositories::{CompanyRepository, ContactRepository, SqlCompanyRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_company(pool: &sqlx::SqlitePool, id: &str, industry: &str) {
        let repo = SqlCompanyRepository::new(pool.clone());
        let now = Utc::now();
        repo.save(Company {
            id: CompanyId(id.to_string()),
            user_id: "user-1".to_string(),
            name: format!("Company {id}"),
            industry: Some(industry.to_string()),
            website: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert company");
    }

    fn sample_contact(id: &str, company_id: Option<&str>) -> Contact {
        let now = Utc::now();
        Contact {
            id: ContactId(id.to_string()),
            user_id: "user-1".to_string(),
            company_id: company_id.map(|value| CompanyId(value.to_string())),
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            email: format!("{id}@example.com"),
            title: Some("Engineer".to_string()),
            location: Some("Berlin".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        insert_company(&pool, "co-1", "Software").await;

        let repo = SqlContactRepository::new(pool);
        let contact = sample_contact("ct-1", Some("co-1"));
        repo.save(contact.clone()).await.expect("save");

        let found = repo.find_by_id(&ContactId("ct-1".to_string())).await.expect("find");
        let found = found.expect("should exist");

        assert_eq!(found.email, contact.email);
        assert_eq!(found.company_id, Some(CompanyId("co-1".to_string())));
    }

    #[tokio::test]
    async fn find_by_email_is_scoped_to_the_user() {
        let pool = setup().await;
        let repo = SqlContactRepository::new(pool);

        repo.save(sample_contact("ct-1", None)).await.expect("save");

        let found = repo
            .find_by_email("user-1", "ct-1@example.com")
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.id.0, "ct-1");

        let foreign = repo.find_by_email("user-2", "ct-1@example.com").await.expect("find");
        assert!(foreign.is_none());
    }

    #[tokio::test]
    async fn find_matching_filters_by_industry_title_and_location() {
        let pool = setup().await;
        insert_company(&pool, "co-soft", "Software").await;
        insert_company(&pool, "co-retail", "Retail").await;

        let repo = SqlContactRepository::new(pool);

        let mut engineer = sample_contact("ct-1", Some("co-soft"));
        engineer.title = Some("Senior Engineer".to_string());
        repo.save(engineer).await.expect("save 1");

        let mut designer = sample_contact("ct-2", Some("co-soft"));
        designer.title = Some("Designer".to_string());
        repo.save(designer).await.expect("save 2");

        let mut retail = sample_contact("ct-3", Some("co-retail"));
        retail.title = Some("Engineer".to_string());
        repo.save(retail).await.expect("save 3");

        let filter = SegmentFilter {
            industry: Some("Software".to_string()),
            title_contains: Some("engineer".to_string()),
            ..SegmentFilter::default()
        };
        let members = repo.find_matching("user-1", &filter).await.expect("query");

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].contact.id.0, "ct-1");
        assert_eq!(members[0].company_name.as_deref(), Some("Company co-soft"));
    }

    #[tokio::test]
    async fn empty_filter_matches_all_user_contacts() {
        let pool = setup().await;
        let repo = SqlContactRepository::new(pool);

        repo.save(sample_contact("ct-1", None)).await.expect("save 1");
        repo.save(sample_contact("ct-2", None)).await.expect("save 2");

        let members =
            repo.find_matching("user-1", &SegmentFilter::default()).await.expect("query");
        assert_eq!(members.len(), 2);

        let none = repo.find_matching("user-2", &SegmentFilter::default()).await.expect("query");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn location_filter_is_case_insensitive_substring() {
        let pool = setup().await;
        let repo = SqlContactRepository::new(pool);

        let mut berlin = sample_contact("ct-1", None);
        berlin.location = Some("Berlin, DE".to_string());
        repo.save(berlin).await.expect("save 1");

        let mut remote = sample_contact("ct-2", None);
        remote.location = None;
        repo.save(remote).await.expect("save 2");

        let filter = SegmentFilter {
            location_contains: Some("berlin".to_string()),
            ..SegmentFilter::default()
        };
        let members = repo.find_matching("user-1", &filter).await.expect("query");

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].contact.id.0, "ct-1");
    }
}
