use sqlx::Row;

use relay_core::domain::operation::{ApprovedOperation, OperationKey};

use super::company::parse_timestamp;
use super::{OperationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOperationRepository {
    pool: DbPool,
}

impl SqlOperationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_operation(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovedOperation, RepositoryError> {
    let operation_key: String =
        row.try_get("operation_key").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action: String =
        row.try_get("action").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let payload_hash: String =
        row.try_get("payload_hash").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let success: i64 =
        row.try_get("success").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let result_json: String =
        row.try_get("result_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let executed_at_str: String =
        row.try_get("executed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApprovedOperation {
        operation_key: OperationKey(operation_key),
        user_id,
        action,
        payload_hash,
        success: success != 0,
        result_json,
        executed_at: parse_timestamp(&executed_at_str),
    })
}

#[async_trait::async_trait]
impl OperationRepository for SqlOperationRepository {
    async fn find(
        &self,
        key: &OperationKey,
        user_id: &str,
    ) -> Result<Option<ApprovedOperation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT operation_key, user_id, action, payload_hash, success, result_json, executed_at
             FROM approved_operation WHERE operation_key = ? AND user_id = ?",
        )
        .bind(&key.0)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_operation(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, operation: ApprovedOperation) -> Result<(), RepositoryError> {
        // First outcome wins; a replayed submission must not overwrite it.
        sqlx::query(
            "INSERT INTO approved_operation
                 (operation_key, user_id, action, payload_hash, success, result_json, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(operation_key, user_id) DO NOTHING",
        )
        .bind(&operation.operation_key.0)
        .bind(&operation.user_id)
        .bind(&operation.action)
        .bind(&operation.payload_hash)
        .bind(operation.success as i64)
        .bind(&operation.result_json)
        .bind(operation.executed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
