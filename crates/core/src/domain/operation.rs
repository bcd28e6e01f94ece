use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey(pub String);

/// Outcome snapshot for an executed approval. A repeated submission with the
/// same key replays `result_json` instead of re-running the action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovedOperation {
    pub operation_key: OperationKey,
    pub user_id: String,
    pub action: String,
    pub payload_hash: String,
    pub success: bool,
    pub result_json: String,
    pub executed_at: DateTime<Utc>,
}
