use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action proposal the assistant wants a human to approve before execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalData {
    pub action: String,
    #[serde(default)]
    pub details: Value,
}

/// Structured reply recovered from the model's free-form text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResponse {
    pub message: String,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_data: Option<ApprovalData>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    pub completed: bool,
}

impl OrchestrationResponse {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_approval: false,
            approval_data: None,
            suggested_actions: Vec::new(),
            completed: false,
        }
    }
}

/// Extracts the trailing control JSON from a model reply.
///
/// The model is instructed to end its reply with a JSON object, but it often
/// wraps it in prose, emits several blocks, or produces a malformed draft
/// before the real one. Candidate blocks are scanned with a balanced-brace
/// walk (string literals respected) and tried from the last backward; the
/// first block carrying a `message` or `requiresApproval` key wins. This
/// never fails: with no usable block the whole reply becomes a plain message.
pub fn parse_reply(raw: &str) -> OrchestrationResponse {
    let blocks = scan_json_blocks(raw);

    for range in blocks.iter().rev() {
        let candidate = &raw[range.clone()];
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if !fields.contains_key("message") && !fields.contains_key("requiresApproval") {
            continue;
        }

        let embedded = fields.get("message").and_then(Value::as_str).unwrap_or_default();
        let message = clean_message(embedded, raw);
        let requires_approval =
            fields.get("requiresApproval").and_then(Value::as_bool).unwrap_or(false);
        let approval_data = fields
            .get("approvalData")
            .cloned()
            .and_then(|value| serde_json::from_value::<ApprovalData>(value).ok());
        let suggested_actions = fields
            .get("suggestedActions")
            .and_then(Value::as_array)
            .map(|entries| {
                entries.iter().filter_map(Value::as_str).map(str::to_string).collect()
            })
            .unwrap_or_default();
        let completed = fields.get("completed").and_then(Value::as_bool).unwrap_or(false);

        return OrchestrationResponse {
            message,
            requires_approval,
            approval_data,
            suggested_actions,
            completed,
        };
    }

    OrchestrationResponse::plain(raw.trim())
}

/// Human-readable text for the chat transcript. The extracted `message`
/// field sometimes still embeds JSON; strip it, and fall back to the prose
/// before the first brace of the raw reply, then to the raw reply itself.
fn clean_message(embedded: &str, raw: &str) -> String {
    let stripped = strip_json_blocks(embedded);
    let stripped = stripped.trim();
    if !stripped.is_empty() {
        return stripped.to_string();
    }

    let prefix = raw.split('{').next().unwrap_or_default().trim();
    if !prefix.is_empty() {
        return prefix.to_string();
    }

    raw.trim().to_string()
}

fn strip_json_blocks(text: &str) -> String {
    let blocks = scan_json_blocks(text);
    if blocks.is_empty() {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in blocks {
        output.push_str(&text[cursor..range.start]);
        cursor = range.end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Byte ranges of every top-level balanced `{...}` block in `text`.
///
/// Tracks string-literal and escape state so braces inside quoted values do
/// not open or close blocks. An unterminated block is dropped.
fn scan_json_blocks(text: &str) -> Vec<std::ops::Range<usize>> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut block_start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '{' => {
                if depth == 0 {
                    block_start = index;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(block_start..index + ch.len_utf8());
                }
            }
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }

    blocks
}
