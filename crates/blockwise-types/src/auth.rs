use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Only plain learners are kept out of the authoring surface; the backend
    /// enforces the rest.
    pub fn can_author(self) -> bool {
        !matches!(self, Role::User)
    }
}

/// Backend timestamps arrive either as epoch milliseconds or as RFC 3339 text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            WireTimestamp::Text(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SignInResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<WireTimestamp>,
    #[serde(default)]
    pub issued_at: Option<WireTimestamp>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for user_id, got {other}"
        ))),
    }
}
