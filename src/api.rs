use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenPayload {
    pub long_url: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShortenedUrl {
    pub short_url: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListedUrl {
    pub id: String,
    pub short_id: String,
    pub long_url: String,
    /// Timestamp in RFC 3339 format
    pub created_at: String,
    pub short_url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
}

impl Error {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_id: None,
        }
    }
}
