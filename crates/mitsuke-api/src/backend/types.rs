use serde::{Deserialize, Serialize};

use crate::traits::MalId;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// One entry of `GET /recs/me`.
#[derive(Debug, Deserialize)]
pub struct RecommendationItem {
    pub mal_id: MalId,
}

/// Message-only success body. Some endpoints answer with a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Object {
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

impl MessageBody {
    pub fn into_message(self, fallback: &str) -> String {
        match self {
            Self::Object { message: Some(m) } | Self::Text(m) if !m.is_empty() => m,
            _ => fallback.to_string(),
        }
    }
}
