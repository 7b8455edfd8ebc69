use serde::{Deserialize, Serialize};

/// Someone else currently composing in the same request. Expiry is server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPeer {
    pub actor_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LivenessResponse {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub typing: Vec<TypingPeer>,
}
