use serde::{Deserialize, Serialize};

/// JWT payload carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub email: String,
    #[serde(rename = "userID", default)]
    pub user_id: String,
    /// Issued-at, unix seconds. Optional on the way in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64, // expires at (unix seconds)
}
