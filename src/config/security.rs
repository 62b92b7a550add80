//! Security and authentication settings.

use super::defaults::{default_auth_secret, default_cors_origins};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins: "*" or a comma-separated list
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// HMAC secret for session token verification
    #[serde(default = "default_auth_secret")]
    pub auth_secret: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            auth_secret: default_auth_secret(),
        }
    }
}
