use serde::{Deserialize, Serialize};

// Body returned to admitted callers
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn running() -> Self {
        Self {
            message: "AI Security API is running".to_string(),
        }
    }
}

// Body returned with every denial
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}
