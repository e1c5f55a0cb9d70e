use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemHealth {
    pub catalog_online: bool,
    pub discovery_online: bool,
    pub remote_shell_ready: bool,
}

/// Outcome of deleting one remote playlist file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileDeletion {
    pub path: String,
    pub error: Option<String>,
}

impl FileDeletion {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
