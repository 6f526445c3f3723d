//! Runtime settings injected into the use cases.

use std::time::Duration;

/// Settings shared by the chat use cases.
///
/// Built once by the binary from command-line options; nothing in the crate
/// reads configuration globally.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Upper bound on each external-store call made by `join`, `send` and history reads.
    pub store_timeout: Duration,
    /// Messages returned by `join` and by history reads without an explicit limit.
    pub history_page_size: usize,
    /// Clamp for client-supplied limits.
    pub max_history_page_size: usize,
    /// Prefix that turns an attachment storage key into a fetchable URL.
    pub attachment_base_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(3),
            history_page_size: 50,
            max_history_page_size: 200,
            attachment_base_url: "http://localhost:9000/attachments".to_string(),
        }
    }
}
