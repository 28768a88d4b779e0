use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mailer
///
/// Outbound mail used by magic-link sign-in. The trait keeps delivery swappable:
/// the default implementation only logs, and tests record what was sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_magic_link(&self, to: &str, link: &str) -> Result<(), String>;
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;

/// LogMailer
///
/// Writes the magic link to the structured log instead of sending it. Enough for
/// local development, where the link is copied from the console.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_magic_link(&self, to: &str, link: &str) -> Result<(), String> {
        tracing::info!(from = %self.from, to = %to, "magic sign-in link: {}", link);
        Ok(())
    }
}

/// MockMailer
///
/// Records every message for assertions. `should_fail` simulates a delivery error.
#[derive(Default)]
pub struct MockMailer {
    pub should_fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// `(recipient, link)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_magic_link(&self, to: &str, link: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock mail delivery failure".to_string());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), link.to_string()));
        }
        Ok(())
    }
}
