pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;

    async fn set_typing(&self, _to: &str, _on: bool) -> anyhow::Result<()> {
        Ok(())
    }

    /// Remember the transport id of the latest inbound message from `from`.
    fn remember_inbound(&self, _from: &str, _message_ref: &str) {}
}

/// The same recipient written the other way round, if there is one.
///
/// A number missing its `+` gains one; otherwise the `whatsapp:` prefix is
/// toggled.
pub fn alternate_recipient(to: &str) -> Option<String> {
    let to = to.trim();
    if let Some(bare) = to.strip_prefix("whatsapp:") {
        if is_digits(bare) {
            return Some(format!("whatsapp:+{bare}"));
        }
        return Some(bare.to_string());
    }
    if to.starts_with('+') {
        return Some(format!("whatsapp:{to}"));
    }
    if is_digits(to) {
        return Some(format!("+{to}"));
    }
    None
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Send `body`, retrying once with the alternate recipient format.
///
/// Failures are logged and reported as `false`; they never propagate.
pub async fn deliver_text(provider: &dyn MessagingProvider, to: &str, body: &str) -> bool {
    let err = match provider.send_message(to, body).await {
        Ok(()) => return true,
        Err(e) => e,
    };

    let Some(alternate) = alternate_recipient(to) else {
        tracing::error!(user = %to, error = %err, "failed to send message");
        return false;
    };

    tracing::warn!(user = %to, alternate = %alternate, error = %err, "send failed, retrying with alternate recipient");
    match provider.send_message(&alternate, body).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(user = %to, error = %e, "failed to send message");
            false
        }
    }
}

/// Typing indicator failures are logged and otherwise ignored.
pub async fn typing_indicator(provider: &dyn MessagingProvider, to: &str, on: bool) {
    if let Err(e) = provider.set_typing(to, on).await {
        tracing::warn!(user = %to, on, error = %e, "failed to set typing indicator");
    }
}
