use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;

use super::MessagingProvider;

/// Twilio Messages API over the WhatsApp channel.
pub struct TwilioWhatsAppProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
    last_inbound: Mutex<HashMap<String, String>>,
}

impl TwilioWhatsAppProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number: whatsapp_address(&from_number),
            client: reqwest::Client::new(),
            last_inbound: Mutex::new(HashMap::new()),
        }
    }
}

pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

fn bare(number: &str) -> &str {
    number.trim().strip_prefix("whatsapp:").unwrap_or(number.trim())
}

#[async_trait]
impl MessagingProvider for TwilioWhatsAppProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        // Alternate-format retries arrive without the prefix
        let to = if to.starts_with("whatsapp:") {
            to.to_string()
        } else {
            whatsapp_address(to)
        };

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .context("failed to send Twilio WhatsApp message")?
            .error_for_status()
            .context("Twilio API returned error")?;

        Ok(())
    }

    async fn set_typing(&self, to: &str, on: bool) -> anyhow::Result<()> {
        // The indicator clears itself when the next message goes out
        if !on {
            return Ok(());
        }
        let message_id = {
            let last = self.last_inbound.lock().unwrap_or_else(|e| e.into_inner());
            last.get(bare(to)).cloned()
        };
        let Some(message_id) = message_id else {
            return Ok(());
        };

        self.client
            .post("https://messaging.twilio.com/v2/Indicators/Typing.json")
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("messageId", message_id.as_str()), ("channel", "whatsapp")])
            .send()
            .await
            .context("failed to call Twilio typing indicator")?
            .error_for_status()
            .context("Twilio typing indicator returned error")?;

        Ok(())
    }

    fn remember_inbound(&self, from: &str, message_ref: &str) {
        self.last_inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(bare(from).to_string(), message_ref.to_string());
    }
}
