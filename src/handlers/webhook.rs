use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::state::AppState;

const WEBHOOK_PATH: &str = "/webhook/whatsapp";

/// The fields of a Twilio WhatsApp webhook this service reads.
///
/// The raw parameter list is kept because the signature covers every
/// posted field, including the ones not listed here.
#[derive(Debug, Default)]
pub struct InboundWhatsApp {
    pub from: String,
    pub body: String,
    pub profile_name: Option<String>,
    pub message_sid: Option<String>,
}

impl InboundWhatsApp {
    pub fn from_params(params: &[(String, String)]) -> Self {
        let field = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            from: field("From").unwrap_or_default(),
            body: field("Body").unwrap_or_default(),
            profile_name: field("ProfileName"),
            message_sid: field("MessageSid"),
        }
    }
}

pub fn validate_twilio_signature(auth_token: &str, signature: &str, url: &str, params: &[(String, String)]) -> bool {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut data = url.to_string();
    for (key, value) in sorted {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    expected == signature
}

/// Public URL Twilio posted to, honouring proxy headers.
fn webhook_url(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}{WEBHOOK_PATH}")
}

pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    // An empty auth token means local development without Twilio.
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return (StatusCode::FORBIDDEN, "Missing signature").into_response();
        }

        let url = webhook_url(&headers);
        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!(url = %url, "invalid Twilio signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let inbound = InboundWhatsApp::from_params(&params);
    if inbound.from.is_empty() || inbound.body.is_empty() {
        tracing::debug!(sid = ?inbound.message_sid, "webhook without sender or text, ignoring");
        return twiml_response();
    }

    tracing::info!(
        from = %inbound.from,
        profile = inbound.profile_name.as_deref().unwrap_or("-"),
        sid = inbound.message_sid.as_deref().unwrap_or("-"),
        "incoming WhatsApp message"
    );

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator
            .handle_inbound(&inbound.from, &inbound.body, inbound.message_sid)
            .await;
    });

    twiml_response()
}

pub fn twiml_response() -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], "<Response></Response>").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn sign(token: &str, data: &str) -> String {
        let mut mac = Hmac::<Sha1>::new_from_slice(token.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_covers_sorted_params() {
        let url = "https://studio.example/webhook/whatsapp";
        let p = params(&[("From", "whatsapp:+5511999990000"), ("Body", "oi"), ("ProfileName", "Ana")]);
        let signature = sign("tok", &format!("{url}BodyoiFromwhatsapp:+5511999990000ProfileNameAna"));

        assert!(validate_twilio_signature("tok", &signature, url, &p));
        assert!(!validate_twilio_signature("other", &signature, url, &p));

        let tampered = params(&[("From", "whatsapp:+5511999990000"), ("Body", "tchau"), ("ProfileName", "Ana")]);
        assert!(!validate_twilio_signature("tok", &signature, url, &tampered));
    }

    #[test]
    fn test_inbound_fields() {
        let p = params(&[
            ("From", "whatsapp:+5511999990000"),
            ("Body", "  quero agendar  "),
            ("ProfileName", ""),
            ("MessageSid", "SM123"),
        ]);
        let inbound = InboundWhatsApp::from_params(&p);
        assert_eq!(inbound.from, "whatsapp:+5511999990000");
        assert_eq!(inbound.body, "quero agendar");
        assert_eq!(inbound.profile_name, None);
        assert_eq!(inbound.message_sid.as_deref(), Some("SM123"));
    }

    #[test]
    fn test_webhook_url_prefers_forwarded_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "internal:3000".parse().unwrap());
        headers.insert("x-forwarded-host", "studio.example".parse().unwrap());
        assert_eq!(webhook_url(&headers), "https://studio.example/webhook/whatsapp");
    }
}
