use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub admin_phone: String,
    pub business_name: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    pub utc_offset_hours: i32,
    pub session_duration_minutes: i64,
    pub pacing: PacingConfig,
}

/// Timing knobs for batching inbound messages and pacing outbound ones.
#[derive(Clone, Debug)]
pub struct PacingConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub typing_reset_delay: Duration,
    pub typing_window: Duration,
    pub rapid_threshold: Duration,
    pub confirmation_timeout: Duration,
    pub segment_max_len: usize,
    pub typing_min: Duration,
    pub typing_max: Duration,
    pub typing_ms_per_char: u64,
    pub gap_min: Duration,
    pub gap_max: Duration,
    pub reply_timeout: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(10),
            typing_reset_delay: Duration::from_secs(1),
            typing_window: Duration::from_secs(2),
            rapid_threshold: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(30),
            segment_max_len: 300,
            typing_min: Duration::from_secs(2),
            typing_max: Duration::from_secs(10),
            typing_ms_per_char: 40,
            gap_min: Duration::from_millis(1500),
            gap_max: Duration::from_millis(2500),
            reply_timeout: Duration::from_secs(30),
        }
    }
}

impl PacingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_delay: env_millis("DEBOUNCE_BASE_MS").unwrap_or(defaults.base_delay),
            max_delay: env_millis("DEBOUNCE_MAX_MS").unwrap_or(defaults.max_delay),
            typing_reset_delay: env_millis("TYPING_RESET_MS")
                .unwrap_or(defaults.typing_reset_delay),
            confirmation_timeout: env_millis("CONFIRMATION_TIMEOUT_MS")
                .unwrap_or(defaults.confirmation_timeout),
            segment_max_len: env::var("SEGMENT_MAX_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.segment_max_len),
            ..defaults
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "lensbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            admin_phone: env::var("ADMIN_PHONE").unwrap_or_default(),
            business_name: env::var("BUSINESS_NAME")
                .unwrap_or_else(|_| "Estúdio Fotográfico".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_whatsapp_number: env::var("TWILIO_WHATSAPP_NUMBER").unwrap_or_default(),
            utc_offset_hours: env::var("UTC_OFFSET_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(-3),
            session_duration_minutes: env::var("SESSION_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            pacing: PacingConfig::from_env(),
        }
    }

    /// The identity whose messages drive the intervention pause.
    pub fn admin_id(&self) -> Option<&str> {
        let phone = self.admin_phone.trim();
        if phone.is_empty() {
            None
        } else {
            Some(phone)
        }
    }

    pub fn utc_offset(&self) -> chrono::FixedOffset {
        use chrono::Offset;

        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| chrono::Utc.fix())
    }
}
