use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Greeting,
    Farewell,
    Thanks,
    Confirmation,
    Rejection,
    Schedule,
    Reschedule,
    Cancel,
    List,
    Confusion,
}

/// Output of the keyword classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub main_intent: Option<Intent>,
    pub confidence: f32,
    /// Name of the rule that matched, if any.
    pub context: Option<&'static str>,
}

impl Classification {
    pub fn none() -> Self {
        Self {
            main_intent: None,
            confidence: 0.0,
            context: None,
        }
    }

    pub fn is(&self, intent: Intent, min_confidence: f32) -> bool {
        self.main_intent == Some(intent) && self.confidence >= min_confidence
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationIntent {
    Confirmation,
    Rejection,
    Confusion,
}

/// Output of the AI-backed yes/no classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationVerdict {
    #[serde(rename = "intent")]
    pub main_intent: ConfirmationIntent,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}
