use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub content: String,
    pub timestamp: Instant,
    /// Transport reference of the inbound message (Twilio MessageSid).
    pub raw_ref: Option<String>,
}
