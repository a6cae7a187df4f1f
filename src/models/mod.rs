pub mod conversation;
pub mod event;
pub mod intent;
pub mod pending;
pub mod queue;

pub use conversation::{ConversationMessage, ConversationState, DialogState, StateTransition};
pub use event::{CalendarEvent, EventPatch, NewEvent};
pub use intent::{Classification, ConfirmationIntent, ConfirmationVerdict, Intent};
pub use pending::{ConfirmationType, EventDetails, PendingResponse};
pub use queue::QueuedMessage;
