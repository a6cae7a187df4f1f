pub mod ai;
pub mod batching;
pub mod calendar;
pub mod clock;
pub mod conversation;
pub mod dates;
pub mod intent;
pub mod intervention;
pub mod markers;
pub mod messaging;
pub mod orchestrator;
pub mod playback;
pub mod reminders;
pub mod scheduling;
pub mod segmentation;
pub mod store;
pub mod sweeper;
pub mod timers;
