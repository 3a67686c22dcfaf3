//! Weekly workflow scheduler.
//!
//! Fires the six workflow triggers on their configured weekly slots by
//! queueing [`EngineEvent::Trigger`](crate::engine::EngineEvent) events.

pub mod runner;
pub mod triggers;

pub use runner::TriggerScheduler;
pub use triggers::{Schedule, ScheduledTrigger, TriggerKind};
