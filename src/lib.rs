//! chorewheel: weekly chore rotation over a messaging transport.
//!
//! Every week each household task is offered to the eligible participant
//! with the lowest score in the task's category. Participants accept or
//! decline by message; declined and unanswered tasks move on to the next
//! candidate, and reported completions are credited to the score ledger.
//!
//! # Architecture
//!
//! - **Store**: SQLite persistence behind [`store::ChoreStore`]
//! - **Allocation**: fairness planning per cycle ([`allocation`])
//! - **Lifecycle**: the assignment state machine and its triggers ([`lifecycle`])
//! - **Sessions**: scripted admin dialogues ([`session`])
//! - **Channels**: WhatsApp and relay transports plus the webhook gateway
//! - **Scheduler**: weekly triggers queued for the engine
//! - **Runtime**: one worker owning the [`engine::ChoreEngine`]

pub mod allocation;
pub mod channels;
pub mod commands;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod household;
pub mod ledger;
pub mod lifecycle;
pub mod messages;
pub mod model;
pub mod paths;
pub mod reassign;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;

pub use config::ChoreConfig;
pub use cycle::CycleKey;
pub use engine::{ChoreEngine, EngineEvent, TriggerOutcome};
pub use error::{ChoreError, Result};
