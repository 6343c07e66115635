//! Decision pipeline, action queue, and engagement scheduling.
//!
//! This crate is the behavioral core of Botworld: every tick, each active
//! bot perceives its surroundings, a pluggable controller decides on an
//! action, and the per-bot action queue sequences and executes it against
//! collaborator interfaces supplied by the hosting layer. A separate
//! engagement scheduler proactively starts conversations during quiet
//! periods using the same remote-planner protocol.
//!
//! # Modules
//!
//! - [`config`] -- Typed YAML configuration with serde defaults
//! - [`world`] -- Collaborator traits implemented by the hosting layer
//! - [`runtime`] -- Per-bot mutable memory for the local heuristic
//! - [`queue`] -- Bounded per-bot action queue with coalescing
//! - [`controller`] -- The controller strategies and their registry
//! - [`engagement`] -- Proactive chat-engagement scheduling
//! - [`tick`] -- The per-tick orchestrator driving all of the above

pub mod config;
pub mod controller;
pub mod engagement;
pub mod queue;
pub mod runtime;
pub mod tick;
pub mod world;

pub use config::BotworldConfig;
pub use controller::{Controller, ControllerRegistry, Decision};
pub use engagement::{EngagementMode, EngagementScheduler};
pub use queue::ActionQueue;
pub use runtime::BotRuntime;
pub use tick::{TickOrchestrator, TickSummary, WorldServices};
