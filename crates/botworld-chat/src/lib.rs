//! Shared chat log and outgoing-message sanitization.
//!
//! The [`ChatLog`] is the one chat data structure the whole pipeline
//! shares: controllers read it for context, the engagement scheduler
//! watches its activity markers, and bot speech flows out through it.
//! The [`sanitize`] module holds the pure text transforms applied to
//! every bot-authored message before it reaches the world.
//!
//! [`ChatLog`]: log::ChatLog

pub mod log;
pub mod sanitize;

pub use log::{ChatLog, ChatSink};
pub use sanitize::{sanitize_outgoing, strip_self_prefix};
