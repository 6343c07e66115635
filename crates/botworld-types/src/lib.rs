//! Shared type definitions for the Botworld agent pipeline.
//!
//! This crate is the single source of truth for the data types that flow
//! between the tick orchestrator, the controllers, the action queue, and
//! the chat subsystem. Everything here is plain data -- behavior lives in
//! `botworld-core` and `botworld-chat`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for bot and request identifiers
//! - [`action`] -- The closed set of bot actions and their coalescing tags
//! - [`perception`] -- The per-tick observation snapshot handed to controllers
//! - [`chat`] -- Chat log entries and sender classification
//! - [`profile`] -- Bot identity, spawn data, and persona metadata
//! - [`wire`] -- Planner and per-decision HTTP protocol records

pub mod action;
pub mod chat;
pub mod ids;
pub mod perception;
pub mod profile;
pub mod wire;

pub use action::{Action, ActionKind, Position, TradeDirection};
pub use chat::{ChatEntry, SenderClass};
pub use ids::{BotId, RequestId};
pub use perception::{NearbyPlayer, Perception};
pub use profile::BotProfile;
pub use wire::{
    BotDescriptor, DecisionRequest, DecisionResponse, PlannedAction, PlannerRequest,
    PlannerResponse, PlannerSettings, ServerInfo, WireChatLine, WirePersona, SILENCE_TOKEN,
};
