//! Core data models for mcpm.
//!
//! This crate provides the fundamental data types shared by the classifier,
//! the process manager and the event bus: server and packet identifiers, the
//! classified event envelope, and the inbound/outbound/echo packets that flow
//! between a managed server and its callers.

pub mod action;
pub mod event;
pub mod ids;
pub mod packet;
pub mod text;

// Re-export main types
pub use action::CmdAction;
pub use event::{ClassifiedEvent, EventKind, EventKindTag, LogHeader, LogTime, PlayerOperation, Scope};
pub use ids::{EventId, PacketId, ServerId};
pub use packet::{EchoPacket, InPacket, OutPacket};
pub use text::{truncate, DEFAULT_TRUNCATE_LEN};
