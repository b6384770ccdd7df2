//! Core data types for the tunnel gateway
//!
//! Defines target identifiers, client display parameters, the request
//! parameter bag handed over by the request layer, and decoded protocol
//! instructions. Everything in this crate is pure data with no I/O.

pub mod client;
pub mod identifier;
pub mod instruction;
pub mod request;

pub use client::ClientDisplayInfo;
pub use identifier::{IdentifierError, IdentifierTable, TargetKind, TargetReference};
pub use instruction::Instruction;
pub use request::{RequestError, TunnelRequest};

/// Request parameter carrying the session auth token
pub const AUTH_TOKEN_PARAM: &str = "authToken";

/// Request parameter carrying the prefixed target identifier
pub const ID_PARAM: &str = "id";
