//! # Ports
//!
//! - `inbound`: what the orchestrator offers
//! - `outbound`: what it needs from the host

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
