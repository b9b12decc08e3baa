//! Application Services
//!
//! - **ConnectionManager**: the single protocol session, its reconnect
//!   supervisor and credential persistence

pub mod connection_manager;

pub use connection_manager::{
    ConnectOutcome, ConnectionError, ConnectionManager, RetryCounter, RetryDecision, SessionPolicy,
};
