//! Protocol Gateway Module
//!
//! Implementation of the protocol client contract on top of an
//! Evolution-API-compatible HTTP gateway.

mod api;
mod bridge;

pub use api::{GatewayApi, GatewayConfig, InstanceCredential};
pub use bridge::{BridgeConnection, BridgeConnector, INSTANCE_KEY};
