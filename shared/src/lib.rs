//! # Shared Probe Library
//!
//! This crate provides the core of the Car Info bridge: a resilient probe for
//! the optional Android Car property service.
//!
//! - **Result Types**: The records handed back to the UI
//! - **Capability Traits**: One trait per step of discovering the Car API
//! - **Prober**: The three operations, each degrading to a safe fallback
//! - **Dispatch**: Channel method names mapped onto the operations
//!
//! ## Architecture
//!
//! ```text
//! UI ──method──► dispatch ──► CapabilityProber ──► CapabilityProvider
//!                                    │                     │
//!                                    │             JNI (rust-core) / sim
//!                                    ▼
//!                     ParkStateResult / PropertyDescriptor / PropertyReadResult
//! ```
//!
//! ## Fallback Strategy
//!
//! The Car API is absent on most devices. Discovery therefore:
//! 1. Treats absence as the common case, not an error
//! 2. Guards every step and short-circuits to the operation's fallback
//! 3. Releases the connection on every exit path
//! 4. Keeps no state between calls

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dispatch;
pub mod intent;
pub mod model;
pub mod prober;
pub mod traits;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export main types for convenience
pub use dispatch::{Argument, DispatchError, Reply, Request};
pub use intent::Intent;
pub use model::{
    ParkStateResult, PropertyDescriptor, PropertyId, PropertyReadResult, PropertyValue,
    RegistryConstant,
};
pub use prober::{CapabilityProber, ConnectionGuard};
pub use traits::{
    Capability, CapabilityProvider, CarApi, CarConnection, CarProperty, ProbeError, ProbeResult,
    PropertyConfig, PropertyManager, Stage,
};

/// Library version reported by the bridge at startup
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
