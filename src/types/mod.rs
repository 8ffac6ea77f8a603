//! Core types shared across the compiler and runtime.
//!
//! - **IDs**: strongly-typed identifiers (`RunId`, `SpellId`)
//! - **Primitives**: domain newtypes (`Address`, `ChainId`, `AssetId`,
//!   `BasisPoints`, `Amount`)
//! - **Value**: the dynamically-typed runtime value
//! - **Errors**: the crate's error taxonomy
//! - **Config**: process-wide configuration

mod config;
mod errors;
mod ids;
mod primitives;
mod value;

pub use config::{Config, DefaultLimits, ObservabilityConfig, StateConfig};
pub use errors::{Error, Position, Result};
pub use ids::{RunId, SpellId};
pub use primitives::{Address, AssetId, Amount, BasisPoints, ChainId};
pub use value::Value;
