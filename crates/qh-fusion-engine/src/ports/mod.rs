//! Ports module for the fusion engine
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use crate::domain::errors::{ClassicalError, QuantumError};
pub use inbound::HybridInferenceApi;
pub use outbound::{ClassicalModel, QuantumEstimate, QuantumSimulator};
