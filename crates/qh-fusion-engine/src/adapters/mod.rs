//! Adapters for the fusion engine
//!
//! Reference implementations of the outbound ports. Production deployments
//! plug their own model and simulator behind the same traits.

pub mod dense;
pub mod statevector;

pub use dense::DenseNetwork;
pub use statevector::{CircuitSummary, StateVectorSimulator};
