//! ti-core: stable foundation for thermoint.
//!
//! Contains:
//! - cancel (cooperative cancellation token)
//! - numeric (Real + tolerances + float helpers)
//! - units (physical constants and metal-unit conversions backed by uom)
//! - structure (lattice kinds and the simulation box description)
//! - state (the immutable thermodynamic target of a job)
//! - error (shared error types and the error-kind taxonomy)

pub mod cancel;
pub mod error;
pub mod numeric;
pub mod state;
pub mod structure;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use cancel::CancelToken;
pub use error::{ErrorKind, TiError, TiResult};
pub use numeric::*;
pub use state::{Phase, ThermodynamicState};
pub use structure::{Crystal, LatticeKind, StructureSpec};
