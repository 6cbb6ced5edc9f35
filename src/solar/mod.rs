//! Physical model of a PV array: sun geometry, transposition and power conversion.

/// Solar position and angle of incidence.
pub mod geometry;
pub mod power;
/// Isotropic-sky plane-of-array transposition.
pub mod transposition;
pub mod types;

pub use geometry::SolarPosition;
pub use power::PowerOutput;
pub use transposition::PoaIrradiance;
pub use types::{ArrayConfig, ModelParameters};
