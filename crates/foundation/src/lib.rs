pub mod device;
pub mod geo;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use device::*;
pub use geo::*;
