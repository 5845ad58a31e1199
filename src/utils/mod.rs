//! Utility helpers: handle allocation, logging, profiling and math extensions.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, GenerationalId, Handle};
pub use logging::ScopedTimer;
pub use math::*;
pub use profiling::StepProfile;
