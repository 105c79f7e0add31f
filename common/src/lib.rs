//! Shared infrastructure for the fieldtrack workspace.

pub mod buffer2;
pub mod cancel;
pub mod float_ext;
pub mod log_setup;
pub mod parallel;

pub const EPSILON: f64 = 1e-6;

pub use buffer2::Buffer2;
pub use cancel::CancelToken;
pub use float_ext::FloatExt;
