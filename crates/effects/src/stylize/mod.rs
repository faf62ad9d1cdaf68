//! Stylize filters.
//!
//! - [`Sharpen`]: Unsharp mask
//! - [`EdgeDetect`]: Sobel edges, for tracing line work

pub mod edge_detect;
pub mod sharpen;

pub use edge_detect::EdgeDetect;
pub use sharpen::Sharpen;
