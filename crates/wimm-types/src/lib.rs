//! Pure data types for wimm: backends, operations, command specs, job results.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. It
//! exists so that front-ends can speak the core's vocabulary without pulling
//! in tokio and the process machinery of wimm-kernel.

pub mod backend;
pub mod command;
pub mod error;
pub mod operation;
pub mod report;
pub mod result;

// Flat re-exports for convenience
pub use backend::*;
pub use command::*;
pub use error::*;
pub use operation::*;
pub use report::*;
pub use result::*;
