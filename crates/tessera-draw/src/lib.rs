//! Tessera draw crate.
//!
//! Retained-mode recording of draw work into passes and shading groups,
//! replayed against an abstract device, plus the typed GPU wrappers and
//! transient texture pool the renderer builds on.

pub mod config;
pub mod context;
pub mod device;
pub mod draw;
pub mod error;
pub mod gpu;
pub mod logging;
pub mod memory;
pub mod pool;

pub use config::DrawConfig;
pub use context::RenderContext;
pub use error::{DrawError, Result};
