//! In-place translation of rich documents.
//!
//! Text is extracted as style-consistent units with positional addresses, translated as plain
//! strings, and written back without disturbing formatting, anchors or container structure.

pub mod config;
pub mod error;
pub mod ir;
pub mod legacy;
pub mod markers;
pub mod ooxml;
pub mod pipeline;
pub mod progress;
pub mod style;
pub mod token;

pub use error::RetextError;
pub use ir::{Address, ContainerKind, RestoreReport, TextUnit};
