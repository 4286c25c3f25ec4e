//! Batch-level assembly: header derivation and container construction.

mod container;
mod header_factory;

pub use container::{Container, ContainerFactory};
pub use header_factory::CompressionHeaderFactory;
