//! Content repository interfaces and an in-memory implementation.
//!
//! The repository itself is an external collaborator; the pipeline only
//! needs to walk nodes, list properties, read lengths and open values.

mod memory;
mod traits;

pub use memory::{MemoryNode, MemoryRepository, MemorySession, MemoryValue};
pub use traits::{
    child_path, path_depth, split_property_path, ContentNode, ContentProperty, PropertyLengths,
    PropertyValue, Repository, Session,
};
