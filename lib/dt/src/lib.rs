//! In-memory device tree: the hardware description table drivers are matched against.
#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod builder;
pub mod node;
pub mod prop;

pub use builder::DeviceTreeBuilder;
pub use node::{DeviceTree, Node, NodeType};
pub use prop::{Property, PropertyError};
