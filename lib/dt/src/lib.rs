//! In-memory device tree used as the identity source of the driver model.
//!
//! Nodes live in a flat container and refer to each other by index, so a node
//! id doubles as the "node offset" the driver model records on a device.
//! Parsing flattened blobs is left to the boot stage; trees are assembled
//! with [`node::DeviceTree::add_node`] and [`node::DeviceTree::add_property`].

#![no_std]
extern crate alloc;

pub mod node;
pub mod prop;

pub use node::{DeviceTree, Node};
pub use prop::{Property, PropertyError};
