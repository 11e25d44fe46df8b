//! The identity source: the hardware description devices are bound from.
//!
//! The driver model only needs a handful of queries on it, collected in
//! [IdentitySource]. The in-memory [dt::DeviceTree] implements them.

use crate::{
    DriverModel,
    class::ClassId,
    error::{DmError, Result},
    handle::{DeviceId, NodeId},
    root::SimpleBusPlat,
};
use alloc::vec::Vec;
use dt::DeviceTree;

/// Read-only view of a hardware description.
pub trait IdentitySource: Send {
    fn root(&self) -> NodeId;
    /// Full node name, unit address included.
    fn node_name(&self, node: NodeId) -> Option<&str>;
    fn subnodes(&self, node: NodeId) -> Vec<NodeId>;
    /// `compatible` strings, most specific first.
    fn compatible(&self, node: NodeId) -> Vec<&str>;
    /// Raw property bytes.
    fn property(&self, node: NodeId, name: &str) -> Option<&[u8]>;
    fn read_u32(&self, node: NodeId, name: &str) -> Option<u32> {
        let bytes: [u8; 4] = self.property(node, name)?.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }
    fn read_string(&self, node: NodeId, name: &str) -> Option<&str> {
        let bytes = self.property(node, name)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        core::str::from_utf8(&bytes[..end]).ok()
    }
    /// Every cell of a property, `None` unless it holds whole cells.
    fn read_cells(&self, node: NodeId, name: &str) -> Option<Vec<u32>> {
        let bytes = self.property(node, name)?;
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|cell| u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]))
                .collect(),
        )
    }
    fn phandle(&self, node: NodeId) -> Option<u32> {
        self.read_u32(node, "phandle")
    }
    fn node_by_phandle(&self, phandle: u32) -> Option<NodeId>;
    /// Whether the node's status allows binding.
    fn is_enabled(&self, node: NodeId) -> bool;
    /// `n` of the alias `<stem><n>` pointing at `node`.
    fn alias_seq(&self, stem: &str, node: NodeId) -> Option<i32>;
    /// Start of the node's `index`th `reg` range.
    fn reg_addr_index(&self, node: NodeId, index: usize) -> Option<usize>;
    fn reg_addr(&self, node: NodeId) -> Option<usize> {
        self.reg_addr_index(node, 0)
    }
}

impl IdentitySource for DeviceTree {
    fn root(&self) -> NodeId {
        NodeId(self.root_id)
    }

    fn node_name(&self, node: NodeId) -> Option<&str> {
        self.node(node.0).map(|n| n.full_name.as_ref())
    }

    fn subnodes(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node.0)
            .map(|n| n.children.iter().map(|id| NodeId(*id)).collect())
            .unwrap_or_default()
    }

    fn compatible(&self, node: NodeId) -> Vec<&str> {
        self.node(node.0).map(|n| self.get_compatible(n)).unwrap_or_default()
    }

    fn property(&self, node: NodeId, name: &str) -> Option<&[u8]> {
        let n = self.node(node.0)?;
        self.get_property(n, name).map(|prop| prop.data.as_ref())
    }

    fn phandle(&self, node: NodeId) -> Option<u32> {
        self.get_phandle(self.node(node.0)?)
    }

    fn node_by_phandle(&self, phandle: u32) -> Option<NodeId> {
        self.get_node_by_phandle(phandle).map(|n| NodeId(n.node_id))
    }

    fn is_enabled(&self, node: NodeId) -> bool {
        self.node(node.0).is_some_and(|n| DeviceTree::is_enabled(self, n))
    }

    fn alias_seq(&self, stem: &str, node: NodeId) -> Option<i32> {
        self.get_alias_seq(stem, self.node(node.0)?)
    }

    fn reg_addr_index(&self, node: NodeId, index: usize) -> Option<usize> {
        let ranges = self.get_reg_value(self.node(node.0)?).ok()?;
        ranges.get(index).map(|range| range.start)
    }
}

impl DriverModel {
    pub fn identity_source(&self) -> Result<&dyn IdentitySource> {
        self.source
            .as_deref()
            .ok_or(DmError::Lifecycle("no identity source attached"))
    }

    /// Attach `source`, returning the previous one.
    pub fn set_identity_source(
        &mut self,
        source: Option<alloc::boxed::Box<dyn IdentitySource>>,
    ) -> Option<alloc::boxed::Box<dyn IdentitySource>> {
        core::mem::replace(&mut self.source, source)
    }

    fn dev_node(&self, dev: DeviceId) -> Result<(&dyn IdentitySource, NodeId)> {
        let node = self.device(dev)?.node.ok_or(DmError::NotFound)?;
        Ok((self.identity_source()?, node))
    }

    pub fn dev_read_u32(&self, dev: DeviceId, name: &str) -> Result<u32> {
        let (src, node) = self.dev_node(dev)?;
        src.read_u32(node, name).ok_or(DmError::NotFound)
    }

    /// Like [DriverModel::dev_read_u32], with a fallback for a missing property.
    pub fn dev_read_u32_default(&self, dev: DeviceId, name: &str, default: u32) -> u32 {
        self.dev_read_u32(dev, name).unwrap_or(default)
    }

    pub fn dev_read_string(&self, dev: DeviceId, name: &str) -> Result<&str> {
        let (src, node) = self.dev_node(dev)?;
        src.read_string(node, name).ok_or(DmError::NotFound)
    }

    pub fn dev_read_bool(&self, dev: DeviceId, name: &str) -> bool {
        self.dev_node(dev)
            .is_ok_and(|(src, node)| src.property(node, name).is_some())
    }

    /// Address of the device: its first `reg` address, translated by the
    /// parent simple bus and offset by the translation offset.
    pub fn dev_get_addr(&self, dev: DeviceId) -> Result<usize> {
        self.dev_get_addr_index(dev, 0)
    }

    /// Like [DriverModel::dev_get_addr] for the `index`th `reg` entry.
    pub fn dev_get_addr_index(&self, dev: DeviceId, index: usize) -> Result<usize> {
        let (src, node) = self.dev_node(dev)?;
        let mut addr = src.reg_addr_index(node, index).ok_or(DmError::NotFound)?;
        if let Some(parent) = self.device(dev)?.parent {
            if self.device(parent)?.class == ClassId::SimpleBus {
                if let Some(bus) = self.dev_get_plat::<SimpleBusPlat>(parent) {
                    addr = bus.translate(addr);
                }
            }
        }
        Ok(addr.wrapping_add(self.translation_offset))
    }

    /// Offset added to every address returned by [DriverModel::dev_get_addr].
    pub fn set_translation_offset(&mut self, offset: usize) {
        self.translation_offset = offset;
    }

    pub fn translation_offset(&self) -> usize {
        self.translation_offset
    }
}
