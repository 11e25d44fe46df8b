//! Device records and their accessors.

use crate::{
    DriverModel,
    class::ClassId,
    data::{Block, DataSlot},
    devres::Ledger,
    driver::Driver,
    error::{DmError, Result},
    handle::{DeviceId, NodeId},
};
use alloc::{string::String, vec::Vec};
use bitflags::bitflags;
use core::any::Any;

bitflags! {
    /// Lifecycle state of a device.
    pub struct DeviceFlags: u32 {
        /// Probed and not removed since.
        const ACTIVATED = 1 << 0;
        /// Probe hooks are running; a nested probe treats the device as active.
        const PROBING   = 1 << 1;
        /// Bound; set once binding has fully completed.
        const BOUND     = 1 << 6;
    }
}

#[derive(Debug)]
pub struct Device {
    pub(crate) generation: u32,
    pub(crate) name: String,
    pub(crate) driver: &'static Driver,
    pub(crate) class: ClassId,
    pub(crate) node: Option<NodeId>,
    pub(crate) driver_data: usize,
    pub(crate) parent: Option<DeviceId>,
    pub(crate) children: Vec<DeviceId>,
    pub(crate) plat: DataSlot,
    pub(crate) parent_plat: DataSlot,
    pub(crate) class_plat: DataSlot,
    pub(crate) priv_data: DataSlot,
    pub(crate) class_priv: DataSlot,
    pub(crate) parent_priv: DataSlot,
    pub(crate) req_seq: i32,
    pub(crate) seq: i32,
    pub(crate) flags: DeviceFlags,
    pub(crate) ledger: Ledger,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn driver(&self) -> &'static Driver {
        self.driver
    }
    pub fn class_id(&self) -> ClassId {
        self.class
    }
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
    pub fn driver_data(&self) -> usize {
        self.driver_data
    }
    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }
    pub fn children(&self) -> &[DeviceId] {
        &self.children
    }
    /// Resolved sequence number, -1 until first activation.
    pub fn seq(&self) -> i32 {
        self.seq
    }
    /// Requested sequence number, -1 for none.
    pub fn req_seq(&self) -> i32 {
        self.req_seq
    }
    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }
    pub fn is_active(&self) -> bool {
        self.flags.contains(DeviceFlags::ACTIVATED)
    }
    pub fn is_bound(&self) -> bool {
        self.flags.contains(DeviceFlags::BOUND)
    }
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// Data roles carried by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRole {
    Plat,
    ParentPlat,
    ClassPlat,
    Priv,
    ClassPriv,
    ParentPriv,
}

impl Device {
    pub fn slot(&self, role: DataRole) -> &DataSlot {
        match role {
            DataRole::Plat => &self.plat,
            DataRole::ParentPlat => &self.parent_plat,
            DataRole::ClassPlat => &self.class_plat,
            DataRole::Priv => &self.priv_data,
            DataRole::ClassPriv => &self.class_priv,
            DataRole::ParentPriv => &self.parent_priv,
        }
    }
    pub(crate) fn slot_mut(&mut self, role: DataRole) -> &mut DataSlot {
        match role {
            DataRole::Plat => &mut self.plat,
            DataRole::ParentPlat => &mut self.parent_plat,
            DataRole::ClassPlat => &mut self.class_plat,
            DataRole::Priv => &mut self.priv_data,
            DataRole::ClassPriv => &mut self.class_priv,
            DataRole::ParentPriv => &mut self.parent_priv,
        }
    }
}

impl DriverModel {
    /// Resolve a handle. Stale handles yield [DmError::InvalidArgument].
    pub fn device(&self, dev: DeviceId) -> Result<&Device> {
        self.devices
            .get(dev.index())
            .filter(|d| d.generation == dev.generation())
            .ok_or(DmError::InvalidArgument)
    }

    pub(crate) fn device_mut(&mut self, dev: DeviceId) -> Result<&mut Device> {
        self.devices
            .get_mut(dev.index())
            .filter(|d| d.generation == dev.generation())
            .ok_or(DmError::InvalidArgument)
    }

    /// Whether `dev` still refers to a live device.
    pub fn device_exists(&self, dev: DeviceId) -> bool {
        self.device(dev).is_ok()
    }

    pub fn device_active(&self, dev: DeviceId) -> bool {
        self.device(dev).is_ok_and(Device::is_active)
    }

    fn dev_data<T: Any>(&self, dev: DeviceId, role: DataRole) -> Option<&T> {
        self.device(dev).ok()?.slot(role).get()
    }

    fn dev_data_mut<T: Any>(&mut self, dev: DeviceId, role: DataRole) -> Option<&mut T> {
        self.device_mut(dev).ok()?.slot_mut(role).get_mut()
    }

    pub fn dev_get_plat<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::Plat)
    }
    pub fn dev_get_plat_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::Plat)
    }
    pub fn dev_get_parent_plat<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::ParentPlat)
    }
    pub fn dev_get_parent_plat_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::ParentPlat)
    }
    pub fn dev_get_class_plat<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::ClassPlat)
    }
    pub fn dev_get_class_plat_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::ClassPlat)
    }
    pub fn dev_get_priv<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::Priv)
    }
    pub fn dev_get_priv_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::Priv)
    }
    pub fn dev_get_class_priv<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::ClassPriv)
    }
    pub fn dev_get_class_priv_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::ClassPriv)
    }
    pub fn dev_get_parent_priv<T: Any>(&self, dev: DeviceId) -> Option<&T> {
        self.dev_data(dev, DataRole::ParentPriv)
    }
    pub fn dev_get_parent_priv_mut<T: Any>(&mut self, dev: DeviceId) -> Option<&mut T> {
        self.dev_data_mut(dev, DataRole::ParentPriv)
    }

    /// Install a driver-owned block in `role`, replacing whatever was there.
    ///
    /// The framework does not release driver-owned blocks on remove; the driver
    /// takes them back with [DriverModel::dev_take_data] when it is done.
    pub fn dev_set_data(&mut self, dev: DeviceId, role: DataRole, block: Block) -> Result<()> {
        *self.device_mut(dev)?.slot_mut(role) = DataSlot::Driver(block);
        Ok(())
    }

    /// Take back a driver-owned block, leaving the slot empty.
    pub fn dev_take_data(&mut self, dev: DeviceId, role: DataRole) -> Result<Option<Block>> {
        let slot = self.device_mut(dev)?.slot_mut(role);
        match core::mem::take(slot) {
            DataSlot::Driver(block) => Ok(Some(block)),
            other => {
                *slot = other;
                Ok(None)
            }
        }
    }

    pub fn dev_get_parent(&self, dev: DeviceId) -> Result<Option<DeviceId>> {
        Ok(self.device(dev)?.parent)
    }

    pub fn dev_get_driver_data(&self, dev: DeviceId) -> Result<usize> {
        Ok(self.device(dev)?.driver_data)
    }

    /// The driver's class-specific operation table, downcast to `T`.
    pub fn device_get_ops<T: Any>(&self, dev: DeviceId) -> Option<&'static T> {
        self.device(dev).ok()?.driver.ops?.downcast_ref::<T>()
    }

    pub fn device_get_class_id(&self, dev: DeviceId) -> Result<ClassId> {
        Ok(self.device(dev)?.class)
    }

    pub fn dev_get_class_name(&self, dev: DeviceId) -> Result<&'static str> {
        let class = self.device(dev)?.class;
        Ok(self.class_driver_of(class)?.name)
    }

    pub fn device_set_name(&mut self, dev: DeviceId, name: &str) -> Result<()> {
        let d = self.device_mut(dev)?;
        d.name.clear();
        d.name.push_str(name);
        Ok(())
    }

    /// Request sequence number `seq` for `dev`, honoured at its first activation.
    pub fn device_set_req_seq(&mut self, dev: DeviceId, seq: i32) -> Result<()> {
        let d = self.device_mut(dev)?;
        if d.seq != -1 {
            return Err(DmError::Lifecycle("sequence number already resolved"));
        }
        d.req_seq = seq;
        Ok(())
    }

    /// The `index`-th child of `parent`, probed.
    pub fn device_get_child(&mut self, parent: DeviceId, index: usize) -> Result<DeviceId> {
        let child = *self
            .device(parent)?
            .children
            .get(index)
            .ok_or(DmError::NotFound)?;
        self.get_device_tail(child)
    }

    /// Find a child by resolved (or, with `find_req_seq`, requested) sequence number.
    pub fn device_find_child_by_seq(
        &self,
        parent: DeviceId,
        seq_or_req_seq: i32,
        find_req_seq: bool,
    ) -> Result<DeviceId> {
        if seq_or_req_seq == -1 {
            return Err(DmError::NotFound);
        }
        self.device(parent)?
            .children
            .iter()
            .copied()
            .find(|child| {
                self.device(*child).is_ok_and(|d| {
                    let seq = if find_req_seq { d.req_seq } else { d.seq };
                    seq == seq_or_req_seq
                })
            })
            .ok_or(DmError::NotFound)
    }

    /// Like [DriverModel::device_find_child_by_seq], trying resolved numbers first, then probe.
    pub fn device_get_child_by_seq(&mut self, parent: DeviceId, seq: i32) -> Result<DeviceId> {
        let child = match self.device_find_child_by_seq(parent, seq, false) {
            Err(DmError::NotFound) => self.device_find_child_by_seq(parent, seq, true),
            other => other,
        }?;
        self.get_device_tail(child)
    }

    pub fn device_find_child_by_node(&self, parent: DeviceId, node: NodeId) -> Result<DeviceId> {
        self.device(parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.device(*child).is_ok_and(|d| d.node == Some(node)))
            .ok_or(DmError::NotFound)
    }

    pub fn device_get_child_by_node(&mut self, parent: DeviceId, node: NodeId) -> Result<DeviceId> {
        let child = self.device_find_child_by_node(parent, node)?;
        self.get_device_tail(child)
    }

    /// Search the whole tree below the root for the device on `node`, probed.
    pub fn device_get_global_by_node(&mut self, node: NodeId) -> Result<DeviceId> {
        let root = self.root()?;
        let dev = self.device_find_global_by_node(root, node)?;
        self.get_device_tail(dev)
    }

    fn device_find_global_by_node(&self, parent: DeviceId, node: NodeId) -> Result<DeviceId> {
        let d = self.device(parent)?;
        if d.node == Some(node) {
            return Ok(parent);
        }
        d.children
            .iter()
            .find_map(|child| self.device_find_global_by_node(*child, node).ok())
            .ok_or(DmError::NotFound)
    }

    pub fn device_find_first_child(&self, parent: DeviceId) -> Result<Option<DeviceId>> {
        Ok(self.device(parent)?.children.first().copied())
    }

    /// The sibling following `dev` in its parent's child list.
    pub fn device_find_next_child(&self, dev: DeviceId) -> Result<Option<DeviceId>> {
        let Some(parent) = self.device(dev)?.parent else {
            return Ok(None);
        };
        let siblings = &self.device(parent)?.children;
        let pos = siblings
            .iter()
            .position(|s| *s == dev)
            .ok_or(DmError::Lifecycle("device missing from its parent's child list"))?;
        Ok(siblings.get(pos + 1).copied())
    }

    pub fn device_has_children(&self, dev: DeviceId) -> bool {
        self.device(dev).is_ok_and(|d| !d.children.is_empty())
    }

    pub fn device_has_active_children(&self, dev: DeviceId) -> bool {
        self.device(dev)
            .is_ok_and(|d| d.children.iter().any(|child| self.device_active(*child)))
    }

    pub fn device_is_last_sibling(&self, dev: DeviceId) -> bool {
        matches!(self.device_find_next_child(dev), Ok(None))
    }
}
