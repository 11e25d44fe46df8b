//! Class-wide device lookups.
//!
//! `find_*` operations only look; `get_*` operations probe what they found and
//! report a probe failure instead of the device. Both create the class on
//! first use.

use crate::{
    DriverModel,
    class::ClassId,
    error::{DmError, Result},
    handle::{DeviceId, NodeId},
};

impl DriverModel {
    /// The `index`-th member of class `id`, in bind order.
    pub fn find_device(&mut self, id: ClassId, index: usize) -> Result<DeviceId> {
        self.get_class(id)?
            .devices
            .get(index)
            .copied()
            .ok_or(DmError::NotFound)
    }

    pub fn find_first_device(&mut self, id: ClassId) -> Result<Option<DeviceId>> {
        Ok(self.get_class(id)?.devices.first().copied())
    }

    /// The member of `dev`'s class bound after `dev`.
    pub fn find_next_device(&self, dev: DeviceId) -> Result<Option<DeviceId>> {
        let class = self.class(self.device(dev)?.class)?;
        let pos = class
            .devices
            .iter()
            .position(|member| *member == dev)
            .ok_or(DmError::Lifecycle("device missing from its class"))?;
        Ok(class.devices.get(pos + 1).copied())
    }

    /// First member whose name starts with `name`.
    pub fn find_device_by_name(&mut self, id: ClassId, name: &str) -> Result<DeviceId> {
        self.get_class(id)?;
        self.find_member(id, |dm, dev| dm.device(dev).is_ok_and(|d| d.name.starts_with(name)))
    }

    /// Member holding resolved (or, with `find_req_seq`, requested) sequence number `seq`.
    pub fn find_device_by_seq(&mut self, id: ClassId, seq: i32, find_req_seq: bool) -> Result<DeviceId> {
        self.get_class(id)?;
        if seq == -1 {
            return Err(DmError::NotFound);
        }
        let found = self.find_member(id, |dm, dev| {
            dm.device(dev).is_ok_and(|d| {
                let candidate = if find_req_seq { d.req_seq } else { d.seq };
                candidate == seq
            })
        });
        if found.is_err() {
            debug_ex!("No {:?} device with seq {} (req={})", id, seq, find_req_seq);
        }
        found
    }

    pub fn find_device_by_node(&mut self, id: ClassId, node: NodeId) -> Result<DeviceId> {
        self.get_class(id)?;
        self.find_member(id, |dm, dev| dm.device(dev).is_ok_and(|d| d.node == Some(node)))
    }

    /// Member whose node carries the phandle stored in `parent`'s property `name`.
    pub fn find_device_by_phandle(&mut self, id: ClassId, parent: DeviceId, name: &str) -> Result<DeviceId> {
        self.get_class(id)?;
        let src = self.identity_source()?;
        let parent_node = self.device(parent)?.node.ok_or(DmError::NotFound)?;
        let phandle = match src.read_u32(parent_node, name) {
            Some(phandle) if phandle != 0 => phandle,
            _ => return Err(DmError::NotFound),
        };
        self.find_member(id, |dm, dev| {
            dm.device(dev)
                .ok()
                .and_then(|d| d.node)
                .is_some_and(|node| src.phandle(node) == Some(phandle))
        })
    }

    fn find_member(&self, id: ClassId, pred: impl Fn(&DriverModel, DeviceId) -> bool) -> Result<DeviceId> {
        self.class(id)?
            .devices
            .iter()
            .copied()
            .find(|dev| pred(self, *dev))
            .ok_or(DmError::NotFound)
    }

    /// Probe `dev` and hand it back.
    pub(crate) fn get_device_tail(&mut self, dev: DeviceId) -> Result<DeviceId> {
        self.probe(dev)?;
        Ok(dev)
    }

    pub fn get_device(&mut self, id: ClassId, index: usize) -> Result<DeviceId> {
        let dev = self.find_device(id, index)?;
        self.get_device_tail(dev)
    }

    pub fn get_device_by_name(&mut self, id: ClassId, name: &str) -> Result<DeviceId> {
        let dev = self.find_device_by_name(id, name)?;
        self.get_device_tail(dev)
    }

    /// Device with sequence number `seq`: a resolved number first, else a requested one.
    pub fn get_device_by_seq(&mut self, id: ClassId, seq: i32) -> Result<DeviceId> {
        let dev = match self.find_device_by_seq(id, seq, false) {
            Err(DmError::NotFound) => self.find_device_by_seq(id, seq, true),
            other => other,
        }?;
        self.get_device_tail(dev)
    }

    pub fn get_device_by_node(&mut self, id: ClassId, node: NodeId) -> Result<DeviceId> {
        let dev = self.find_device_by_node(id, node)?;
        self.get_device_tail(dev)
    }

    pub fn get_device_by_phandle(&mut self, id: ClassId, parent: DeviceId, name: &str) -> Result<DeviceId> {
        let dev = self.find_device_by_phandle(id, parent, name)?;
        self.get_device_tail(dev)
    }

    /// First member of class `id`, probed; `None` for an empty class.
    pub fn first_device(&mut self, id: ClassId) -> Result<Option<DeviceId>> {
        match self.find_first_device(id)? {
            Some(dev) => self.get_device_tail(dev).map(Some),
            None => Ok(None),
        }
    }

    /// Member after `dev` in its class, probed.
    pub fn next_device(&mut self, dev: DeviceId) -> Result<Option<DeviceId>> {
        match self.find_next_device(dev)? {
            Some(next) => self.get_device_tail(next).map(Some),
            None => Ok(None),
        }
    }
}
