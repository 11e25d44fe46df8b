//! Creating and destroying devices.

use crate::{
    DriverModel,
    class::{ClassDriver, ClassFlags},
    data::{DataSlot, StaticData},
    device::{Device, DeviceFlags},
    devres::Ledger,
    driver::Driver,
    error::{DmError, Result},
    handle::{DeviceId, NodeId},
};
use alloc::{string::String, vec::Vec};

impl DriverModel {
    /// Create a device for `drv` under `parent` and link it into its class.
    ///
    /// `plat` is static platform data supplied by the caller; without it the
    /// driver's declared platform block is allocated. On failure nothing of
    /// the device is left behind.
    pub fn bind(
        &mut self,
        parent: Option<DeviceId>,
        drv: &'static Driver,
        name: &str,
        plat: Option<StaticData>,
        node: Option<NodeId>,
    ) -> Result<DeviceId> {
        self.bind_with_driver_data(parent, drv, name, plat, 0, node)
    }

    /// [DriverModel::bind] recording `driver_data` on the device before any hook runs.
    pub fn bind_with_driver_data(
        &mut self,
        parent: Option<DeviceId>,
        drv: &'static Driver,
        name: &str,
        plat: Option<StaticData>,
        driver_data: usize,
        node: Option<NodeId>,
    ) -> Result<DeviceId> {
        let parent_drv = match parent {
            Some(p) => Some(self.device(p)?.driver),
            None => None,
        };
        let uc_drv = self.get_class(drv.id)?.driver;

        let mut req_seq = -1;
        if uc_drv.flags.contains(ClassFlags::SEQ_ALIAS) {
            if let (Some(node), Some(src)) = (node, self.source.as_deref()) {
                if let Some(seq) = src.alias_seq(uc_drv.name, node) {
                    req_seq = seq;
                }
            }
        }

        let mut dev = Device {
            generation: 0,
            name: String::from(name),
            driver: drv,
            class: drv.id,
            node,
            driver_data,
            parent,
            children: Vec::new(),
            plat: DataSlot::Empty,
            parent_plat: DataSlot::Empty,
            class_plat: DataSlot::Empty,
            priv_data: DataSlot::Empty,
            class_priv: DataSlot::Empty,
            parent_priv: DataSlot::Empty,
            req_seq,
            seq: -1,
            flags: DeviceFlags::empty(),
            ledger: Ledger::default(),
        };
        match plat {
            Some(data) => dev.plat = DataSlot::Supplied(data),
            None => {
                dev.plat.fill(drv.plat_auto)?;
            }
        }
        dev.class_plat.fill(uc_drv.per_device_plat_auto)?;
        if let Some(parent_drv) = parent_drv {
            let layout = if parent_drv.per_child_plat_auto.is_none() {
                self.class_driver_of(parent_drv.id)?.per_child_plat_auto
            } else {
                parent_drv.per_child_plat_auto
            };
            dev.parent_plat.fill(layout)?;
        }

        let generation = self.next_generation();
        dev.generation = generation;
        let id = DeviceId::new(self.devices.insert(dev), generation);
        if let Some(p) = parent {
            self.device_mut(p)?.children.push(id);
        }
        self.class_mut(drv.id)?.devices.push(id);

        let mut bound = false;
        if let Err(err) = self.bind_hooks(id, drv, uc_drv, parent, &mut bound) {
            debug_ex!("Failed to bind device '{}': {}", name, err);
            // A bus hook may already have bound children.
            let children = self.device(id)?.children.clone();
            for child in children {
                if let Err(child_err) = self.unbind(child) {
                    dm_warn!("Device '{}' failed to unbind a child: {}", name, child_err);
                    if self.device_exists(child) {
                        self.discard(child)?;
                    }
                }
            }
            if bound {
                if let Err(unbind_err) = drv.hooks.unbind(self, id) {
                    dm_warn!("Device '{}' failed to unbind: {}", name, unbind_err);
                }
            }
            self.unlink(id)?;
            self.devres_release_all(id)?;
            self.devices.remove(id.index());
            return Err(err);
        }
        self.device_mut(id)?.flags.insert(DeviceFlags::BOUND);
        debug_ex!("Bound device '{}' to driver '{}'", name, drv.name);
        Ok(id)
    }

    fn bind_hooks(
        &mut self,
        dev: DeviceId,
        drv: &'static Driver,
        uc_drv: &'static ClassDriver,
        parent: Option<DeviceId>,
        bound: &mut bool,
    ) -> Result<()> {
        drv.hooks.bind(self, dev)?;
        *bound = true;
        uc_drv.hooks.post_bind(self, dev)?;
        if let Some(parent) = parent {
            let parent_drv = self.device(parent)?.driver;
            let parent_uc_drv = self.class_driver_of(parent_drv.id)?;
            parent_uc_drv.hooks.child_post_bind(self, dev)?;
            parent_drv.hooks.child_post_bind(self, dev)?;
        }
        Ok(())
    }

    /// Take `dev` out of its parent's child list and its class's member list.
    fn unlink(&mut self, dev: DeviceId) -> Result<()> {
        let d = self.device(dev)?;
        let (parent, class) = (d.parent, d.class);
        if let Some(parent) = parent {
            if let Ok(p) = self.device_mut(parent) {
                p.children.retain(|child| *child != dev);
            }
        }
        if let Ok(uc) = self.class_mut(class) {
            uc.devices.retain(|member| *member != dev);
        }
        Ok(())
    }

    /// Drop `dev` and what is left of its subtree without calling any hook.
    fn discard(&mut self, dev: DeviceId) -> Result<()> {
        while let Some(child) = self.device(dev)?.children.first().copied() {
            self.discard(child)?;
        }
        self.unlink(dev)?;
        self.devres_release_all(dev)?;
        self.devices.remove(dev.index());
        Ok(())
    }

    /// Destroy an inactive device and, before it, all of its children.
    pub fn unbind(&mut self, dev: DeviceId) -> Result<()> {
        let d = self.device(dev)?;
        if d.is_active() {
            return Err(DmError::Lifecycle("cannot unbind an active device"));
        }
        let (drv, class) = (d.driver, d.class);

        while let Some(child) = self.device(dev)?.children.first().copied() {
            self.unbind(child)?;
        }

        drv.hooks.unbind(self, dev)?;
        let uc_drv = self.class_driver_of(class)?;
        uc_drv.hooks.pre_unbind(self, dev)?;

        self.unlink(dev)?;
        self.devres_release_all(dev)?;
        debug_ex!("Unbinding device {:?}", dev);
        self.devices.remove(dev.index());
        if self.root == Some(dev) {
            self.root = None;
        }
        Ok(())
    }
}
