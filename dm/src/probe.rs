//! Activating and deactivating devices.

use crate::{
    DriverModel,
    class::ClassDriver,
    device::{DataRole, DeviceFlags},
    driver::Driver,
    error::Result,
    handle::DeviceId,
};

/// Data blocks allocated by the probe attempt in progress.
#[derive(Debug, Default)]
struct Fresh {
    priv_data: bool,
    class_priv: bool,
    parent_priv: bool,
}

impl DriverModel {
    /// Activate `dev`, activating its ancestors first.
    ///
    /// Probing an active device does nothing. On failure every block and
    /// ledger entry the attempt acquired is released and the device stays bound.
    pub fn probe(&mut self, dev: DeviceId) -> Result<()> {
        let d = self.device(dev)?;
        if d.flags.intersects(DeviceFlags::ACTIVATED | DeviceFlags::PROBING) {
            return Ok(());
        }
        let (drv, class, parent) = (d.driver, d.class, d.parent);

        if let Some(parent) = parent {
            self.probe(parent)?;
            // The parent's probe may have activated this device.
            if self.device(dev)?.flags.intersects(DeviceFlags::ACTIVATED | DeviceFlags::PROBING) {
                return Ok(());
            }
        }
        let uc_drv = self.class_driver_of(class)?;

        self.device_mut(dev)?.flags.insert(DeviceFlags::PROBING);
        let mut fresh = Fresh::default();
        let result = self.probe_stages(dev, drv, uc_drv, parent, &mut fresh);
        if let Ok(d) = self.device_mut(dev) {
            d.flags.remove(DeviceFlags::PROBING);
        }
        if let Err(err) = result {
            debug_ex!("Probe of {:?} failed: {}", dev, err);
            self.remove_active_children(dev);
            self.probe_rollback(dev, &fresh)?;
            return Err(err);
        }
        self.device_mut(dev)?.flags.insert(DeviceFlags::ACTIVATED);
        debug_ex!("Probed device '{}'", self.device(dev)?.name);
        Ok(())
    }

    fn probe_stages(
        &mut self,
        dev: DeviceId,
        drv: &'static Driver,
        uc_drv: &'static ClassDriver,
        parent: Option<DeviceId>,
        fresh: &mut Fresh,
    ) -> Result<()> {
        let d = self.device(dev)?;
        if d.node.is_some() && !d.plat.is_supplied() {
            drv.hooks.decode_identity(self, dev)?;
        }

        let parent_drv = match parent {
            Some(p) => Some(self.device(p)?.driver),
            None => None,
        };
        let parent_layout = match parent_drv {
            Some(parent_drv) if parent_drv.per_child_auto.is_none() => {
                self.class_driver_of(parent_drv.id)?.per_child_auto
            }
            Some(parent_drv) => parent_drv.per_child_auto,
            None => Default::default(),
        };
        let d = self.device_mut(dev)?;
        fresh.priv_data = d.priv_data.fill(drv.priv_auto)?;
        fresh.class_priv = d.class_priv.fill(uc_drv.per_device_auto)?;
        fresh.parent_priv = d.parent_priv.fill(parent_layout)?;

        uc_drv.hooks.pre_probe(self, dev)?;
        if let Some(parent_drv) = parent_drv {
            self.class_driver_of(parent_drv.id)?.hooks.child_pre_probe(self, dev)?;
            parent_drv.hooks.child_pre_probe(self, dev)?;
        }

        drv.hooks.probe(self, dev)?;

        let assigned = if self.device(dev)?.seq == -1 {
            let seq = self.resolve_sequence(dev)?;
            self.device_mut(dev)?.seq = seq;
            true
        } else {
            false
        };
        if let Err(err) = uc_drv.hooks.post_probe(self, dev) {
            if assigned {
                self.device_mut(dev)?.seq = -1;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Deactivate children that `dev`'s failed probe activated.
    fn remove_active_children(&mut self, dev: DeviceId) {
        let children = self.device(dev).map(|d| d.children.clone()).unwrap_or_default();
        for child in children {
            if let Err(err) = self.remove(child) {
                dm_warn!("Failed to remove child {:?} of {:?}: {}", child, dev, err);
            }
        }
    }

    fn probe_rollback(&mut self, dev: DeviceId, fresh: &Fresh) -> Result<()> {
        let d = self.device_mut(dev)?;
        for (allocated, role) in [
            (fresh.priv_data, DataRole::Priv),
            (fresh.class_priv, DataRole::ClassPriv),
            (fresh.parent_priv, DataRole::ParentPriv),
        ] {
            if allocated {
                d.slot_mut(role).release_owned();
            }
        }
        self.devres_release_probe(dev)?;
        Ok(())
    }

    /// Deactivate `dev` after deactivating its active children.
    ///
    /// Removing an inactive device does nothing. The sequence number is kept.
    pub fn remove(&mut self, dev: DeviceId) -> Result<()> {
        let d = self.device(dev)?;
        if !d.is_active() {
            return Ok(());
        }
        let (drv, class, parent) = (d.driver, d.class, d.parent);

        let children = d.children.clone();
        for child in children {
            if let Err(err) = self.remove(child) {
                dm_warn!("Failed to remove child {:?} of {:?}: {}", child, dev, err);
                return Err(err);
            }
        }

        let uc_drv = self.class_driver_of(class)?;
        uc_drv.hooks.pre_remove(self, dev)?;
        drv.hooks.remove(self, dev)?;
        if let Some(parent) = parent {
            let parent_drv = self.device(parent)?.driver;
            parent_drv.hooks.child_post_remove(self, dev)?;
        }

        self.devres_release_probe(dev)?;
        let d = self.device_mut(dev)?;
        d.priv_data.release_owned();
        d.class_priv.release_owned();
        d.parent_priv.release_owned();
        d.flags.remove(DeviceFlags::ACTIVATED);
        debug_ex!("Removed device {:?}", dev);
        Ok(())
    }
}
