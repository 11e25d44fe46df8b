//! Device classes and the class registry.
//!
//! A [Class] is created the first time its identifier is looked up, from the
//! [ClassDriver] registered under that identifier, and lives until it is
//! explicitly destroyed. It keeps its member devices in bind order.

use crate::{
    DriverModel,
    data::{AutoAlloc, DataSlot, StaticData},
    error::{DmError, Result},
    handle::DeviceId,
};
use alloc::{boxed::Box, vec::Vec};
use bitflags::bitflags;
use core::{any::Any, fmt::Debug};

/// Identifier of a device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ClassId {
    Root,
    SimpleBus,
    Demo,
    Test,
    TestFdt,
    TestBus,
    Serial,
    Gpio,
    I2c,
    Spi,
    Mmc,
    Eth,
    Pci,
    Timer,
    Clk,
    Video,
    Keyboard,
    Misc,
    /// Board- or vendor-specific class.
    Other(u32),
}

bitflags! {
    /// Class-wide behaviour switches.
    pub struct ClassFlags: u32 {
        /// Members take their requested sequence number from the identity
        /// source's aliases (`<class name><n>`).
        const SEQ_ALIAS = 1 << 0;
    }
}

/// Callbacks applied uniformly to every member of a class.
pub trait ClassOps: Sync + Debug {
    fn post_bind(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    fn pre_unbind(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    fn pre_probe(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    fn post_probe(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    fn pre_remove(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// A child of a member device was bound.
    fn child_post_bind(&self, _dm: &mut DriverModel, _child: DeviceId) -> Result<()> {
        Ok(())
    }
    /// A child of a member device is about to be probed.
    fn child_pre_probe(&self, _dm: &mut DriverModel, _child: DeviceId) -> Result<()> {
        Ok(())
    }
    /// Called once when the class is created.
    fn init(&self, _dm: &mut DriverModel, _id: ClassId) -> Result<()> {
        Ok(())
    }
    /// Called once when the class is destroyed, after its members are gone.
    fn destroy(&self, _dm: &mut DriverModel, _id: ClassId) -> Result<()> {
        Ok(())
    }
}

impl ClassOps for crate::driver::NoOps {}

/// Static description of a class.
#[derive(Debug)]
pub struct ClassDriver {
    pub name: &'static str,
    pub id: ClassId,
    pub hooks: &'static dyn ClassOps,
    /// Class-private data, allocated once when the class is created.
    pub priv_auto: AutoAlloc,
    /// Per-member private data, allocated at probe.
    pub per_device_auto: AutoAlloc,
    /// Per-member platform data, allocated at bind.
    pub per_device_plat_auto: AutoAlloc,
    /// Parent-private data for children of members, unless the parent's driver declares one.
    pub per_child_auto: AutoAlloc,
    /// Parent-platform data for children of members, unless the parent's driver declares one.
    pub per_child_plat_auto: AutoAlloc,
    pub ops: Option<StaticData>,
    pub flags: ClassFlags,
    /// Sequence numbers handed out are below this bound.
    pub max_seq: i32,
}

impl ClassDriver {
    pub const fn new(name: &'static str, id: ClassId) -> ClassDriver {
        ClassDriver {
            name,
            id,
            hooks: &crate::driver::NoOps,
            priv_auto: AutoAlloc::None,
            per_device_auto: AutoAlloc::None,
            per_device_plat_auto: AutoAlloc::None,
            per_child_auto: AutoAlloc::None,
            per_child_plat_auto: AutoAlloc::None,
            ops: None,
            flags: ClassFlags::empty(),
            max_seq: config::DM_MAX_SEQ,
        }
    }

    pub const fn with_hooks(mut self, hooks: &'static dyn ClassOps) -> ClassDriver {
        self.hooks = hooks;
        self
    }

    pub const fn with_priv(mut self, layout: AutoAlloc) -> ClassDriver {
        self.priv_auto = layout;
        self
    }

    pub const fn with_per_device(mut self, layout: AutoAlloc) -> ClassDriver {
        self.per_device_auto = layout;
        self
    }

    pub const fn with_per_device_plat(mut self, layout: AutoAlloc) -> ClassDriver {
        self.per_device_plat_auto = layout;
        self
    }

    pub const fn with_per_child(mut self, layout: AutoAlloc) -> ClassDriver {
        self.per_child_auto = layout;
        self
    }

    pub const fn with_per_child_plat(mut self, layout: AutoAlloc) -> ClassDriver {
        self.per_child_plat_auto = layout;
        self
    }

    pub const fn with_ops(mut self, ops: StaticData) -> ClassDriver {
        self.ops = Some(ops);
        self
    }

    pub const fn with_flags(mut self, flags: ClassFlags) -> ClassDriver {
        self.flags = flags;
        self
    }

    pub const fn with_max_seq(mut self, max_seq: i32) -> ClassDriver {
        self.max_seq = max_seq;
        self
    }
}

/// A live class.
#[derive(Debug)]
pub struct Class {
    pub(crate) driver: &'static ClassDriver,
    pub(crate) priv_data: DataSlot,
    pub(crate) devices: Vec<DeviceId>,
}

impl Class {
    pub fn id(&self) -> ClassId {
        self.driver.id
    }
    pub fn name(&self) -> &'static str {
        self.driver.name
    }
    pub fn driver(&self) -> &'static ClassDriver {
        self.driver
    }
    /// Members in bind order.
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }
    pub fn priv_data<T: Any>(&self) -> Option<&T> {
        self.priv_data.get()
    }
    pub fn priv_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.priv_data.get_mut()
    }
}

impl DriverModel {
    /// Look up a live class without creating it.
    pub fn uclass_find(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(&id).map(|class| &**class)
    }

    /// Return the class for `id`, creating it on first use.
    ///
    /// Fails with [DmError::ClassNotImplemented] if no class driver is registered under `id`.
    pub fn get_class(&mut self, id: ClassId) -> Result<&mut Class> {
        if !self.classes.contains_key(&id) {
            self.uclass_add(id)?;
        }
        self.classes
            .get_mut(&id)
            .map(|class| &mut **class)
            .ok_or(DmError::NotFound)
    }

    pub(crate) fn class(&self, id: ClassId) -> Result<&Class> {
        self.uclass_find(id).map_or(Err(DmError::NotFound), Ok)
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> Result<&mut Class> {
        self.classes
            .get_mut(&id)
            .map(|class| &mut **class)
            .ok_or(DmError::NotFound)
    }

    pub(crate) fn class_driver_of(&self, id: ClassId) -> Result<&'static ClassDriver> {
        Ok(self.class(id)?.driver)
    }

    /// Class-private data of `id`, creating the class if needed.
    pub fn class_get_priv<T: Any>(&mut self, id: ClassId) -> Result<Option<&mut T>> {
        Ok(self.get_class(id)?.priv_data_mut())
    }

    fn uclass_add(&mut self, id: ClassId) -> Result<()> {
        let Some(uc_drv) = self.registry.class_lookup(id) else {
            debug_ex!(
                "Cannot find class for id {:?}: please register a ClassDriver for it",
                id
            );
            return Err(DmError::ClassNotImplemented(id));
        };
        let mut priv_data = DataSlot::Empty;
        priv_data.fill(uc_drv.priv_auto)?;
        self.classes.insert(
            id,
            Box::new(Class {
                driver: uc_drv,
                priv_data,
                devices: Vec::new(),
            }),
        );
        if let Err(err) = uc_drv.hooks.init(self, id) {
            // Dropping the entry releases its private data.
            self.classes.remove(&id);
            return Err(err);
        }
        debug_ex!("Created class '{}'", uc_drv.name);
        Ok(())
    }

    /// Remove and unbind every member, then tear the class down.
    ///
    /// The class is dropped even if its `destroy` hook fails.
    pub fn destroy_class(&mut self, id: ClassId) -> Result<()> {
        // Removing a member may unbind children that belong to this class as
        // well, so take the first member afresh on every round.
        while let Some(&dev) = self.class(id)?.devices.first() {
            self.remove(dev)?;
            self.unbind(dev)?;
        }
        let uc_drv = self.class_driver_of(id)?;
        if let Err(err) = uc_drv.hooks.destroy(self, id) {
            dm_warn!("Class '{}' failed to destroy: {}", uc_drv.name, err);
        }
        self.classes.remove(&id);
        debug_ex!("Destroyed class '{}'", uc_drv.name);
        Ok(())
    }

    /// Destroy every live class.
    pub fn destroy_all_classes(&mut self) -> Result<()> {
        let ids: Vec<ClassId> = self.classes.keys().copied().collect();
        for id in ids {
            // A class may already be gone if a destroy hook tore down another one.
            if self.classes.contains_key(&id) {
                self.destroy_class(id)?;
            }
        }
        Ok(())
    }
}
