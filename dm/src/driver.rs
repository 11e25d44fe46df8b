//! Driver descriptors and driver hooks.
//!
//! Responsibilities:
//! - Provide the [DriverOps] trait carrying a driver's lifecycle callbacks, and the
//!   [Driver] descriptor tying those callbacks to a name, a class and data layouts.
//! - Provide [DriverInfo], the entry type of the static device table walked by
//!   [crate::DriverModel::scan_platform_data].
//!
//! Descriptors are `'static` data assembled before the driver model starts and
//! never mutated afterwards; see [crate::lists::DriverRegistry].
use crate::{
    DriverModel,
    class::ClassId,
    data::{AutoAlloc, StaticData},
    error::Result,
    handle::DeviceId,
};
use bitflags::bitflags;
use core::fmt::Debug;

/// Lifecycle callbacks implemented by drivers.
///
/// Every method has a no-op default. Hooks receive the driver model itself so
/// that they can reach the device's data blocks, its resource ledger or other
/// devices. An error returned from a hook is propagated verbatim after the
/// calling stage rolls back.
pub trait DriverOps: Sync + Debug {
    /// Called once the device is linked into its parent and class.
    fn bind(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// Activate the device. The parent is already active.
    fn probe(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// Deactivate the device. Children are already removed.
    fn remove(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// Undo [DriverOps::bind] before the device is destroyed.
    fn unbind(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// Decode the device's identity-source node into its platform data.
    fn decode_identity(&self, _dm: &mut DriverModel, _dev: DeviceId) -> Result<()> {
        Ok(())
    }
    /// A child of a device using this driver was bound.
    fn child_post_bind(&self, _dm: &mut DriverModel, _child: DeviceId) -> Result<()> {
        Ok(())
    }
    /// A child of a device using this driver is about to be probed.
    fn child_pre_probe(&self, _dm: &mut DriverModel, _child: DeviceId) -> Result<()> {
        Ok(())
    }
    /// A child of a device using this driver was removed.
    fn child_post_remove(&self, _dm: &mut DriverModel, _child: DeviceId) -> Result<()> {
        Ok(())
    }
}

/// Hook set that does nothing, for drivers and classes without callbacks.
#[derive(Debug)]
pub struct NoOps;

impl DriverOps for NoOps {}

/// One entry of a driver's match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMatch {
    pub compatible: &'static str,
    /// Recorded on the device as its driver data when this entry matches.
    pub data: usize,
}

impl DeviceMatch {
    pub const fn new(compatible: &'static str, data: usize) -> DeviceMatch {
        DeviceMatch { compatible, data }
    }
}

bitflags! {
    /// Driver properties consulted by the binder.
    pub struct DriverFlags: u32 {
        /// The driver may be bound before relocation.
        const PRE_RELOC = 1 << 2;
    }
}

/// Static description of a driver.
#[derive(Debug)]
pub struct Driver {
    pub name: &'static str,
    pub id: ClassId,
    pub of_match: &'static [DeviceMatch],
    pub hooks: &'static dyn DriverOps,
    /// Private data, allocated at probe and released at remove.
    pub priv_auto: AutoAlloc,
    /// Platform data, allocated at bind unless supplied by the caller.
    pub plat_auto: AutoAlloc,
    /// Parent-private data for each child, allocated at the child's probe.
    pub per_child_auto: AutoAlloc,
    /// Parent-platform data for each child, allocated at the child's bind.
    pub per_child_plat_auto: AutoAlloc,
    /// Class-specific operation table, see [DriverModel::device_get_ops].
    pub ops: Option<StaticData>,
    pub flags: DriverFlags,
}

impl Driver {
    pub const fn new(name: &'static str, id: ClassId) -> Driver {
        Driver {
            name,
            id,
            of_match: &[],
            hooks: &NoOps,
            priv_auto: AutoAlloc::None,
            plat_auto: AutoAlloc::None,
            per_child_auto: AutoAlloc::None,
            per_child_plat_auto: AutoAlloc::None,
            ops: None,
            flags: DriverFlags::empty(),
        }
    }

    pub const fn with_hooks(mut self, hooks: &'static dyn DriverOps) -> Driver {
        self.hooks = hooks;
        self
    }

    pub const fn with_match(mut self, of_match: &'static [DeviceMatch]) -> Driver {
        self.of_match = of_match;
        self
    }

    pub const fn with_priv(mut self, layout: AutoAlloc) -> Driver {
        self.priv_auto = layout;
        self
    }

    pub const fn with_plat(mut self, layout: AutoAlloc) -> Driver {
        self.plat_auto = layout;
        self
    }

    pub const fn with_per_child(mut self, layout: AutoAlloc) -> Driver {
        self.per_child_auto = layout;
        self
    }

    pub const fn with_per_child_plat(mut self, layout: AutoAlloc) -> Driver {
        self.per_child_plat_auto = layout;
        self
    }

    pub const fn with_ops(mut self, ops: StaticData) -> Driver {
        self.ops = Some(ops);
        self
    }

    pub const fn with_flags(mut self, flags: DriverFlags) -> Driver {
        self.flags = flags;
        self
    }

    /// Look up `compatible` in the match table and return the entry's data word.
    pub fn match_compatible(&self, compatible: &str) -> Option<usize> {
        self.of_match
            .iter()
            .find(|entry| entry.compatible == compatible)
            .map(|entry| entry.data)
    }

    pub fn is_pre_reloc(&self) -> bool {
        self.flags.contains(DriverFlags::PRE_RELOC)
    }
}

/// Entry of the static device table: bind the driver `name` with `platdata`.
#[derive(Debug, Clone, Copy)]
pub struct DriverInfo {
    pub name: &'static str,
    pub platdata: Option<StaticData>,
}

impl DriverInfo {
    pub const fn new(name: &'static str) -> DriverInfo {
        DriverInfo { name, platdata: None }
    }

    pub const fn with_platdata(name: &'static str, platdata: StaticData) -> DriverInfo {
        DriverInfo {
            name,
            platdata: Some(platdata),
        }
    }
}
