//! Driver registry and the scanners that bind devices from it.
//!
//! Responsibilities:
//! - Hold the static driver, class-driver and device tables ([DriverRegistry]).
//! - Bind devices by driver name ([DriverModel::bind_by_name]) and walk the
//!   static device table ([DriverModel::scan_platform_data]).
//! - Bind devices for identity-source nodes by `compatible` string
//!   ([DriverModel::bind_node], [DriverModel::scan_node], [DriverModel::scan_fdt]).

use crate::{
    DriverModel,
    class::{ClassDriver, ClassId},
    driver::{Driver, DriverInfo},
    error::{DmError, Result},
    handle::{DeviceId, NodeId},
    root::{ROOT_CLASS, ROOT_DRIVER, SIMPLE_BUS_CLASS, SIMPLE_BUS_DRIVER},
};
use alloc::{string::String, vec::Vec};
use spin::Once;

/// Node property allowing a device to bind before relocation.
pub const PRE_RELOC_PROP: &str = "u-boot,dm-pre-reloc";

static BUILTIN_DRIVERS: [&Driver; 2] = [&ROOT_DRIVER, &SIMPLE_BUS_DRIVER];
static BUILTIN_CLASSES: [&ClassDriver; 2] = [&ROOT_CLASS, &SIMPLE_BUS_CLASS];

/// Static tables the driver model binds from.
///
/// Registered entries shadow the built-in root and simple-bus entries of the
/// same name or class. Nothing here changes after start except the one-shot
/// relocation record.
pub struct DriverRegistry {
    drivers: &'static [&'static Driver],
    class_drivers: &'static [&'static ClassDriver],
    driver_info: &'static [DriverInfo],
    reloc: Once<usize>,
}

impl DriverRegistry {
    pub const fn new(
        drivers: &'static [&'static Driver],
        class_drivers: &'static [&'static ClassDriver],
        driver_info: &'static [DriverInfo],
    ) -> DriverRegistry {
        DriverRegistry {
            drivers,
            class_drivers,
            driver_info,
            reloc: Once::new(),
        }
    }

    /// Every driver, registered ones first.
    pub fn drivers(&self) -> impl Iterator<Item = &'static Driver> + '_ {
        self.drivers.iter().chain(BUILTIN_DRIVERS.iter()).copied()
    }

    pub fn driver_lookup_name(&self, name: &str) -> Option<&'static Driver> {
        self.drivers().find(|drv| drv.name == name)
    }

    pub fn class_lookup(&self, id: ClassId) -> Option<&'static ClassDriver> {
        self.class_drivers
            .iter()
            .chain(BUILTIN_CLASSES.iter())
            .copied()
            .find(|uc_drv| uc_drv.id == id)
    }

    /// First driver whose match table lists `compatible`, with the entry's data word.
    pub fn driver_lookup_compatible(&self, compatible: &str) -> Option<(&'static Driver, usize)> {
        self.drivers()
            .find_map(|drv| drv.match_compatible(compatible).map(|data| (drv, data)))
    }

    pub fn driver_info(&self) -> &'static [DriverInfo] {
        self.driver_info
    }

    /// Record the relocation offset. Only the first call has any effect; return whether it did.
    ///
    /// Descriptors are reached through references, which stay valid across
    /// relocation, so nothing is patched.
    pub fn fixup_relocation(&self, offset: usize) -> bool {
        let mut ran = false;
        self.reloc.call_once(|| {
            ran = true;
            offset
        });
        if ran {
            debug_ex!("Driver tables relocated by {:#x}", offset);
        }
        ran
    }

    /// The recorded relocation offset, if relocation has happened.
    pub fn reloc_offset(&self) -> Option<usize> {
        self.reloc.get().copied()
    }
}

impl DriverModel {
    /// Bind the driver named in `info` under `parent`, with its static platform data.
    ///
    /// With `pre_reloc_only`, drivers without [crate::driver::DriverFlags::PRE_RELOC]
    /// are skipped and `Ok(None)` is returned.
    pub fn bind_by_name(
        &mut self,
        parent: Option<DeviceId>,
        pre_reloc_only: bool,
        info: &DriverInfo,
    ) -> Result<Option<DeviceId>> {
        let Some(drv) = self.registry.driver_lookup_name(info.name) else {
            debug_ex!("Cannot find driver '{}'", info.name);
            return Err(DmError::DriverNotFound);
        };
        if pre_reloc_only && !drv.is_pre_reloc() {
            return Ok(None);
        }
        self.bind(parent, drv, info.name, info.platdata, None).map(Some)
    }

    /// Bind the driver `drv_name` under `parent` as a device called `dev_name`.
    pub fn bind_driver(&mut self, parent: DeviceId, drv_name: &str, dev_name: &str) -> Result<DeviceId> {
        self.bind_driver_inner(parent, drv_name, dev_name, None)
    }

    /// Like [DriverModel::bind_driver], attaching the device to `node`.
    pub fn bind_driver_to_node(
        &mut self,
        parent: DeviceId,
        drv_name: &str,
        dev_name: &str,
        node: NodeId,
    ) -> Result<DeviceId> {
        self.bind_driver_inner(parent, drv_name, dev_name, Some(node))
    }

    fn bind_driver_inner(
        &mut self,
        parent: DeviceId,
        drv_name: &str,
        dev_name: &str,
        node: Option<NodeId>,
    ) -> Result<DeviceId> {
        let Some(drv) = self.registry.driver_lookup_name(drv_name) else {
            debug_ex!("Cannot find driver '{}'", drv_name);
            return Err(DmError::DriverNotFound);
        };
        self.bind(Some(parent), drv, dev_name, None, node)
    }

    /// Bind every entry of the static device table under the root.
    ///
    /// Keeps going after a failure and returns the first error seen.
    pub fn scan_platform_data(&mut self, pre_reloc_only: bool) -> Result<()> {
        let root = self.root()?;
        let mut result = Ok(());
        for info in self.registry.driver_info() {
            if let Err(err) = self.bind_by_name(Some(root), pre_reloc_only, info) {
                dm_warn!("No match for driver '{}'", info.name);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Bind the driver matching `node` under `parent`.
    ///
    /// The node's `compatible` strings are tried in order; the first one any
    /// driver lists wins, and that entry's data word becomes the device's
    /// driver data. A node nothing matches is not an error.
    pub fn bind_node(&mut self, parent: DeviceId, node: NodeId, pre_reloc_only: bool) -> Result<Option<DeviceId>> {
        let src = self.identity_source()?;
        let name = String::from(src.node_name(node).ok_or(DmError::InvalidArgument)?);
        let found = src
            .compatible(node)
            .into_iter()
            .find_map(|compat| self.registry.driver_lookup_compatible(compat));
        let Some((drv, data)) = found else {
            debug_ex!("No match for node '{}'", name);
            return Ok(None);
        };
        if pre_reloc_only && src.property(node, PRE_RELOC_PROP).is_none() && !drv.is_pre_reloc() {
            debug_ex!("Skipping device '{}' before relocation", name);
            return Ok(None);
        }
        debug_ex!("Found match for node '{}': driver '{}'", name, drv.name);
        match self.bind_with_driver_data(Some(parent), drv, &name, None, data, Some(node)) {
            Ok(dev) => Ok(Some(dev)),
            Err(err) => {
                dm_warn!("Error binding driver '{}': {}", drv.name, err);
                Err(err)
            }
        }
    }

    /// Bind a device for every enabled subnode of `node`.
    ///
    /// Keeps going after a failure and returns the first error seen.
    pub fn scan_node(&mut self, parent: DeviceId, node: NodeId, pre_reloc_only: bool) -> Result<()> {
        let src = self.identity_source()?;
        let subnodes: Vec<(NodeId, bool)> = src
            .subnodes(node)
            .into_iter()
            .map(|sub| (sub, src.is_enabled(sub)))
            .collect();
        let outer = core::mem::replace(&mut self.pre_reloc_scan, pre_reloc_only);
        let mut result = Ok(());
        for (sub, enabled) in subnodes {
            if !enabled {
                debug_ex!("   - ignoring disabled node {:?}", sub);
                continue;
            }
            if let Err(err) = self.bind_node(parent, sub, pre_reloc_only) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        self.pre_reloc_scan = outer;
        result
    }

    /// Bind devices for the subnodes of the identity source's root node under the root device.
    pub fn scan_fdt(&mut self, pre_reloc_only: bool) -> Result<()> {
        let root = self.root()?;
        let node = self.identity_source()?.root();
        self.scan_node(root, node, pre_reloc_only)
    }
}
