//! The driver-model root: the [DriverModel] itself, its built-in drivers and
//! the optional process-wide instance.

use crate::{
    class::{Class, ClassDriver, ClassId, ClassOps},
    data::{AutoAlloc, zeroed},
    device::Device,
    driver::{DeviceMatch, Driver, DriverFlags},
    error::{DmError, Result},
    handle::DeviceId,
    lists::DriverRegistry,
    source::IdentitySource,
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap};
use core::fmt;
use slab::Slab;

/// Driver of the root device.
pub static ROOT_DRIVER: Driver = Driver::new("root_driver", ClassId::Root).with_flags(DriverFlags::PRE_RELOC);

pub static ROOT_CLASS: ClassDriver = ClassDriver::new("root", ClassId::Root);

static SIMPLE_BUS_MATCH: [DeviceMatch; 1] = [DeviceMatch::new("simple-bus", 0)];

/// Transparent bus whose children are described by its node's subnodes.
pub static SIMPLE_BUS_DRIVER: Driver = Driver::new("generic_simple_bus", ClassId::SimpleBus)
    .with_match(&SIMPLE_BUS_MATCH)
    .with_plat(AutoAlloc::With(zeroed::<SimpleBusPlat>))
    .with_flags(DriverFlags::PRE_RELOC);

/// The single window of a simple bus's `ranges`, `<bus-addr cpu-addr size>`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimpleBusPlat {
    pub base: usize,
    pub target: usize,
    pub size: usize,
}

impl SimpleBusPlat {
    /// Map a child's bus address into the window; addresses outside it pass through.
    pub fn translate(&self, addr: usize) -> usize {
        match addr.checked_sub(self.base) {
            Some(off) if off < self.size => self.target.wrapping_add(off),
            _ => addr,
        }
    }
}

pub static SIMPLE_BUS_CLASS: ClassDriver = ClassDriver::new("simple_bus", ClassId::SimpleBus).with_hooks(&SimpleBus);

#[derive(Debug)]
struct SimpleBus;

impl ClassOps for SimpleBus {
    fn post_bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        let Some(node) = dm.device(dev)?.node else {
            return Ok(());
        };
        let ranges = dm
            .identity_source()
            .ok()
            .and_then(|src| src.read_cells(node, "ranges"));
        if let Some([base, target, size, ..]) = ranges.as_deref() {
            if let Some(plat) = dm.dev_get_plat_mut::<SimpleBusPlat>(dev) {
                *plat = SimpleBusPlat {
                    base: *base as usize,
                    target: *target as usize,
                    size: *size as usize,
                };
            }
        }
        let pre_reloc_only = dm.pre_reloc_scan;
        dm.scan_node(dev, node, pre_reloc_only)
    }
}

/// The device graph, the class registry and everything needed to grow them.
///
/// Every operation takes `&mut self`; hooks receive the same reference, so a
/// probe that needs its parent simply recurses.
pub struct DriverModel {
    pub(crate) registry: &'static DriverRegistry,
    pub(crate) classes: BTreeMap<ClassId, Box<Class>>,
    pub(crate) devices: Slab<Device>,
    generation: u32,
    pub(crate) root: Option<DeviceId>,
    pub(crate) source: Option<Box<dyn IdentitySource>>,
    pub(crate) translation_offset: usize,
    /// `pre_reloc_only` of the scan in progress, inherited by bus drivers.
    pub(crate) pre_reloc_scan: bool,
}

impl DriverModel {
    /// An empty model with no root device.
    pub fn new(registry: &'static DriverRegistry, source: Option<Box<dyn IdentitySource>>) -> DriverModel {
        DriverModel {
            registry,
            classes: BTreeMap::new(),
            devices: Slab::new(),
            generation: 0,
            root: None,
            source,
            translation_offset: 0,
            pre_reloc_scan: false,
        }
    }

    /// Create a model and bind and probe its root device.
    pub fn init(registry: &'static DriverRegistry, source: Option<Box<dyn IdentitySource>>) -> Result<DriverModel> {
        let mut dm = DriverModel::new(registry, source);
        let node = dm.source.as_deref().map(|src| src.root());
        let root = dm.bind(None, &ROOT_DRIVER, ROOT_DRIVER.name, None, node)?;
        dm.root = Some(root);
        dm.probe(root)?;
        debug_ex!("Driver model initialised");
        Ok(dm)
    }

    /// [DriverModel::init], then bind the static device table and the identity source.
    pub fn init_and_scan(
        registry: &'static DriverRegistry,
        source: Option<Box<dyn IdentitySource>>,
        pre_reloc_only: bool,
    ) -> Result<DriverModel> {
        let mut dm = DriverModel::init(registry, source)?;
        if let Err(err) = dm.scan_platform_data(pre_reloc_only) {
            debug_ex!("Platform data scan failed: {}", err);
            return Err(err);
        }
        if dm.source.is_some() {
            if let Err(err) = dm.scan_fdt(pre_reloc_only) {
                debug_ex!("Device tree scan failed: {}", err);
                return Err(err);
            }
        }
        Ok(dm)
    }

    /// Remove and unbind the whole tree and destroy every class.
    pub fn uninit(&mut self) -> Result<()> {
        if let Some(root) = self.root {
            self.remove(root)?;
            self.unbind(root)?;
        }
        self.destroy_all_classes()
    }

    pub fn root(&self) -> Result<DeviceId> {
        self.root.ok_or(DmError::Lifecycle("driver model has no root device"))
    }

    pub fn registry(&self) -> &'static DriverRegistry {
        self.registry
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub(crate) fn next_generation(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

impl fmt::Debug for DriverModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverModel")
            .field("root", &self.root)
            .field("devices", &self.devices.len())
            .field("classes", &self.classes.len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Process-wide driver model slot for firmware that needs one.
pub mod global {
    use super::*;
    use spin::Mutex;

    static DM: Mutex<Option<DriverModel>> = Mutex::new(None);

    /// Initialise and scan the global driver model.
    pub fn init(
        registry: &'static DriverRegistry,
        source: Option<Box<dyn IdentitySource>>,
        pre_reloc_only: bool,
    ) -> Result<()> {
        let mut slot = DM.lock();
        if slot.is_some() {
            return Err(DmError::Lifecycle("driver model already initialised"));
        }
        *slot = Some(DriverModel::init_and_scan(registry, source, pre_reloc_only)?);
        Ok(())
    }

    /// Tear the global driver model down and empty the slot.
    pub fn uninit() -> Result<()> {
        let mut slot = DM.lock();
        let dm = slot.as_mut().ok_or(DmError::Lifecycle("driver model not initialised"))?;
        dm.uninit()?;
        *slot = None;
        Ok(())
    }

    /// Run `f` on the global driver model.
    ///
    /// The slot stays locked while `f` runs; `f` must not call back into this module.
    pub fn with<R>(f: impl FnOnce(&mut DriverModel) -> R) -> Result<R> {
        let mut slot = DM.lock();
        let dm = slot.as_mut().ok_or(DmError::Lifecycle("driver model not initialised"))?;
        Ok(f(dm))
    }

    pub fn is_initialised() -> bool {
        DM.lock().is_some()
    }
}
