//! Shared fixtures: test drivers and classes, a hook-call recorder and a
//! capturing logger.

#![allow(dead_code)]

use dm::*;
use dt::{DeviceTree, Property};
use std::{
    cell::RefCell,
    sync::Mutex,
    thread::{self, ThreadId},
};

// ---------------------------------------------------------------------------
// Hook-call recorder. Tests run on separate threads, so the log is per thread.
// ---------------------------------------------------------------------------

thread_local! {
    static CALLS: RefCell<Vec<(&'static str, String)>> = const { RefCell::new(Vec::new()) };
    static RELEASED: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

pub fn record(dm: &DriverModel, event: &'static str, dev: DeviceId) {
    let name = dm.device(dev).map(|d| d.name().to_string()).unwrap_or_default();
    CALLS.with(|calls| calls.borrow_mut().push((event, name)));
}

/// Drain the hook calls recorded on this thread.
pub fn take_calls() -> Vec<(&'static str, String)> {
    CALLS.with(|calls| calls.take())
}

/// Build an expected call list from `(event, device)` pairs.
pub fn calls(expected: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
    expected.iter().map(|(event, name)| (*event, name.to_string())).collect()
}

/// Drain the ledger tags released on this thread.
pub fn take_released() -> Vec<&'static str> {
    RELEASED.with(|released| released.take())
}

/// Ledger entry carrying a tag that is recorded when released.
#[derive(Debug)]
pub struct Tag(pub &'static str);

pub fn tag_release(_dev: DeviceId, res: &mut (dyn std::any::Any + Send)) {
    if let Some(tag) = res.downcast_ref::<Tag>() {
        RELEASED.with(|released| released.borrow_mut().push(tag.0));
    }
}

// ---------------------------------------------------------------------------
// Capturing logger.
// ---------------------------------------------------------------------------

struct CaptureLogger;

static RECORDS: Mutex<Vec<(ThreadId, log::Level, String)>> = Mutex::new(Vec::new());

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS
            .lock()
            .expect("log records")
            .push((thread::current().id(), record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

pub fn init_logger() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

/// Warnings logged by this thread so far.
pub fn warnings() -> Vec<String> {
    let me = thread::current().id();
    RECORDS
        .lock()
        .expect("log records")
        .iter()
        .filter(|(tid, level, _)| *tid == me && *level == log::Level::Warn)
        .map(|(_, _, msg)| msg.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Data blocks.
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TestPriv {
    pub probed: u32,
}

#[derive(Debug, Default)]
pub struct TestPlat {
    pub value: u32,
}

#[derive(Debug, Default)]
pub struct TestClassPriv {
    pub base: u32,
}

#[derive(Debug, Default)]
pub struct ClassState {
    pub inits: u32,
}

#[derive(Debug, Default)]
pub struct ChildPriv {
    pub pre_probed: bool,
}

#[derive(Debug, Default)]
pub struct ChildPlat {
    pub slot: u32,
}

#[derive(Debug)]
pub struct DemoOps {
    pub sides: u32,
}

pub static DEMO_OPS: DemoOps = DemoOps { sides: 4 };
pub static STATIC_PLAT: TestPlat = TestPlat { value: 7 };

// ---------------------------------------------------------------------------
// Hooks.
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RecordingDriver;

impl DriverOps for RecordingDriver {
    fn bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "bind", dev);
        Ok(())
    }
    fn probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "probe", dev);
        if let Some(p) = dm.dev_get_priv_mut::<TestPriv>(dev) {
            p.probed += 1;
        }
        Ok(())
    }
    fn remove(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "remove", dev);
        Ok(())
    }
    fn unbind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "unbind", dev);
        Ok(())
    }
    fn decode_identity(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "decode", dev);
        let value = dm.dev_read_u32_default(dev, "value", 0);
        if let Some(plat) = dm.dev_get_plat_mut::<TestPlat>(dev) {
            plat.value = value;
        }
        Ok(())
    }
    fn child_post_bind(&self, dm: &mut DriverModel, child: DeviceId) -> Result<()> {
        record(dm, "child_post_bind", child);
        Ok(())
    }
    fn child_pre_probe(&self, dm: &mut DriverModel, child: DeviceId) -> Result<()> {
        record(dm, "child_pre_probe", child);
        if let Some(p) = dm.dev_get_parent_priv_mut::<ChildPriv>(child) {
            p.pre_probed = true;
        }
        Ok(())
    }
    fn child_post_remove(&self, dm: &mut DriverModel, child: DeviceId) -> Result<()> {
        record(dm, "child_post_remove", child);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingClass;

impl ClassOps for RecordingClass {
    fn post_bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_post_bind", dev);
        Ok(())
    }
    fn pre_unbind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_pre_unbind", dev);
        Ok(())
    }
    fn pre_probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_pre_probe", dev);
        Ok(())
    }
    fn post_probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_post_probe", dev);
        Ok(())
    }
    fn pre_remove(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_pre_remove", dev);
        Ok(())
    }
    fn child_post_bind(&self, dm: &mut DriverModel, child: DeviceId) -> Result<()> {
        record(dm, "class_child_post_bind", child);
        Ok(())
    }
    fn child_pre_probe(&self, dm: &mut DriverModel, child: DeviceId) -> Result<()> {
        record(dm, "class_child_pre_probe", child);
        Ok(())
    }
    fn init(&self, dm: &mut DriverModel, id: ClassId) -> Result<()> {
        if let Some(state) = dm.class_get_priv::<ClassState>(id)? {
            state.inits += 1;
        }
        Ok(())
    }
}

/// Probe grabs managed memory and then fails.
#[derive(Debug)]
pub struct FailingProbe;

impl DriverOps for FailingProbe {
    fn probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "probe", dev);
        dm.devm_kzalloc(dev, 16)?;
        Err(DmError::Driver("probe failed"))
    }
}

#[derive(Debug)]
pub struct FailingBind;

impl DriverOps for FailingBind {
    fn bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "bind", dev);
        Err(DmError::Driver("bind failed"))
    }
    fn unbind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "unbind", dev);
        Ok(())
    }
}

/// Tracks one ledger entry at bind and another at probe.
#[derive(Debug)]
pub struct LedgerDriver;

impl DriverOps for LedgerDriver {
    fn bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        dm.devres_add(dev, tag_release, Tag("bind"))?;
        Ok(())
    }
    fn probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        dm.devres_add(dev, tag_release, Tag("probe"))?;
        Ok(())
    }
}

/// Bus whose probe activates its first child and then fails.
#[derive(Debug)]
pub struct EagerFailingBus;

impl DriverOps for EagerFailingBus {
    fn probe(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "probe", dev);
        if let Some(child) = dm.device_find_first_child(dev)? {
            dm.probe(child)?;
        }
        Err(DmError::Driver("bus probe failed"))
    }
}

/// Refuses to be unbound.
#[derive(Debug)]
pub struct StubbornUnbind;

impl DriverOps for StubbornUnbind {
    fn unbind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "unbind", dev);
        Err(DmError::Driver("unbind refused"))
    }
}

/// Binds a stubborn child during its own bind, then fails.
#[derive(Debug)]
pub struct FailingBrood;

impl DriverOps for FailingBrood {
    fn bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        dm.bind(Some(dev), &TEST_STUBBORN, "kid", None, None)?;
        Err(DmError::Driver("parent bind failed"))
    }
}

#[derive(Debug)]
pub struct FailingPostBind;

impl ClassOps for FailingPostBind {
    fn post_bind(&self, dm: &mut DriverModel, dev: DeviceId) -> Result<()> {
        record(dm, "class_post_bind", dev);
        Err(DmError::Driver("post_bind failed"))
    }
}

#[derive(Debug)]
pub struct FailingDestroy;

impl ClassOps for FailingDestroy {
    fn destroy(&self, _dm: &mut DriverModel, _id: ClassId) -> Result<()> {
        Err(DmError::Driver("destroy failed"))
    }
}

#[derive(Debug)]
pub struct FailingInit;

impl ClassOps for FailingInit {
    fn init(&self, _dm: &mut DriverModel, _id: ClassId) -> Result<()> {
        Err(DmError::Code(-5))
    }
}

// ---------------------------------------------------------------------------
// Drivers, classes and the registry.
// ---------------------------------------------------------------------------

pub static TEST_DRV: Driver = Driver::new("test_drv", ClassId::Test)
    .with_hooks(&RecordingDriver)
    .with_priv(AutoAlloc::With(zeroed::<TestPriv>))
    .with_plat(AutoAlloc::With(zeroed::<TestPlat>));

pub static TEST_FAIL_PROBE: Driver = Driver::new("test_fail_probe", ClassId::Test)
    .with_hooks(&FailingProbe)
    .with_priv(AutoAlloc::Zeroed(32));

pub static TEST_FAIL_BIND: Driver = Driver::new("test_fail_bind", ClassId::Test).with_hooks(&FailingBind);

pub static TEST_LEDGER: Driver = Driver::new("test_ledger", ClassId::Test).with_hooks(&LedgerDriver);

pub static TEST_BUS: Driver = Driver::new("test_bus", ClassId::TestBus)
    .with_hooks(&RecordingDriver)
    .with_per_child(AutoAlloc::With(zeroed::<ChildPriv>));

pub static TEST_FAIL_BUS: Driver = Driver::new("test_fail_bus", ClassId::TestBus).with_hooks(&FailingProbe);

pub static TEST_EAGER_BUS: Driver = Driver::new("test_eager_bus", ClassId::TestBus).with_hooks(&EagerFailingBus);

pub static TEST_STUBBORN: Driver = Driver::new("test_stubborn", ClassId::Test).with_hooks(&StubbornUnbind);

pub static TEST_BROOD: Driver = Driver::new("test_brood", ClassId::TestBus).with_hooks(&FailingBrood);

pub static TEST_MISC: Driver = Driver::new("test_misc", ClassId::Misc).with_hooks(&RecordingDriver);

pub static TEST_KEYBOARD: Driver = Driver::new("test_keyboard", ClassId::Keyboard);

static TESTFDT_MATCH: [DeviceMatch; 1] = [DeviceMatch::new("testfdt", 0)];

pub static TESTFDT_DRV: Driver = Driver::new("testfdt_drv", ClassId::TestFdt)
    .with_hooks(&RecordingDriver)
    .with_match(&TESTFDT_MATCH);

static DEMO_MATCH: [DeviceMatch; 2] = [DeviceMatch::new("demo-shape", 5), DeviceMatch::new("demo-simple", 6)];

pub static DEMO_SHAPE: Driver = Driver::new("demo_shape", ClassId::Demo)
    .with_hooks(&RecordingDriver)
    .with_match(&DEMO_MATCH)
    .with_plat(AutoAlloc::With(zeroed::<TestPlat>))
    .with_ops(&DEMO_OPS);

static DEMO_PRE_MATCH: [DeviceMatch; 1] = [DeviceMatch::new("demo-pre", 1)];

pub static DEMO_PRE: Driver = Driver::new("demo_pre", ClassId::Demo)
    .with_match(&DEMO_PRE_MATCH)
    .with_flags(DriverFlags::PRE_RELOC);

pub static TEST_TIMER: Driver = Driver::new("test_timer", ClassId::Timer);

pub static TEST_VIDEO: Driver = Driver::new("test_video", ClassId::Video);

/// Driver for a class nobody registered.
pub static ORPHAN_DRV: Driver = Driver::new("orphan_drv", ClassId::Serial);

pub static TEST_CLASS: ClassDriver = ClassDriver::new("test", ClassId::Test)
    .with_hooks(&RecordingClass)
    .with_priv(AutoAlloc::With(zeroed::<ClassState>))
    .with_per_device(AutoAlloc::With(zeroed::<TestClassPriv>));

pub static TEST_BUS_CLASS: ClassDriver = ClassDriver::new("testbus", ClassId::TestBus)
    .with_hooks(&RecordingClass)
    .with_per_child_plat(AutoAlloc::With(zeroed::<ChildPlat>));

pub static TEST_FDT_CLASS: ClassDriver = ClassDriver::new("testfdt", ClassId::TestFdt).with_hooks(&RecordingClass);

pub static DEMO_CLASS: ClassDriver = ClassDriver::new("demo", ClassId::Demo)
    .with_hooks(&RecordingClass)
    .with_flags(ClassFlags::SEQ_ALIAS);

pub static TIMER_CLASS: ClassDriver = ClassDriver::new("timer", ClassId::Timer).with_max_seq(2);

pub static VIDEO_CLASS: ClassDriver = ClassDriver::new("video", ClassId::Video).with_hooks(&FailingInit);

pub static MISC_CLASS: ClassDriver = ClassDriver::new("misc", ClassId::Misc).with_hooks(&FailingPostBind);

pub static KEYBOARD_CLASS: ClassDriver = ClassDriver::new("keyboard", ClassId::Keyboard).with_hooks(&FailingDestroy);

pub static DRIVERS: [&Driver; 17] = [
    &TEST_DRV,
    &TEST_FAIL_PROBE,
    &TEST_FAIL_BIND,
    &TEST_LEDGER,
    &TEST_BUS,
    &TEST_FAIL_BUS,
    &TESTFDT_DRV,
    &DEMO_SHAPE,
    &DEMO_PRE,
    &TEST_TIMER,
    &TEST_VIDEO,
    &ORPHAN_DRV,
    &TEST_EAGER_BUS,
    &TEST_STUBBORN,
    &TEST_BROOD,
    &TEST_MISC,
    &TEST_KEYBOARD,
];

pub static CLASSES: [&ClassDriver; 8] = [
    &TEST_CLASS,
    &TEST_BUS_CLASS,
    &TEST_FDT_CLASS,
    &DEMO_CLASS,
    &TIMER_CLASS,
    &VIDEO_CLASS,
    &MISC_CLASS,
    &KEYBOARD_CLASS,
];

pub static DEVICE_TABLE: [DriverInfo; 2] = [
    DriverInfo::with_platdata("test_drv", &STATIC_PLAT),
    DriverInfo::new("demo_pre"),
];

pub static REGISTRY: DriverRegistry = DriverRegistry::new(&DRIVERS, &CLASSES, &DEVICE_TABLE);

/// A model with only the root device.
pub fn new_dm() -> DriverModel {
    init_logger();
    let dm = DriverModel::init(&REGISTRY, None).expect("init");
    take_calls();
    dm
}

pub fn new_dm_with_tree(tree: DeviceTree) -> DriverModel {
    init_logger();
    let dm = DriverModel::init(&REGISTRY, Some(Box::new(tree))).expect("init");
    take_calls();
    dm
}

pub fn name_of(dm: &DriverModel, dev: DeviceId) -> String {
    dm.device(dev).expect("live device").name().to_string()
}

/// Board description used by the identity-source tests.
///
/// ```text
/// / {
///     aliases { demo1 = "/soc/shape@100"; };
///     soc {
///         compatible = "simple-bus";
///         #address-cells = <1>; #size-cells = <1>;
///         shape@100 { compatible = "vendor,unknown", "demo-shape"; reg = <0x100 0x10>; value = <9>; };
///         shape@200 { compatible = "demo-simple"; status = "disabled"; };
///         shape@300 { compatible = "demo-simple"; status = "okay"; phandle = <5>; };
///         pre@400 { compatible = "demo-pre"; };
///         early@500 { compatible = "demo-shape"; u-boot,dm-pre-reloc; };
///     };
///     consumer { compatible = "testfdt"; shape = <5>; label = "left"; };
///     unknown { compatible = "acme,nothing"; };
/// };
/// ```
pub fn board_tree() -> DeviceTree {
    let mut tree = DeviceTree::new();
    let root = tree.root_id;

    let aliases = tree.add_node(root, "aliases");
    tree.add_property(aliases, Property::with_str("demo1", "/soc/shape@100"));

    let soc = tree.add_node(root, "soc");
    tree.add_property(soc, Property::with_str("compatible", "simple-bus"));
    tree.add_property(soc, Property::with_u32("#address-cells", 1));
    tree.add_property(soc, Property::with_u32("#size-cells", 1));

    let shape = tree.add_node(soc, "shape@100");
    tree.add_property(shape, Property::with_strlist("compatible", &["vendor,unknown", "demo-shape"]));
    tree.add_property(shape, Property::with_cells("reg", &[0x100, 0x10]));
    tree.add_property(shape, Property::with_u32("value", 9));

    let disabled = tree.add_node(soc, "shape@200");
    tree.add_property(disabled, Property::with_str("compatible", "demo-simple"));
    tree.add_property(disabled, Property::with_str("status", "disabled"));

    let target = tree.add_node(soc, "shape@300");
    tree.add_property(target, Property::with_str("compatible", "demo-simple"));
    tree.add_property(target, Property::with_str("status", "okay"));
    tree.add_property(target, Property::with_u32("phandle", 5));

    let pre = tree.add_node(soc, "pre@400");
    tree.add_property(pre, Property::with_str("compatible", "demo-pre"));

    let early = tree.add_node(soc, "early@500");
    tree.add_property(early, Property::with_str("compatible", "demo-shape"));
    tree.add_property(early, Property::empty(PRE_RELOC_PROP));

    let consumer = tree.add_node(root, "consumer");
    tree.add_property(consumer, Property::with_str("compatible", "testfdt"));
    tree.add_property(consumer, Property::with_u32("shape", 5));
    tree.add_property(consumer, Property::with_str("label", "left"));

    let unknown = tree.add_node(root, "unknown");
    tree.add_property(unknown, Property::with_str("compatible", "acme,nothing"));

    tree
}
