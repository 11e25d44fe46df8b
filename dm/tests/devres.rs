//! Managed resources on the device ledger.

mod common;

use common::*;
use dm::*;
use std::any::Any;

fn other_release(_dev: DeviceId, _res: &mut (dyn Any + Send)) {}

fn bound_device(dm: &mut DriverModel, name: &str) -> DeviceId {
    let root = dm.root().unwrap();
    dm.bind(Some(root), &TEST_DRV, name, None, None).unwrap()
}

#[test]
fn entry_round_trip_and_release_on_unbind() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");

    dm.devres_add(dev, tag_release, Tag("a")).unwrap();
    let found = dm.devres_find(dev, tag_release, None).expect("tracked");
    assert_eq!(found.downcast_ref::<Tag>().map(|t| t.0), Some("a"));
    assert!(dm.devres_find(dev, other_release, None).is_none(), "keyed by release callback");

    dm.unbind(dev).unwrap();
    assert_eq!(take_released(), ["a"]);
}

#[test]
fn remove_releases_only_probe_phase_entries() {
    let mut dm = new_dm();
    let root = dm.root().unwrap();
    let dev = dm.bind(Some(root), &TEST_LEDGER, "ledger", None, None).unwrap();
    dm.probe(dev).unwrap();
    assert_eq!(dm.device(dev).unwrap().ledger().len(), 2);

    dm.remove(dev).unwrap();
    assert_eq!(take_released(), ["probe"]);
    assert_eq!(dm.device(dev).unwrap().ledger().len(), 1);

    dm.probe(dev).unwrap();
    dm.remove(dev).unwrap();
    assert_eq!(take_released(), ["probe"]);

    dm.unbind(dev).unwrap();
    assert_eq!(take_released(), ["bind"]);
}

#[test]
fn release_all_runs_newest_first() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");
    dm.devres_add(dev, tag_release, Tag("first")).unwrap();
    dm.devres_add(dev, tag_release, Tag("second")).unwrap();

    assert_eq!(dm.devres_release_all(dev), Ok(2));
    assert_eq!(take_released(), ["second", "first"]);
    assert!(dm.device(dev).unwrap().ledger().is_empty());
}

#[test]
fn get_finds_or_adds() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");

    let added = dm.devres_get(dev, tag_release, Tag("kept"), None).unwrap();
    assert_eq!(added.downcast_ref::<Tag>().map(|t| t.0), Some("kept"));
    let again = dm.devres_get(dev, tag_release, Tag("dropped"), None).unwrap();
    assert_eq!(again.downcast_ref::<Tag>().map(|t| t.0), Some("kept"));
    assert_eq!(dm.device(dev).unwrap().ledger().len(), 1);
}

#[test]
fn matcher_selects_among_entries_of_a_kind() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");
    dm.devres_add(dev, tag_release, Tag("x")).unwrap();
    dm.devres_add(dev, tag_release, Tag("y")).unwrap();

    let is_x = |res: &(dyn Any + Send)| res.downcast_ref::<Tag>().is_some_and(|t| t.0 == "x");
    let newest = dm.devres_find(dev, tag_release, None).unwrap();
    assert_eq!(newest.downcast_ref::<Tag>().map(|t| t.0), Some("y"));

    dm.devres_release(dev, tag_release, Some(&is_x)).unwrap();
    assert_eq!(take_released(), ["x"]);
    assert!(dm.devres_find(dev, tag_release, Some(&is_x)).is_none());
    assert_eq!(dm.devres_release(dev, tag_release, Some(&is_x)), Err(DmError::NotFound));
}

#[test]
fn remove_and_destroy_skip_the_callback() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");
    dm.devres_add(dev, tag_release, Tag("handed_back")).unwrap();
    dm.devres_add(dev, tag_release, Tag("destroyed")).unwrap();

    let is = |want: &'static str| move |res: &(dyn Any + Send)| res.downcast_ref::<Tag>().is_some_and(|t| t.0 == want);
    let handed_back = is("handed_back");
    let block = dm.devres_remove(dev, tag_release, Some(&handed_back)).expect("removed");
    assert_eq!(block.downcast_ref::<Tag>().map(|t| t.0), Some("handed_back"));

    let destroyed = is("destroyed");
    dm.devres_destroy(dev, tag_release, Some(&destroyed)).unwrap();
    assert_eq!(dm.devres_destroy(dev, tag_release, None), Err(DmError::NotFound));

    assert!(take_released().is_empty());
    assert!(dm.device(dev).unwrap().ledger().is_empty());
}

#[test]
fn managed_zeroed_buffers() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");

    let buf = dm.devm_kzalloc(dev, 64).unwrap();
    assert_eq!(buf.len(), 64);
    assert!(buf.iter().all(|b| *b == 0));
    buf[0] = 0xaa;
    let ptr = buf.as_ptr();
    dm.devm_kzalloc(dev, 8).unwrap();

    dm.devm_kfree(dev, ptr).unwrap();
    assert_eq!(dm.device(dev).unwrap().ledger().len(), 1);
    assert_eq!(dm.devm_kfree(dev, ptr), Err(DmError::NotFound));
}

#[test]
fn raw_alloc_is_tracked_under_its_callback() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");

    dm.devres_alloc(dev, other_release, 12).unwrap()[3] = 1;
    let block = dm.devres_find(dev, other_release, None).unwrap();
    let bytes = block.downcast_ref::<ZeroedBlock>().unwrap();
    assert_eq!(bytes.len(), 12);
    assert_eq!(bytes[3], 1);
}

#[test]
fn stale_device_has_no_ledger() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dev");
    dm.unbind(dev).unwrap();

    assert_eq!(dm.devm_kzalloc(dev, 4).unwrap_err(), DmError::InvalidArgument);
    assert!(dm.devres_find(dev, tag_release, None).is_none());
}

#[test]
fn dump_lists_entries() {
    let mut dm = new_dm();
    let dev = bound_device(&mut dm, "dumped");
    dm.devm_kzalloc(dev, 24).unwrap();
    dm.devres_add(dev, tag_release, Tag("typed")).unwrap();

    let mut out = String::new();
    dm.dump_devres(dev, &mut out).unwrap();

    assert!(out.starts_with("- dumped (2 entries)"), "{out}");
    assert!(out.contains("(24 bytes)"));
    assert!(out.contains("(typed)"));
}
