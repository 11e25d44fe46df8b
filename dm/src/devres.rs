//! Managed per-device resources.
//!
//! Every device carries a [Ledger] of entries, each tagged with the release
//! callback that created it. Entries added after the device finished binding
//! belong to its activation and are released when it is removed (or when a
//! probe attempt fails); the rest go when the device is unbound.
//!
//! Matching uses the release callback's identity plus an optional predicate,
//! so independent subsystems can keep their own pools on the same device.

use crate::{
    DriverModel,
    data::{Block, ZeroedBlock},
    device::DeviceFlags,
    error::{DmError, Result},
    handle::DeviceId,
};
use alloc::{boxed::Box, vec::Vec};
use core::{any::Any, fmt};

/// Release callback of a ledger entry. Its address identifies the entry's kind.
pub type ReleaseFn = fn(DeviceId, &mut (dyn Any + Send));

/// Optional predicate narrowing a lookup to one entry of a kind.
pub type Matcher<'a> = Option<&'a dyn Fn(&(dyn Any + Send)) -> bool>;

/// Release callback for plain managed memory; dropping the block is enough.
pub fn devm_release(_dev: DeviceId, _res: &mut (dyn Any + Send)) {}

pub struct LedgerEntry {
    release: ReleaseFn,
    data: Block,
    /// Added after binding completed.
    probe: bool,
}

impl LedgerEntry {
    fn matches(&self, release: ReleaseFn, matcher: Matcher<'_>) -> bool {
        core::ptr::fn_addr_eq(self.release, release) && matcher.is_none_or(|m| m(&*self.data))
    }

    fn release(mut self, dev: DeviceId) {
        (self.release)(dev, &mut *self.data);
    }
}

/// The resource list of one device, oldest entry first.
#[derive(Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, release: ReleaseFn, data: Block, probe: bool) -> &mut LedgerEntry {
        self.entries.push(LedgerEntry { release, data, probe });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /// Newest matching entry.
    fn position(&self, release: ReleaseFn, matcher: Matcher<'_>) -> Option<usize> {
        self.entries.iter().rposition(|e| e.matches(release, matcher))
    }

    /// Release entries in reverse order of acquisition. Return how many went.
    fn release_where(&mut self, dev: DeviceId, pred: impl Fn(&LedgerEntry) -> bool) -> usize {
        let mut released = 0;
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;
            if pred(&self.entries[index]) {
                let entry = self.entries.remove(index);
                debug_ex!("{:?}: devres release {:p}", dev, entry.release);
                entry.release(dev);
                released += 1;
            }
        }
        released
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").field("entries", &self.entries.len()).finish()
    }
}

impl DriverModel {
    fn ledger_push(&mut self, dev: DeviceId, release: ReleaseFn, data: Block) -> Result<&mut LedgerEntry> {
        let d = self.device_mut(dev)?;
        let probe = d.flags.contains(DeviceFlags::BOUND);
        d.ledger.entries.try_reserve(1).map_err(|_| DmError::NoMemory)?;
        Ok(d.ledger.push(release, data, probe))
    }

    /// Track a zero-filled block of `size` bytes on `dev`.
    pub fn devres_alloc(&mut self, dev: DeviceId, release: ReleaseFn, size: usize) -> Result<&mut [u8]> {
        let block = Box::new(ZeroedBlock::new(size)?);
        let entry = self.ledger_push(dev, release, block)?;
        entry
            .data
            .downcast_mut::<ZeroedBlock>()
            .map(|b| &mut **b)
            .ok_or(DmError::Lifecycle("devres entry changed type"))
    }

    /// Track `value` on `dev`.
    pub fn devres_add<T: Any + Send>(&mut self, dev: DeviceId, release: ReleaseFn, value: T) -> Result<&mut T> {
        let entry = self.ledger_push(dev, release, Box::new(value))?;
        entry
            .data
            .downcast_mut::<T>()
            .ok_or(DmError::Lifecycle("devres entry changed type"))
    }

    /// Newest entry created with `release` and accepted by `matcher`.
    pub fn devres_find(&self, dev: DeviceId, release: ReleaseFn, matcher: Matcher<'_>) -> Option<&(dyn Any + Send)> {
        let ledger = &self.device(dev).ok()?.ledger;
        let index = ledger.position(release, matcher)?;
        Some(&*ledger.entries[index].data)
    }

    pub fn devres_find_mut(
        &mut self,
        dev: DeviceId,
        release: ReleaseFn,
        matcher: Matcher<'_>,
    ) -> Option<&mut (dyn Any + Send)> {
        let ledger = &mut self.device_mut(dev).ok()?.ledger;
        let index = ledger.position(release, matcher)?;
        Some(&mut *ledger.entries[index].data)
    }

    /// Find a matching entry, or track `value` if there is none.
    ///
    /// `value` is dropped when an existing entry is returned.
    pub fn devres_get<T: Any + Send>(
        &mut self,
        dev: DeviceId,
        release: ReleaseFn,
        value: T,
        matcher: Matcher<'_>,
    ) -> Result<&mut (dyn Any + Send)> {
        let ledger = &self.device(dev)?.ledger;
        match ledger.position(release, matcher) {
            Some(index) => Ok(&mut *self.device_mut(dev)?.ledger.entries[index].data),
            None => Ok(&mut *self.ledger_push(dev, release, Box::new(value))?.data),
        }
    }

    /// Stop tracking the newest matching entry and hand it back without releasing it.
    pub fn devres_remove(&mut self, dev: DeviceId, release: ReleaseFn, matcher: Matcher<'_>) -> Option<Block> {
        let ledger = &mut self.device_mut(dev).ok()?.ledger;
        let index = ledger.position(release, matcher)?;
        Some(ledger.entries.remove(index).data)
    }

    /// Remove and drop the newest matching entry without calling its release callback.
    pub fn devres_destroy(&mut self, dev: DeviceId, release: ReleaseFn, matcher: Matcher<'_>) -> Result<()> {
        self.devres_remove(dev, release, matcher)
            .map(drop)
            .ok_or(DmError::NotFound)
    }

    /// Remove the newest matching entry and run its release callback.
    pub fn devres_release(&mut self, dev: DeviceId, release: ReleaseFn, matcher: Matcher<'_>) -> Result<()> {
        let ledger = &mut self.device_mut(dev)?.ledger;
        let index = ledger.position(release, matcher).ok_or(DmError::NotFound)?;
        ledger.entries.remove(index).release(dev);
        Ok(())
    }

    /// Managed zeroed buffer, freed with the device.
    pub fn devm_kzalloc(&mut self, dev: DeviceId, size: usize) -> Result<&mut [u8]> {
        self.devres_alloc(dev, devm_release, size)
    }

    /// Free a buffer from [DriverModel::devm_kzalloc] before the device goes away.
    pub fn devm_kfree(&mut self, dev: DeviceId, ptr: *const u8) -> Result<()> {
        let is_ptr = |res: &(dyn Any + Send)| res.downcast_ref::<ZeroedBlock>().is_some_and(|b| b.as_ptr() == ptr);
        self.devres_destroy(dev, devm_release, Some(&is_ptr))
    }

    /// Release every entry acquired after `dev` finished binding.
    pub fn devres_release_probe(&mut self, dev: DeviceId) -> Result<usize> {
        Ok(self.device_mut(dev)?.ledger.release_where(dev, |e| e.probe))
    }

    /// Release every entry of `dev`.
    pub fn devres_release_all(&mut self, dev: DeviceId) -> Result<usize> {
        Ok(self.device_mut(dev)?.ledger.release_where(dev, |_| true))
    }

    /// Print the ledger of `dev`, newest entry last.
    pub fn dump_devres(&self, dev: DeviceId, out: &mut dyn fmt::Write) -> fmt::Result {
        let Ok(d) = self.device(dev) else {
            return writeln!(out, "{:?}: no such device", dev);
        };
        writeln!(out, "- {} ({} entries)", d.name, d.ledger.len())?;
        for entry in d.ledger.entries.iter().take(config::DEVRES_DUMP_LIMIT) {
            let size = entry.data.downcast_ref::<ZeroedBlock>().map(|b| b.len());
            writeln!(
                out,
                "    {:p} {} {}",
                entry.release,
                if entry.probe { "probe" } else { "bind " },
                size.map_or(alloc::string::String::from("(typed)"), |s| alloc::format!("({} bytes)", s)),
            )?;
        }
        Ok(())
    }
}
