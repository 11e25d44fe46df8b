//! Stable handles into the device arena.
//!
//! Devices are stored in a [slab::Slab] and referred to by [DeviceId]: the
//! slot index plus the generation the device was created with. Slots are
//! reused after a device is unbound, and the generation check makes a stale
//! id resolve to nothing instead of to the slot's new occupant.
//! **Consumers must handle the `None` case of every lookup explicitly.**

use core::fmt;

/// Copyable, non-owning reference to a device in a [crate::DriverModel].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    index: usize,
    generation: u32,
}

impl DeviceId {
    pub(crate) const fn new(index: usize, generation: u32) -> DeviceId {
        DeviceId { index, generation }
    }

    pub(crate) const fn index(&self) -> usize {
        self.index
    }

    pub(crate) const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}.{}", self.index, self.generation)
    }
}

/// Identifier of a node in the identity source (a device-tree node offset).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub usize);
