//! Per-role data blocks carried by devices and classes.
//!
//! A driver declares how a block is produced with [AutoAlloc]; the framework
//! keeps the result in a [DataSlot], whose variant records who owns it.

use crate::error::{DmError, Result};
use alloc::{boxed::Box, vec::Vec};
use core::{
    any::Any,
    fmt::{self, Debug},
    ops::{Deref, DerefMut},
};

/// A heap block owned by the framework or by a driver.
pub type Block = Box<dyn Any + Send>;

/// Caller-owned data that outlives every device, e.g. static platform data.
pub type StaticData = &'static (dyn Any + Send + Sync);

/// Zero-filled block of a declared size.
#[derive(Debug, PartialEq, Eq)]
pub struct ZeroedBlock(Box<[u8]>);

impl ZeroedBlock {
    /// Allocate `size` zero bytes, reporting exhaustion instead of aborting.
    pub fn new(size: usize) -> Result<ZeroedBlock> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| DmError::NoMemory)?;
        buf.resize(size, 0);
        Ok(ZeroedBlock(buf.into_boxed_slice()))
    }
}

impl Deref for ZeroedBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for ZeroedBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// How the framework produces a data block for a device or class.
#[derive(Debug, Clone, Copy, Default)]
pub enum AutoAlloc {
    /// Nothing is allocated.
    #[default]
    None,
    /// A [ZeroedBlock] of the given size; zero means nothing.
    Zeroed(usize),
    /// A typed block built by the given constructor, see [zeroed].
    With(fn() -> Block),
}

impl AutoAlloc {
    pub const fn is_none(&self) -> bool {
        matches!(self, AutoAlloc::None | AutoAlloc::Zeroed(0))
    }

    pub(crate) fn allocate(&self) -> Result<Option<Block>> {
        match self {
            AutoAlloc::None | AutoAlloc::Zeroed(0) => Ok(None),
            AutoAlloc::Zeroed(size) => Ok(Some(Box::new(ZeroedBlock::new(*size)?))),
            AutoAlloc::With(ctor) => Ok(Some(ctor())),
        }
    }
}

/// Constructor for [AutoAlloc::With] producing `T::default()`.
pub fn zeroed<T: Default + Any + Send>() -> Block {
    Box::new(T::default())
}

/// Storage for one data role of a device or class.
#[derive(Default)]
pub enum DataSlot {
    #[default]
    Empty,
    /// Allocated from a declared [AutoAlloc]; the framework releases it.
    Owned(Block),
    /// Supplied by the caller at bind time; never released by the framework.
    Supplied(StaticData),
    /// Installed by the driver itself; the framework leaves it alone on remove.
    Driver(Block),
}

impl DataSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, DataSlot::Empty)
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, DataSlot::Owned(_))
    }

    pub fn is_supplied(&self) -> bool {
        matches!(self, DataSlot::Supplied(_))
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        match self {
            DataSlot::Empty => None,
            DataSlot::Owned(block) | DataSlot::Driver(block) => (**block).downcast_ref::<T>(),
            DataSlot::Supplied(data) => (*data).downcast_ref::<T>(),
        }
    }

    /// Mutable access; static supplied data is read-only.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            DataSlot::Owned(block) | DataSlot::Driver(block) => (**block).downcast_mut::<T>(),
            DataSlot::Empty | DataSlot::Supplied(_) => None,
        }
    }

    /// Allocate from `layout` if the slot is empty. Return whether a block was created.
    pub(crate) fn fill(&mut self, layout: AutoAlloc) -> Result<bool> {
        if !self.is_empty() {
            return Ok(false);
        }
        match layout.allocate()? {
            Some(block) => {
                *self = DataSlot::Owned(block);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop a framework-owned block; other variants are kept.
    pub(crate) fn release_owned(&mut self) {
        if self.is_owned() {
            *self = DataSlot::Empty;
        }
    }
}

impl Debug for DataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSlot::Empty => f.write_str("Empty"),
            DataSlot::Owned(_) => f.write_str("Owned"),
            DataSlot::Supplied(_) => f.write_str("Supplied"),
            DataSlot::Driver(_) => f.write_str("Driver"),
        }
    }
}
