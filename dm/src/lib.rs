//! Boot-time driver model.
//!
//! Devices are grouped into classes that share one operation set regardless
//! of the driver behind each device. The [DriverModel] binds devices from a
//! static device table or from an identity source (a device tree), activates
//! them on demand parent-first, and tears them down children-first, releasing
//! every resource tracked on their ledgers.
//!
//! Single-threaded and `no_std`; only the optional [global] slot is shared.

#![no_std]
extern crate alloc;

#[macro_use]
mod logging;

mod bind;
pub mod class;
pub mod data;
pub mod device;
pub mod devres;
pub mod driver;
mod dump;
pub mod error;
mod find;
pub mod handle;
pub mod lists;
mod probe;
pub mod root;
mod seq;
pub mod source;

pub use class::{Class, ClassDriver, ClassFlags, ClassId, ClassOps};
pub use data::{AutoAlloc, Block, DataSlot, StaticData, ZeroedBlock, zeroed};
pub use device::{DataRole, Device, DeviceFlags};
pub use devres::{Ledger, Matcher, ReleaseFn, devm_release};
pub use driver::{DeviceMatch, Driver, DriverFlags, DriverInfo, DriverOps, NoOps};
pub use error::{DmError, Result};
pub use handle::{DeviceId, NodeId};
pub use lists::{DriverRegistry, PRE_RELOC_PROP};
pub use root::{DriverModel, SimpleBusPlat, global};
pub use source::IdentitySource;

#[doc(hidden)]
pub use log as __log;
