//! Build-time configuration for the driver model.
//!
//! The constants are generated by `build.rs` from `flags.json` at the
//! workspace root, grouped by their Rust type.

#![no_std]
#![deny(missing_docs)]

#[allow(missing_docs)]
mod build_flags {
    include!(concat!(env!("OUT_DIR"), "/build_flags.rs"));
}

/// Highest sequence number (exclusive) a class hands out by default.
pub const DM_MAX_SEQ: i32 = build_flags::DM_MAX_SEQ;

/// Maximum number of ledger entries printed per device by the devres dump.
pub const DEVRES_DUMP_LIMIT: usize = build_flags::DEVRES_DUMP_LIMIT;
