//! Sequence-number resolution.

use crate::{
    DriverModel,
    error::{DmError, Result},
    handle::DeviceId,
};

impl DriverModel {
    /// Pick the sequence number `dev` gets on its first activation.
    ///
    /// The requested number wins if no other member of the class holds it;
    /// otherwise the lowest number below the class maximum that no member
    /// holds is used. A conflict with the requested number is logged.
    pub fn resolve_sequence(&self, dev: DeviceId) -> Result<i32> {
        let d = self.device(dev)?;
        if d.seq != -1 {
            return Err(DmError::Lifecycle("sequence number already resolved"));
        }
        let class = self.class(d.class)?;
        let holder = |seq: i32| {
            class
                .devices
                .iter()
                .filter_map(|member| self.device(*member).ok())
                .find(|member| member.seq == seq)
        };

        if d.req_seq >= 0 {
            match holder(d.req_seq) {
                Some(dup) => dm_warn!("Device '{}': seq {} is in use by '{}'", d.name, d.req_seq, dup.name),
                None => return Ok(d.req_seq),
            }
        }

        (0..class.driver.max_seq)
            .find(|seq| holder(*seq).is_none())
            .ok_or(DmError::SequenceExhausted)
    }
}
