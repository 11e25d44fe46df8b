//! Human-readable listings of the device tree and the classes.

use crate::{DriverModel, handle::DeviceId};
use alloc::string::String;
use core::fmt::{self, Write};

impl DriverModel {
    /// Print every device below the root, one per line.
    pub fn dump_tree(&self, out: &mut dyn Write) -> fmt::Result {
        writeln!(out, " Class      Index  Probed  Driver                Name")?;
        writeln!(out, "-----------------------------------------------------------")?;
        match self.root {
            Some(root) => self.dump_device(out, root, &mut String::new(), true, true),
            None => Ok(()),
        }
    }

    fn dump_device(&self, out: &mut dyn Write, dev: DeviceId, prefix: &mut String, last: bool, top: bool) -> fmt::Result {
        let Ok(d) = self.device(dev) else {
            return Ok(());
        };
        let class = self.uclass_find(d.class);
        let class_name = class.map_or("?", |c| c.name());
        let index = class
            .and_then(|c| c.devices.iter().position(|m| *m == dev))
            .map_or(-1, |i| i as isize);
        let branch = match (top, last) {
            (true, _) => "",
            (false, true) => "`-- ",
            (false, false) => "|-- ",
        };
        writeln!(
            out,
            " {:<10} {:>4}  [ {} ]   {:<20}  {}{}{}",
            class_name,
            index,
            if d.is_active() { '+' } else { ' ' },
            d.driver.name,
            prefix,
            branch,
            d.name
        )?;

        let depth = prefix.len();
        if !top {
            prefix.push_str(if last { "    " } else { "|   " });
        }
        let count = d.children.len();
        for (i, child) in d.children.iter().enumerate() {
            self.dump_device(out, *child, prefix, i + 1 == count, false)?;
        }
        prefix.truncate(depth);
        Ok(())
    }

    /// Print every live class and its members in bind order.
    pub fn dump_classes(&self, out: &mut dyn Write) -> fmt::Result {
        for class in self.classes.values() {
            writeln!(out, "uclass {:?}: {}", class.id(), class.name())?;
            for (i, member) in class.devices.iter().enumerate() {
                let Ok(d) = self.device(*member) else {
                    continue;
                };
                writeln!(
                    out,
                    "  {:>3} {} {} @ seq {} (req {})",
                    i,
                    if d.is_active() { '*' } else { ' ' },
                    d.name,
                    d.seq,
                    d.req_seq
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
