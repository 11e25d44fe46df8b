use alloc::{boxed::Box, vec, vec::Vec};
use core::str;
use thiserror::Error;

pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: impl AsRef<str>, data: impl AsRef<[u8]>) -> Property {
        Property {
            name: Box::from(name.as_ref()),
            data: Box::from(data.as_ref()),
        }
    }

    /// A property without a value, e.g. `u-boot,dm-pre-reloc;`.
    pub fn empty(name: impl AsRef<str>) -> Property {
        Property::new(name, [])
    }

    pub fn with_str(name: impl AsRef<str>, value: &str) -> Property {
        Property::with_strlist(name, &[value])
    }

    pub fn with_strlist(name: impl AsRef<str>, values: &[&str]) -> Property {
        let mut data = vec![];
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        Property::new(name, data)
    }

    pub fn with_u32(name: impl AsRef<str>, value: u32) -> Property {
        Property::new(name, value.to_be_bytes())
    }

    pub fn with_cells(name: impl AsRef<str>, cells: &[u32]) -> Property {
        let data: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        Property::new(name, data)
    }
}

impl Property {
    fn cell(&self, index: usize) -> Result<u32, PropertyError> {
        let st = index * 4;
        let bytes = self
            .data
            .get(st..st + 4)
            .ok_or(PropertyError::InvalidPropFormat)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        self.cell(0)
    }
    pub fn value_as_u64(&self) -> Result<u64, PropertyError> {
        Ok(((self.cell(0)? as u64) << 32) | self.cell(1)? as u64)
    }
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        let raw = str::from_utf8(&self.data).map_err(|_| PropertyError::InvalidPropFormat)?;
        Ok(raw.split('\0').next().unwrap_or(""))
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let slice = &self.data[..];
        let mut st = 0;
        let mut res = vec![];
        for i in 0..slice.len() {
            if slice[i] == 0 {
                res.push(str::from_utf8(&slice[st..i]).map_err(|_| PropertyError::InvalidPropFormat)?);
                st = i + 1;
            }
        }
        if st != slice.len() {
            // last entry not terminated with 0
            res.push(str::from_utf8(&slice[st..]).map_err(|_| PropertyError::InvalidPropFormat)?);
        }
        Ok(res)
    }
    pub fn value_as_cells(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % 4 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        (0..self.data.len() / 4).map(|i| self.cell(i)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("invalid property format")]
    InvalidPropFormat,
    #[error("property not found")]
    PropNotFound,
}
