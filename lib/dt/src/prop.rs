use alloc::{boxed::Box, vec::Vec};
use core::str;
use utils::endian::{BigEndian32, EndianData};

/// A named property of a device tree node. `data` keeps the raw big endian encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: &str, data: &[u8]) -> Property {
        Property {
            name: Box::from(name),
            data: Box::from(data),
        }
    }

    fn cell_at(&self, index: usize) -> Result<BigEndian32, PropertyError> {
        let start = index * size_of::<u32>();
        let bytes = self
            .data
            .get(start..start + size_of::<u32>())
            .ok_or(PropertyError::InvalidPropFormat)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(BigEndian32::from_raw_bytes(raw))
    }
}

impl Property {
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        Ok(self.cell_at(0)?.value())
    }

    /// All 32-bit cells of the property. Trailing bytes that do not form a full cell are rejected.
    pub fn value_as_cells(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % size_of::<u32>() != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        (0..self.data.len() / size_of::<u32>())
            .map(|idx| self.cell_at(idx).map(|cell| cell.value()))
            .collect()
    }

    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        str::from_utf8(&self.data)
            .map(|s| s.trim_end_matches('\0'))
            .map_err(|_| PropertyError::InvalidPropFormat)
    }

    /// Split a `\0` separated string list, e.g. `compatible`.
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let data: &[u8] = &self.data;
        let data = data.strip_suffix(&[0]).unwrap_or(data);
        if data.is_empty() {
            return Ok(Vec::new());
        }
        data.split(|byte| *byte == 0)
            .map(|item| str::from_utf8(item).map_err(|_| PropertyError::InvalidPropFormat))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
}
