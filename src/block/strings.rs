//! Block-local string table indirection

use crate::error::{CodecError, Result};
use crate::model;

/// Read-only view over a block's string table. Slot 0 is reserved and
/// always empty; slots are only meaningful within their own block.
pub(crate) struct StringTable<'a> {
    slots: &'a [Vec<u8>],
}

impl<'a> StringTable<'a> {
    pub fn new(table: &'a model::StringTable) -> StringTable<'a> {
        StringTable { slots: &table.s }
    }

    /// Recovers the string at `index`, replacing invalid UTF-8.
    pub fn get(&self, index: usize) -> Result<String> {
        self.slots
            .get(index)
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .ok_or_else(|| CodecError::Corrupt(format!("string table index {index} out of range")))
    }
}
