//! Transaction outpoint type.

use nmcd_consensus::Hash256;

use crate::encoding::{ByteReader, ByteWriter, CodecError, Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn null() -> Self {
        Self {
            hash: [0u8; 32],
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash == [0u8; 32] && self.index == u32::MAX
    }
}

impl Default for OutPoint {
    fn default() -> Self {
        Self::null()
    }
}

impl Serialize for OutPoint {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_hash(&self.hash);
        out.put_u32_le(self.index);
    }
}

impl Deserialize for OutPoint {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            hash: reader.take_hash()?,
            index: reader.take_u32_le()?,
        })
    }
}
