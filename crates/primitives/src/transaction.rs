//! Transaction types and serialization.

use nmcd_consensus::Hash256;

use crate::encoding::{ByteReader, ByteWriter, CodecError, Deserialize, Serialize};
use crate::hash::sha256d;
use crate::outpoint::OutPoint;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl Serialize for TxIn {
    fn serialize(&self, out: &mut Vec<u8>) {
        self.prevout.serialize(out);
        out.put_blob(&self.script_sig);
        out.put_u32_le(self.sequence);
    }
}

impl Deserialize for TxIn {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prevout: OutPoint::deserialize(reader)?,
            script_sig: reader.take_blob()?,
            sequence: reader.take_u32_le()?,
        })
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

impl Serialize for TxOut {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_i64_le(self.value);
        out.put_blob(&self.script_pubkey);
    }
}

impl Deserialize for TxOut {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: reader.take_i64_le()?,
            script_pubkey: reader.take_blob()?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub version: i32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout.is_null()
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(&self.to_bytes())
    }

    pub fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Serialized size with a per-input discount so that spending bigger
    /// signatures does not lower priority: each input is credited up to
    /// 41 bytes of fixed layout plus 110 bytes of scriptSig.
    pub fn calculate_modified_size(&self) -> usize {
        let mut size = self.serialized_size();
        for input in &self.vin {
            let offset = 41 + input.script_sig.len().min(110);
            if size > offset {
                size -= offset;
            }
        }
        size
    }

    /// Compress the summed input priority by the modified transaction size.
    pub fn compute_priority(&self, input_priority: f64) -> f64 {
        let size = self.calculate_modified_size();
        if size == 0 {
            return 0.0;
        }
        input_priority / size as f64
    }
}

impl Serialize for Transaction {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_i32_le(self.version);
        out.put_compact_size(self.vin.len() as u64);
        for input in &self.vin {
            input.serialize(out);
        }
        out.put_compact_size(self.vout.len() as u64);
        for output in &self.vout {
            output.serialize(out);
        }
        out.put_u32_le(self.lock_time);
    }
}

impl Deserialize for Transaction {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let version = reader.take_i32_le()?;
        let vin_len = reader.take_compact_size()? as usize;
        let mut vin = Vec::with_capacity(vin_len);
        for _ in 0..vin_len {
            vin.push(TxIn::deserialize(reader)?);
        }
        let vout_len = reader.take_compact_size()? as usize;
        let mut vout = Vec::with_capacity(vout_len);
        for _ in 0..vout_len {
            vout.push(TxOut::deserialize(reader)?);
        }
        let lock_time = reader.take_u32_le()?;
        Ok(Self {
            version,
            vin,
            vout,
            lock_time,
        })
    }
}
