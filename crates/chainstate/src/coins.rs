//! Per-transaction records of unspent outputs.

use std::collections::HashMap;

use nmcd_consensus::Hash256;
use nmcd_primitives::encoding::{ByteReader, ByteWriter, CodecError, Deserialize, Serialize};
use nmcd_primitives::transaction::{Transaction, TxOut};

use crate::undo::TxInUndo;

/// The still-unspent outputs of one transaction. Spent slots are `None`;
/// the vector never carries trailing `None` entries, and a record whose
/// outputs are all spent is empty ("pruned").
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Coins {
    pub coinbase: bool,
    pub outputs: Vec<Option<TxOut>>,
    pub height: u32,
    pub version: i32,
}

impl Coins {
    pub fn from_tx(tx: &Transaction, height: u32) -> Self {
        Self {
            coinbase: tx.is_coinbase(),
            outputs: tx.vout.iter().cloned().map(Some).collect(),
            height,
            version: tx.version,
        }
    }

    pub fn clear(&mut self) {
        self.coinbase = false;
        self.outputs = Vec::new();
        self.height = 0;
        self.version = 0;
    }

    /// Re-establish the no-trailing-`None` invariant.
    pub fn cleanup(&mut self) {
        while matches!(self.outputs.last(), Some(None)) {
            self.outputs.pop();
        }
        if self.outputs.is_empty() {
            // Release the allocation along with the last output.
            self.outputs = Vec::new();
        }
    }

    pub fn is_available(&self, index: u32) -> bool {
        (index as usize) < self.outputs.len() && self.outputs[index as usize].is_some()
    }

    pub fn is_pruned(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Mark output `index` spent, capturing it (and, if this empties the
    /// record, the metadata needed to rebuild it) into `undo`. Fails if the
    /// output is not available.
    pub fn spend(&mut self, index: u32, undo: Option<&mut TxInUndo>) -> bool {
        if !self.is_available(index) {
            return false;
        }

        let spent = self.outputs[index as usize]
            .take()
            .expect("available output");
        self.cleanup();

        if let Some(undo) = undo {
            *undo = TxInUndo {
                txout: spent,
                height: 0,
                coinbase: false,
                version: 0,
            };
            if self.outputs.is_empty() {
                undo.height = self.height;
                undo.coinbase = self.coinbase;
                undo.version = self.version;
            }
        }

        true
    }

    /// Length of the availability bitmask for outputs past the first two,
    /// truncated to its last nonzero byte, along with the nonzero byte
    /// count. This fixes the canonical serialized length of the record.
    pub fn calc_mask_size(&self) -> (usize, usize) {
        let mut bytes = 0;
        let mut nonzero = 0;
        let mut b = 0;
        while 2 + b * 8 < self.outputs.len() {
            let mut zero = true;
            for i in 0..8 {
                let pos = 2 + b * 8 + i;
                if pos < self.outputs.len() && self.outputs[pos].is_some() {
                    zero = false;
                    break;
                }
            }
            if !zero {
                bytes = b + 1;
                nonzero += 1;
            }
            b += 1;
        }
        (bytes, nonzero)
    }

    pub fn encode(&self) -> Vec<u8> {
        // Pruned records are erased from the store, never written.
        assert!(!self.is_pruned(), "encoding a pruned coin record");

        let (mask_len, _) = self.calc_mask_size();
        let mut out = Vec::new();
        out.put_i32_le(self.version);

        let mut code = 0u8;
        if self.coinbase {
            code |= 0x01;
        }
        if self.is_available(0) {
            code |= 0x02;
        }
        if self.is_available(1) {
            code |= 0x04;
        }
        out.put_u8(code);

        out.put_compact_size(mask_len as u64);
        for b in 0..mask_len {
            let mut byte = 0u8;
            for i in 0..8 {
                if self.is_available((2 + b * 8 + i) as u32) {
                    byte |= 1 << i;
                }
            }
            out.put_u8(byte);
        }

        for output in self.outputs.iter().flatten() {
            output.serialize(&mut out);
        }
        out.put_u32_le(self.height);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_bytes(bytes)
    }
}

impl Deserialize for Coins {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let version = reader.take_i32_le()?;
        let code = reader.take_u8()?;
        let mask_len = reader.take_compact_size()? as usize;

        let mut available = vec![code & 0x02 != 0, code & 0x04 != 0];
        for _ in 0..mask_len {
            let byte = reader.take_u8()?;
            for i in 0..8 {
                available.push(byte & (1 << i) != 0);
            }
        }
        while available.last() == Some(&false) {
            available.pop();
        }

        let mut outputs = Vec::with_capacity(available.len());
        for present in available {
            if present {
                outputs.push(Some(TxOut::deserialize(reader)?));
            } else {
                outputs.push(None);
            }
        }

        let height = reader.take_u32_le()?;
        Ok(Self {
            coinbase: code & 0x01 != 0,
            outputs,
            height,
            version,
        })
    }
}

/// One staged record plus its relation to the backing layer.
#[derive(Clone, Debug, Default)]
pub struct CoinsCacheEntry {
    pub coins: Coins,
    pub flags: u8,
}

impl CoinsCacheEntry {
    /// The record differs from the backing layer.
    pub const DIRTY: u8 = 1 << 0;
    /// The backing layer holds no non-pruned record for this txid, so a
    /// pruned copy up here never has to propagate down.
    pub const FRESH: u8 = 1 << 1;

    pub fn is_dirty(&self) -> bool {
        self.flags & Self::DIRTY != 0
    }

    pub fn is_fresh(&self) -> bool {
        self.flags & Self::FRESH != 0
    }
}

pub type CoinsMap = HashMap<Hash256, CoinsCacheEntry>;
