//! Undo records for disconnecting blocks.

use nmcd_primitives::encoding::{ByteReader, ByteWriter, CodecError, Deserialize, Serialize};
use nmcd_primitives::transaction::TxOut;

use crate::coins::Coins;

/// Everything needed to restore one spent output. When the spend emptied
/// the record, the record's coinbase flag, height and version ride along so
/// the record itself can be rebuilt.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxInUndo {
    pub txout: TxOut,
    /// Zero unless the spend emptied the record.
    pub height: u32,
    pub coinbase: bool,
    pub version: i32,
}

impl Serialize for TxInUndo {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.height);
        out.put_u8(if self.coinbase { 1 } else { 0 });
        out.put_i32_le(self.version);
        self.txout.serialize(out);
    }
}

impl Deserialize for TxInUndo {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let height = reader.take_u32_le()?;
        let coinbase = reader.take_bool()?;
        let version = reader.take_i32_le()?;
        let txout = TxOut::deserialize(reader)?;
        Ok(Self {
            txout,
            height,
            coinbase,
            version,
        })
    }
}

/// Undo data for one transaction: its spent inputs, in input order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxUndo {
    pub prevouts: Vec<TxInUndo>,
}

impl Serialize for TxUndo {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_compact_size(self.prevouts.len() as u64);
        for prevout in &self.prevouts {
            prevout.serialize(out);
        }
    }
}

impl Deserialize for TxUndo {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let len = reader.take_compact_size()? as usize;
        let mut prevouts = Vec::with_capacity(len);
        for _ in 0..len {
            prevouts.push(TxInUndo::deserialize(reader)?);
        }
        Ok(Self { prevouts })
    }
}

/// Undo data for one block: one entry per non-coinbase transaction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockUndo {
    pub tx_undo: Vec<TxUndo>,
}

impl Serialize for BlockUndo {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_compact_size(self.tx_undo.len() as u64);
        for tx in &self.tx_undo {
            tx.serialize(out);
        }
    }
}

impl Deserialize for BlockUndo {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let len = reader.take_compact_size()? as usize;
        let mut tx_undo = Vec::with_capacity(len);
        for _ in 0..len {
            tx_undo.push(TxUndo::deserialize(reader)?);
        }
        Ok(Self { tx_undo })
    }
}

/// Put a spent output back into its record. Returns false if the state was
/// not what the undo data promised (the metadata was missing or redundant,
/// or the slot was still unspent); the caller treats that as corruption.
pub fn apply_tx_in_undo(undo: TxInUndo, coins: &mut Coins, index: u32) -> bool {
    let mut clean = true;

    if undo.height != 0 {
        // The undo carries metadata, so the record must have been emptied.
        if !coins.is_pruned() {
            clean = false;
        }
        coins.clear();
        coins.coinbase = undo.coinbase;
        coins.height = undo.height;
        coins.version = undo.version;
    } else if coins.is_pruned() {
        clean = false;
    }

    if coins.is_available(index) {
        clean = false;
    }
    if coins.outputs.len() <= index as usize {
        coins.outputs.resize(index as usize + 1, None);
    }
    coins.outputs[index as usize] = Some(undo.txout);

    clean
}
