//! Approximate heap usage of cached coin records.

use std::mem;

use nmcd_primitives::transaction::TxOut;

use crate::coins::Coins;

/// Bytes held on the heap by one coin record. The caller uses the running
/// total to decide when to flush a cache layer, so a close estimate is
/// enough.
pub fn coins_usage(coins: &Coins) -> usize {
    let mut total = coins.outputs.capacity() * mem::size_of::<Option<TxOut>>();
    for output in coins.outputs.iter().flatten() {
        total += output.script_pubkey.capacity();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_has_no_usage() {
        assert_eq!(coins_usage(&Coins::default()), 0);
    }

    #[test]
    fn usage_grows_with_scripts() {
        let small = Coins {
            coinbase: false,
            outputs: vec![Some(TxOut {
                value: 1,
                script_pubkey: vec![0; 4],
            })],
            height: 0,
            version: 1,
        };
        let large = Coins {
            coinbase: false,
            outputs: vec![Some(TxOut {
                value: 1,
                script_pubkey: vec![0; 4_000],
            })],
            height: 0,
            version: 1,
        };
        assert!(coins_usage(&large) > coins_usage(&small));
    }
}
