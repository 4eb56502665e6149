//! Grandfathered transactions that violate current name rules.

use std::collections::BTreeMap;

use crate::params::{hash256_from_hex, Network};
use crate::Hash256;

/// How a historically mined, rule-violating transaction is handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BugType {
    /// The transaction is valid and all name operations are performed.
    FullyApply,
    /// The outputs enter the UTXO set, but the name operations are
    /// suppressed so the name never shows up in the name database.
    InUtxo,
    /// The outputs do not enter the UTXO set at all; they are immediately
    /// unspendable and the name operations are suppressed.
    FullyIgnore,
}

/// Constant per-network map from (height, txid) to the bug handling mode.
#[derive(Clone, Debug, Default)]
pub struct HistoricBugs {
    entries: BTreeMap<(u32, Hash256), BugType>,
}

impl HistoricBugs {
    pub fn for_network(network: Network) -> Self {
        let mut bugs = Self::default();
        if network == Network::Mainnet {
            // NAME_FIRSTUPDATE operations carried by non-currency
            // transactions; ignored entirely.
            bugs.add(
                98_423,
                "bff3ed6873e5698b97bf0c28c29302b59588590b747787c7d1ef32decdabe0d1",
                BugType::FullyIgnore,
            );
            bugs.add(
                98_424,
                "e9b211007e5cac471769212ca0f47bb066b81966a8e541d44acf0f8a1bd24976",
                BugType::FullyIgnore,
            );
            bugs.add(
                98_425,
                "8aa2b0fc7d1033de28e0192526765a72e9df0c635f7305bdc57cb451ed01a4ca",
                BugType::FullyIgnore,
            );
            // The "d/bitcoin" stealing output is spent later into the
            // "d/wav" stealing, so it has to stay in the UTXO set.
            bugs.add(
                139_872,
                "2f034f2499c136a2c5a922ca4be65c1292815c753bbb100a2a26d5ad532c3919",
                BugType::InUtxo,
            );
            bugs.add(
                139_936,
                "c3e76d5384139228221cce60250397d1b87adf7366086bc8d6b5e6eee03c55c7",
                BugType::FullyIgnore,
            );
        }
        bugs
    }

    fn add(&mut self, height: u32, txid: &str, bug: BugType) {
        let txid = hash256_from_hex(txid).expect("historic bug txid");
        self.entries.insert((height, txid), bug);
    }

    /// Look up whether the given transaction at the given height is a
    /// grandfathered relic; pure lookup, no state involved.
    pub fn is_historic_bug(&self, txid: &Hash256, height: u32) -> Option<BugType> {
        self.entries.get(&(height, *txid)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_table_entries() {
        let bugs = HistoricBugs::for_network(Network::Mainnet);
        assert_eq!(bugs.len(), 5);

        let steal = hash256_from_hex(
            "2f034f2499c136a2c5a922ca4be65c1292815c753bbb100a2a26d5ad532c3919",
        )
        .expect("txid");
        assert_eq!(bugs.is_historic_bug(&steal, 139_872), Some(BugType::InUtxo));
        // Same txid at any other height is not an exception.
        assert_eq!(bugs.is_historic_bug(&steal, 139_873), None);

        let wav = hash256_from_hex(
            "c3e76d5384139228221cce60250397d1b87adf7366086bc8d6b5e6eee03c55c7",
        )
        .expect("txid");
        assert_eq!(
            bugs.is_historic_bug(&wav, 139_936),
            Some(BugType::FullyIgnore)
        );
    }

    #[test]
    fn other_networks_are_clean() {
        assert!(HistoricBugs::for_network(Network::Testnet).is_empty());
        assert!(HistoricBugs::for_network(Network::Regtest).is_empty());

        let steal = hash256_from_hex(
            "2f034f2499c136a2c5a922ca4be65c1292815c753bbb100a2a26d5ad532c3919",
        )
        .expect("txid");
        let bugs = HistoricBugs::for_network(Network::Regtest);
        assert_eq!(bugs.is_historic_bug(&steal, 139_872), None);
    }
}
