//! Layered coin and name state cache between validation and storage.

pub mod cache;
pub mod coins;
pub mod db;
pub mod memusage;
pub mod names;
pub mod undo;
pub mod view;

pub use cache::{CoinsModifier, CoinsViewCache};
pub use coins::{Coins, CoinsCacheEntry, CoinsMap};
pub use db::CoinsViewDb;
pub use names::{
    name_history_enabled, set_name_history_enabled, ExpireEntry, Name, NameCache, NameData,
    NameHistory, NameIterator,
};
pub use undo::{apply_tx_in_undo, BlockUndo, TxInUndo, TxUndo};
pub use view::{CoinsStats, CoinsView, CoinsViewBacked};
