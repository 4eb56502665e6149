//! Transaction primitives and consensus serialization.

pub mod encoding;
pub mod hash;
pub mod namescript;
pub mod outpoint;
pub mod transaction;

pub use hash::{sha256, sha256d};
pub use namescript::{NameOp, NameScript};
pub use outpoint::OutPoint;
pub use transaction::{Transaction, TxIn, TxOut};
