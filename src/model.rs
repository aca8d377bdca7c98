//! Core data model for Woof.
//!
//! Positions from the location source, walk summaries, bone drops,
//! wallets, and ledger entries. Everything here is plain data; behavior
//! lives in the session, proximity, and rewards modules.

mod drop;
mod ledger;
mod position;
mod walk;

pub use drop::{BoneDrop, DropKind};
pub use ledger::{Transaction, TransactionKind, Wallet};
pub use position::{LocationSample, Position};
pub use walk::{WalkRecord, WalkSummary};
