//! Wallet commands: show, history, redeem.

use clap::Subcommand;
use jiff::Timestamp;

use woof::rewards::{self, Deal, RewardError};
use woof::storage::{Storage, StorageError};

use super::format::{format_time, format_transaction};

#[derive(Debug, Subcommand)]
pub enum WalletCommand {
    /// Show the current balance.
    Show,

    /// List every credit and debit, oldest first.
    History,

    /// Spend bones on a deal.
    Redeem {
        /// How many bones it costs.
        cost: i64,

        /// What you're getting.
        title: String,

        /// Catalog id of the deal, if it has one.
        #[arg(long)]
        deal: Option<String>,
    },
}

pub(super) fn cmd_show(storage: &Storage, user_id: &str) -> Result<(), String> {
    let balance = storage
        .load_wallet(user_id)
        .map_err(|e| format!("failed to load wallet: {e}"))?
        .map_or(0, |w| w.balance);
    let ledger = storage
        .ledger_total(user_id)
        .map_err(|e| format!("failed to load history: {e}"))?;

    println!("{user_id}: {balance} bones");
    if let Some(warning) = reconcile(balance, ledger) {
        tracing::warn!(user_id, balance, ledger, "wallet and ledger disagree");
        eprintln!("Warning: {warning}");
    }
    Ok(())
}

/// A warning when the wallet and the sum of its history differ.
fn reconcile(balance: i64, ledger_total: i64) -> Option<String> {
    (balance != ledger_total)
        .then(|| format!("history adds up to {ledger_total} bones, wallet holds {balance}"))
}

pub(super) fn cmd_history(storage: &Storage, user_id: &str) -> Result<(), String> {
    let ledger = storage
        .list_transactions(user_id)
        .map_err(|e| format!("failed to load history: {e}"))?;

    if ledger.is_empty() {
        println!("No transactions");
        return Ok(());
    }

    for t in &ledger {
        println!("{}  {}", format_time(t.created_at), format_transaction(t));
    }

    Ok(())
}

pub(super) fn cmd_redeem(storage: &Storage, user_id: &str, deal: &Deal) -> Result<(), String> {
    match rewards::redeem(storage, user_id, deal, Timestamp::now()) {
        Ok(balance) => {
            println!(
                "Redeemed {} for {} bones. Balance: {balance}",
                deal.title, deal.bones_cost
            );
            Ok(())
        }
        Err(RewardError::Storage(StorageError::InsufficientBalance { balance, .. })) => {
            Err(format!(
                "not enough bones: {} costs {}, you have {balance}",
                deal.title, deal.bones_cost
            ))
        }
        Err(e) => Err(format!("failed to redeem: {e}")),
    }
}
