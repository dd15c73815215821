//! Points ledger engine.
//!
//! The engine records point transactions per payer, reports balances and spends
//! points oldest first across payers. Debits are planned against a read-only view
//! and applied only once the whole request is known to be covered, so a rejected
//! request leaves the ledger untouched.
//! Also supports async stream of commands.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Points;
use crate::model::{Command, Payer, SpendSummary, Transaction, TxHandle};

mod store;
pub use store::{LedgerStore, TransactionStore};

mod error;
pub use error::LedgerError;

mod shared;
pub use shared::SharedEngine;

/// Result of applying a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Issued(Transaction),
    Spent(SpendSummary),
}

/// A planned debit of one stored transaction.
#[derive(Debug)]
struct Debit {
    handle: TxHandle,
    payer: Payer,
    points: Points,
}

/// The points ledger engine.
///
/// Owns its store; every mutation goes through `&mut self`, so callers sharing an
/// engine must serialize access (see [`SharedEngine`]).
pub struct Engine<S = LedgerStore> {
    store: S,
}

impl Engine<LedgerStore> {
    pub fn new() -> Self {
        Self::with_store(LedgerStore::new())
    }
}

/// Public API
impl<S: TransactionStore> Engine<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the engine with the given command stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a rejected command must not stop the engine
            let _ = self.apply(command);
        }
    }

    /// Current balance of every known payer, including payers drained to zero.
    pub fn summary(&self) -> BTreeMap<Payer, Points> {
        self.store
            .all_grouped_by_payer()
            .into_iter()
            .map(|(payer, transactions)| {
                let balance: Points = transactions
                    .iter()
                    .map(|tx| tx.remaining_balance())
                    .sum();
                (payer.clone(), balance)
            })
            .collect()
    }

    /// Transactions recorded for `payer`, in insertion order.
    pub fn transactions(&self, payer: &str) -> impl Iterator<Item = &Transaction> {
        self.store
            .by_payer(&Payer::new(payer))
            .into_iter()
            .filter_map(move |handle| self.store.get(handle))
    }

    /// Record `points` for `payer`.
    ///
    /// Negative points are a correction: they remove that many points from the
    /// payer's oldest issuances and are stored with no balance of their own. A
    /// correction the payer cannot cover is rejected and not stored.
    ///
    /// The sufficiency check reads balances already reduced by earlier calls. That
    /// is only sound while no other call mutates the store concurrently, which
    /// `&mut self` guarantees here and [`SharedEngine`] guarantees across threads.
    ///
    /// An issuance that would take the payer's balance past `i64::MAX` is rejected,
    /// as is a correction of `i64::MIN` points.
    pub fn issue(
        &mut self,
        payer: &str,
        points: Points,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let transaction = Transaction::new(Payer::new(payer), points, timestamp);
        let handles = self.store.by_payer(transaction.payer());

        if points.is_negative() {
            let amount = points
                .checked_neg()
                .ok_or(LedgerError::CorrectionOutOfRange { points })?;
            self.deplete(&handles, amount)?;
        } else {
            let balance = self.balance_of(&handles);
            if balance.checked_add(points).is_none() {
                return Err(LedgerError::BalanceOverflow {
                    payer: transaction.payer().clone(),
                    balance,
                    points,
                });
            }
        }

        self.store.save(transaction.clone());
        Ok(transaction)
    }

    /// Spend `points` across all payers, oldest transactions first.
    ///
    /// Returns the negative delta applied to each debited payer. Non-positive
    /// amounts are a no-op and do not touch the store.
    pub fn spend(&mut self, points: Points) -> Result<SpendSummary, LedgerError> {
        if !points.is_positive() {
            return Ok(SpendSummary::default());
        }

        let handles = self.store.all();
        self.deplete(&handles, points)
    }

    /// Apply a single command on top of the current ledger state
    pub fn apply(&mut self, command: Command) -> Result<Applied, LedgerError> {
        match command {
            Command::Issue {
                payer,
                points,
                timestamp,
            } => {
                let result = self.issue(&payer, points, timestamp);
                Self::log_result("issue", Some(&payer), points, &result);
                result.map(Applied::Issued)
            }
            Command::Spend { points } => {
                let result = self.spend(points);
                match &result {
                    Ok(summary) => info!(points = %points, debits = %summary, "spend applied"),
                    Err(_) => Self::log_result("spend", None, points, &result),
                }
                result.map(Applied::Spent)
            }
        }
    }
}

/// Private API
impl<S: TransactionStore> Engine<S> {
    /// Small helper to log `apply` results
    fn log_result<T>(
        command: &str,
        payer: Option<&str>,
        points: Points,
        result: &Result<T, LedgerError>,
    ) {
        match (result, payer) {
            (Ok(_), Some(payer)) => {
                info!(
                    payer = %Payer::new(payer),
                    points = %points,
                    "{command} applied"
                );
            }
            (Ok(_), None) => {
                info!(points = %points, "{command} applied");
            }
            (Err(e), Some(payer)) => {
                info!(
                    payer = %Payer::new(payer),
                    points = %points,
                    reason = %e,
                    "{command} rejected"
                );
            }
            (Err(e), None) => {
                info!(points = %points, reason = %e, "{command} rejected");
            }
        }
    }

    /// Remaining balance held by `handles`; one payer's balance always fits in `i64`.
    fn balance_of(&self, handles: &[TxHandle]) -> Points {
        handles
            .iter()
            .filter_map(|&handle| self.store.get(handle))
            .map(|tx| tx.remaining_balance())
            .sum()
    }

    /// Remove `amount` points from the given transactions, oldest first.
    fn deplete(
        &mut self,
        handles: &[TxHandle],
        amount: Points,
    ) -> Result<SpendSummary, LedgerError> {
        let debits = self.plan_depletion(handles, amount)?;
        Ok(self.apply_debits(debits))
    }

    /// Work out which transactions cover `amount` without mutating the store:
    /// - Fail if the transactions hold less than `amount` in total
    /// - Keep transactions with a balance left, oldest first (ties keep store order)
    /// - Take from each until `amount` is covered
    fn plan_depletion(
        &self,
        handles: &[TxHandle],
        amount: Points,
    ) -> Result<Vec<Debit>, LedgerError> {
        let mut eligible: Vec<(TxHandle, &Transaction)> = handles
            .iter()
            .filter_map(|&handle| self.store.get(handle).map(|tx| (handle, tx)))
            .collect();

        // balances of several payers can add up past i64::MAX
        let available: i128 = eligible
            .iter()
            .map(|(_, tx)| i128::from(tx.remaining_balance().value()))
            .sum();
        if available < i128::from(amount.value()) {
            return Err(LedgerError::InsufficientBalance {
                // below `amount`, so it fits
                available: Points::new(i64::try_from(available).unwrap_or(i64::MAX)),
                requested: amount,
            });
        }

        eligible.retain(|(_, tx)| tx.remaining_balance().is_positive());
        eligible.sort_by_key(|(_, tx)| tx.timestamp());

        let mut to_remove = amount;
        let mut debits = Vec::new();
        for (handle, tx) in eligible {
            if to_remove == Points::ZERO {
                break;
            }
            let take = to_remove.min(tx.remaining_balance());
            to_remove -= take;
            debits.push(Debit {
                handle,
                payer: tx.payer().clone(),
                points: take,
            });
        }

        Ok(debits)
    }

    /// Apply planned debits to the stored transactions.
    fn apply_debits(&mut self, debits: Vec<Debit>) -> SpendSummary {
        let mut summary = SpendSummary::default();
        for debit in debits {
            // handles were planned against this store under the same borrow
            if let Some(tx) = self.store.get_mut(debit.handle) {
                tx.debit(debit.points);
                summary.record(&debit.payer, -debit.points);
            }
        }
        summary
    }
}

impl Default for Engine<LedgerStore> {
    fn default() -> Self {
        Self::new()
    }
}
