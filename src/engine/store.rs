use std::collections::HashMap;

use crate::model::{Payer, Transaction, TxHandle};

/// Storage of ledger transactions, grouped by payer.
///
/// Stores hold no business rules: they neither order, validate nor deduplicate.
/// Callers mutate stored transactions through the handles they hand out.
pub trait TransactionStore {
    /// Every payer with a borrowed view of its transactions, in insertion order.
    fn all_grouped_by_payer(&self) -> HashMap<&Payer, Vec<&Transaction>>;

    /// Handles of every transaction across all payers.
    fn all(&self) -> Vec<TxHandle>;

    /// Handles of one payer's transactions, empty if the payer is unknown.
    fn by_payer(&self, payer: &Payer) -> Vec<TxHandle>;

    /// Append a transaction to its payer's history.
    fn save(&mut self, transaction: Transaction) -> TxHandle;

    fn get(&self, handle: TxHandle) -> Option<&Transaction>;

    fn get_mut(&mut self, handle: TxHandle) -> Option<&mut Transaction>;
}

/// In-memory store: an append-only arena of transactions plus a per-payer index.
///
/// `all` yields handles in insertion order, so sorts over it break timestamp ties
/// deterministically.
#[derive(Debug, Default)]
pub struct LedgerStore {
    transactions: Vec<Transaction>,
    payers: HashMap<Payer, Vec<TxHandle>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for LedgerStore {
    fn all_grouped_by_payer(&self) -> HashMap<&Payer, Vec<&Transaction>> {
        self.payers
            .iter()
            .map(|(payer, handles)| {
                let transactions: Vec<&Transaction> = handles
                    .iter()
                    .map(|handle| &self.transactions[handle.index()])
                    .collect();
                (payer, transactions)
            })
            .collect()
    }

    fn all(&self) -> Vec<TxHandle> {
        (0..self.transactions.len()).map(TxHandle::new).collect()
    }

    fn by_payer(&self, payer: &Payer) -> Vec<TxHandle> {
        self.payers.get(payer).cloned().unwrap_or_default()
    }

    fn save(&mut self, transaction: Transaction) -> TxHandle {
        let handle = TxHandle::new(self.transactions.len());
        self.payers
            .entry(transaction.payer().clone())
            .or_default()
            .push(handle);
        self.transactions.push(transaction);
        handle
    }

    fn get(&self, handle: TxHandle) -> Option<&Transaction> {
        self.transactions.get(handle.index())
    }

    fn get_mut(&mut self, handle: TxHandle) -> Option<&mut Transaction> {
        self.transactions.get_mut(handle.index())
    }
}
