//! Core domain types for the points ledger.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Points;

/// Canonical payer name, always uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Payer(String);

impl Payer {
    pub fn new(name: impl AsRef<str>) -> Self {
        Payer(name.as_ref().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Payer {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a transaction owned by a [`TransactionStore`](crate::engine::TransactionStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHandle(usize);

impl TxHandle {
    pub const fn new(index: usize) -> Self {
        TxHandle(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// One ledger entry: an issuance (positive points) or a correction (negative points).
///
/// Only issuances carry spendable balance. A correction is recorded for history but
/// its remaining balance is always zero; the points it removes are taken from older
/// issuances of the same payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    payer: Payer,
    original_balance: Points,
    remaining_balance: Points,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(payer: Payer, points: Points, timestamp: DateTime<Utc>) -> Self {
        let remaining_balance = if points.is_positive() {
            points
        } else {
            Points::ZERO
        };
        Self {
            payer,
            original_balance: points,
            remaining_balance,
            timestamp,
        }
    }

    pub fn payer(&self) -> &Payer {
        &self.payer
    }

    pub fn original_balance(&self) -> Points {
        self.original_balance
    }

    pub fn remaining_balance(&self) -> Points {
        self.remaining_balance
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Consume `points` of the remaining balance.
    pub(crate) fn debit(&mut self, points: Points) {
        debug_assert!(points <= self.remaining_balance, "debit exceeds remaining balance");
        self.remaining_balance -= points;
    }
}

/// A request the engine can apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record points for a payer; negative points remove the payer's oldest points.
    Issue {
        payer: String,
        points: Points,
        timestamp: DateTime<Utc>,
    },
    /// Spend points across all payers, oldest first.
    Spend { points: Points },
}

/// Points removed from one payer by a spend or correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayerDelta {
    pub payer: Payer,
    pub points: Points,
}

/// Per-payer deltas of a depletion, ordered by each payer's first debit.
///
/// A payer appears at most once and only if it was actually debited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SpendSummary(Vec<PayerDelta>);

impl SpendSummary {
    pub(crate) fn record(&mut self, payer: &Payer, delta: Points) {
        match self.0.iter_mut().find(|entry| &entry.payer == payer) {
            Some(entry) => entry.points += delta,
            None => self.0.push(PayerDelta {
                payer: payer.clone(),
                points: delta,
            }),
        }
    }

    /// Delta recorded for `payer`, if it was debited.
    pub fn get(&self, payer: &str) -> Option<Points> {
        let payer = Payer::new(payer);
        self.0
            .iter()
            .find(|entry| entry.payer == payer)
            .map(|entry| entry.points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PayerDelta> {
        self.0.iter()
    }
}

impl IntoIterator for SpendSummary {
    type Item = PayerDelta;
    type IntoIter = std::vec::IntoIter<PayerDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SpendSummary {
    type Item = &'a PayerDelta;
    type IntoIter = std::slice::Iter<'a, PayerDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for SpendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", entry.payer, entry.points)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn payer_is_uppercased() {
        assert_eq!(Payer::new("dannon"), Payer::new("DANNON"));
        assert_eq!(Payer::new("Miller Coors").as_str(), "MILLER COORS");
    }

    #[test]
    fn payer_lookup_by_str() {
        let mut balances = BTreeMap::new();
        balances.insert(Payer::new("unilever"), Points::new(200));
        assert_eq!(balances.get("UNILEVER"), Some(&Points::new(200)));
    }

    #[test]
    fn issuance_starts_with_full_remaining_balance() {
        let tx = Transaction::new(Payer::new("dannon"), Points::new(300), Utc::now());
        assert_eq!(tx.original_balance(), Points::new(300));
        assert_eq!(tx.remaining_balance(), Points::new(300));
    }

    #[test]
    fn correction_holds_no_balance() {
        let tx = Transaction::new(Payer::new("dannon"), Points::new(-200), Utc::now());
        assert_eq!(tx.original_balance(), Points::new(-200));
        assert_eq!(tx.remaining_balance(), Points::ZERO);
    }

    #[test]
    fn debit_reduces_remaining_only() {
        let mut tx = Transaction::new(Payer::new("dannon"), Points::new(300), Utc::now());
        tx.debit(Points::new(200));
        assert_eq!(tx.remaining_balance(), Points::new(100));
        assert_eq!(tx.original_balance(), Points::new(300));
    }

    #[test]
    fn spend_summary_merges_same_payer() {
        let mut summary = SpendSummary::default();
        summary.record(&Payer::new("dannon"), Points::new(-100));
        summary.record(&Payer::new("unilever"), Points::new(-200));
        summary.record(&Payer::new("dannon"), Points::new(-50));

        assert_eq!(summary.len(), 2);
        assert_eq!(summary.get("DANNON"), Some(Points::new(-150)));
        assert_eq!(summary.get("unilever"), Some(Points::new(-200)));
        assert_eq!(summary.get("MILLER COORS"), None);

        // first-debit order is kept
        let payers: Vec<_> = summary.iter().map(|d| d.payer.as_str()).collect();
        assert_eq!(payers, ["DANNON", "UNILEVER"]);
    }

    #[test]
    fn spend_summary_display() {
        let mut summary = SpendSummary::default();
        summary.record(&Payer::new("dannon"), Points::new(-100));
        summary.record(&Payer::new("unilever"), Points::new(-200));
        assert_eq!(summary.to_string(), "DANNON -100, UNILEVER -200");
    }

    #[test]
    fn spend_summary_serializes_as_payer_points_list() {
        let mut summary = SpendSummary::default();
        summary.record(&Payer::new("dannon"), Points::new(-100));
        summary.record(&Payer::new("unilever"), Points::new(-200));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "payer": "DANNON", "points": -100 },
                { "payer": "UNILEVER", "points": -200 },
            ])
        );
        assert_eq!(serde_json::to_string(&SpendSummary::default()).unwrap(), "[]");
    }
}
