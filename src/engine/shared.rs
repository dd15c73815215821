use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{Applied, Engine, LedgerError, LedgerStore, TransactionStore};
use crate::Points;
use crate::model::{Command, Payer, SpendSummary, Transaction};

/// Cloneable engine handle for concurrent callers.
///
/// Every operation holds one global lock for its whole duration. A spend reads all
/// payers, so its balance check and its debits must not interleave with any other
/// issue or spend; per-payer locking would let two spends both pass the check
/// against the same balance and overdraw the ledger together. The same lock makes
/// a correction's check see every earlier correction fully applied.
pub struct SharedEngine<S = LedgerStore> {
    inner: Arc<Mutex<Engine<S>>>,
}

impl SharedEngine<LedgerStore> {
    pub fn new() -> Self {
        Self::from(Engine::new())
    }
}

impl<S: TransactionStore> SharedEngine<S> {
    pub fn summary(&self) -> BTreeMap<Payer, Points> {
        self.inner.lock().summary()
    }

    pub fn issue(
        &self,
        payer: &str,
        points: Points,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.inner.lock().issue(payer, points, timestamp)
    }

    pub fn spend(&self, points: Points) -> Result<SpendSummary, LedgerError> {
        self.inner.lock().spend(points)
    }

    pub fn apply(&self, command: Command) -> Result<Applied, LedgerError> {
        self.inner.lock().apply(command)
    }

    /// Run `f` against the engine while holding the lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&Engine<S>) -> R) -> R {
        f(&*self.inner.lock())
    }
}

impl<S> From<Engine<S>> for SharedEngine<S> {
    fn from(engine: Engine<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<S> Clone for SharedEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for SharedEngine<LedgerStore> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::thread;

    fn at(seconds_ago: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 2, 14, 0, 0).unwrap() - Duration::seconds(seconds_ago)
    }

    fn total(summary: &BTreeMap<Payer, Points>) -> Points {
        summary.values().copied().sum()
    }

    #[test]
    fn clones_share_one_ledger() {
        let engine = SharedEngine::new();
        let other = engine.clone();

        engine.issue("dannon", Points::new(300), at(10)).unwrap();
        other.spend(Points::new(100)).unwrap();

        assert_eq!(engine.summary()["DANNON"], Points::new(200));
        assert_eq!(other.with_engine(|e| e.store().len()), 1);
    }

    #[test]
    fn concurrent_spends_never_overdraw() {
        let engine = SharedEngine::new();
        for (idx, payer) in ["DANNON", "UNILEVER", "MILLER COORS", "KRAFT"]
            .into_iter()
            .enumerate()
        {
            engine
                .issue(payer, Points::new(250), at(idx as i64 * 10))
                .unwrap();
        }

        let spent: i64 = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let engine = engine.clone();
                    scope.spawn(move || {
                        let mut spent = 0;
                        for _ in 0..20 {
                            if let Ok(summary) = engine.spend(Points::new(10)) {
                                spent -= summary.iter().map(|d| d.points.value()).sum::<i64>();
                            }
                        }
                        spent
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });

        // 8 * 20 * 10 requested against 1000 available
        assert_eq!(spent, 1000);
        let summary = engine.summary();
        assert_eq!(total(&summary), Points::ZERO);
        assert!(summary.values().all(|balance| !balance.is_negative()));
    }

    #[test]
    fn concurrent_corrections_never_overdraw_a_payer() {
        let engine = SharedEngine::new();
        engine.issue("DANNON", Points::new(100), at(100)).unwrap();

        let accepted = thread::scope(|scope| {
            let workers: Vec<_> = (0..10)
                .map(|_| {
                    let engine = engine.clone();
                    scope.spawn(move || engine.issue("DANNON", Points::new(-30), at(5)).is_ok())
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(accepted, 3);
        assert_eq!(engine.summary()["DANNON"], Points::new(10));
    }

    #[test]
    fn concurrent_issues_all_land() {
        let engine = SharedEngine::new();

        thread::scope(|scope| {
            for worker in 0..4 {
                let engine = engine.clone();
                scope.spawn(move || {
                    for step in 0..25 {
                        engine
                            .issue("dannon", Points::new(1), at(worker * 100 + step))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(engine.summary()["DANNON"], Points::new(100));
        assert_eq!(engine.with_engine(|e| e.transactions("DANNON").count()), 100);
    }
}
