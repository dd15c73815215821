//! Error types for ledger operations.

use thiserror::Error;

use crate::Points;
use crate::model::Payer;

/// Error returned by [`Engine::issue`](super::Engine::issue) and
/// [`Engine::spend`](super::Engine::spend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The eligible transactions hold fewer points than requested. Nothing was mutated.
    #[error("unable to remove {requested} points when only {available} points are present")]
    InsufficientBalance { available: Points, requested: Points },

    /// The issuance would push the payer's balance past `i64::MAX`.
    #[error("unable to add {points} points to {payer}: balance of {balance} points would overflow")]
    BalanceOverflow {
        payer: Payer,
        balance: Points,
        points: Points,
    },

    /// A correction too large to negate.
    #[error("correction of {points} points is out of range")]
    CorrectionOutOfRange { points: Points },
}
