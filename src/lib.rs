pub mod csv;
pub mod engine;
pub mod model;
pub mod points;
pub mod request;

pub use engine::{Engine, LedgerError, SharedEngine};
pub use model::{Command, Payer, SpendSummary, Transaction};
pub use points::Points;
