//! Boundary requests and their validation.
//!
//! The engine trusts its inputs; everything it assumes (non-blank payer, present
//! points in range, past timestamps, positive spends) is checked here first.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::Points;
use crate::model::Command;

/// A single rule a request broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payer name is required")]
    MissingPayer,
    #[error("points is required")]
    MissingPoints,
    #[error("timestamp is required")]
    MissingTimestamp,
    #[error("timestamp cannot be in the future")]
    FutureTimestamp,
    #[error("points must be a positive value")]
    NonPositivePoints,
    #[error("points is out of range")]
    PointsOutOfRange,
}

/// Every rule a request broke, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join(.0))]
pub struct RequestError(pub Vec<ValidationError>);

impl RequestError {
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Request to record points for a payer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequest {
    pub payer: Option<String>,
    pub points: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl IssueRequest {
    pub fn validate(self, now: DateTime<Utc>) -> Result<Command, RequestError> {
        let mut errors = Vec::new();

        let payer = self.payer.filter(|payer| !payer.trim().is_empty());
        if payer.is_none() {
            errors.push(ValidationError::MissingPayer);
        }
        match self.points {
            None => errors.push(ValidationError::MissingPoints),
            // a correction must be negatable
            Some(i64::MIN) => errors.push(ValidationError::PointsOutOfRange),
            Some(_) => {}
        }
        match self.timestamp {
            None => errors.push(ValidationError::MissingTimestamp),
            Some(timestamp) if timestamp > now => errors.push(ValidationError::FutureTimestamp),
            Some(_) => {}
        }

        match (payer, self.points, self.timestamp) {
            (Some(payer), Some(points), Some(timestamp)) if errors.is_empty() => {
                Ok(Command::Issue {
                    payer,
                    points: Points::new(points),
                    timestamp,
                })
            }
            _ => Err(RequestError(errors)),
        }
    }
}

/// Request to spend points across all payers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendRequest {
    pub points: Option<i64>,
}

impl SpendRequest {
    pub fn validate(self) -> Result<Command, RequestError> {
        match self.points {
            None => Err(RequestError(vec![ValidationError::MissingPoints])),
            Some(points) if points < 1 => {
                Err(RequestError(vec![ValidationError::NonPositivePoints]))
            }
            Some(points) => Ok(Command::Spend {
                points: Points::new(points),
            }),
        }
    }
}
