//! Typed wrappers over [`Client::subscribe`](crate::Client::subscribe), one
//! module per subscription method.

pub mod logs_subscribe;
pub mod transaction_subscribe;

use serde::{Deserialize, Serialize};

/// How finalized a block must be before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}
