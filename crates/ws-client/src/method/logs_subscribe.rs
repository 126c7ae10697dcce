//! `logsSubscribe` / `logsUnsubscribe`: transaction log messages.

use helius_common::Signature;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ClientError;
use crate::method::CommitmentLevel;
use crate::subscription::Subscription;

/// Which transactions to receive log messages for.
#[derive(Debug, Clone)]
pub enum LogsSubscribeFilter {
    /// All transactions except simple vote transactions.
    All,
    /// All transactions, simple vote transactions included.
    AllWithVotes,
    /// Only transactions mentioning one of these addresses (base58).
    Mentions(Vec<String>),
}

impl LogsSubscribeFilter {
    fn to_param(&self) -> Value {
        match self {
            Self::All => json!("all"),
            Self::AllWithVotes => json!("allWithVotes"),
            Self::Mentions(addresses) => json!({"mentions": addresses}),
        }
    }
}

/// The `params.result` payload of a `logsNotification`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsNotification {
    pub context: LogsContext,
    pub value: LogsValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsContext {
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsValue {
    pub signature: Signature,
    /// Error value of a failed transaction, `None` on success.
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl Client {
    /// Subscribes to transaction log messages.
    pub async fn logs_subscribe(
        &self,
        filter: LogsSubscribeFilter,
        commitment: Option<CommitmentLevel>,
    ) -> Result<Subscription<LogsNotification>, ClientError> {
        let mut config = Map::new();
        if let Some(commitment) = commitment {
            config.insert("commitment".to_owned(), json!(commitment));
        }
        self.subscribe(
            vec![filter.to_param()],
            Some(config),
            "logsSubscribe",
            "logsUnsubscribe",
        )
        .await
    }
}
