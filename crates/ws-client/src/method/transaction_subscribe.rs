//! `transactionSubscribe` / `transactionUnsubscribe`: streamed transactions,
//! part of the Helius enhanced websocket API.

use helius_common::Signature;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ClientError;
use crate::method::CommitmentLevel;
use crate::subscription::Subscription;

/// Which transactions to receive. Unset fields are omitted from the request,
/// leaving the server default in effect.
#[derive(Debug, Clone, Default)]
pub struct TransactionSubscribeFilter {
    pub vote: Option<bool>,
    pub failed: Option<bool>,
    /// Only the transaction with this signature (base58).
    pub signature: Option<String>,
    /// Transactions touching any of these accounts.
    pub account_include: Vec<String>,
    /// Transactions touching none of these accounts.
    pub account_exclude: Vec<String>,
    /// Transactions touching all of these accounts.
    pub account_required: Vec<String>,
}

impl TransactionSubscribeFilter {
    fn to_param(&self) -> Value {
        let mut param = Map::new();
        if let Some(vote) = self.vote {
            param.insert("vote".to_owned(), json!(vote));
        }
        if let Some(failed) = self.failed {
            param.insert("failed".to_owned(), json!(failed));
        }
        if let Some(signature) = &self.signature {
            param.insert("signature".to_owned(), json!(signature));
        }
        if !self.account_include.is_empty() {
            param.insert("accountInclude".to_owned(), json!(self.account_include));
        }
        if !self.account_exclude.is_empty() {
            param.insert("accountExclude".to_owned(), json!(self.account_exclude));
        }
        if !self.account_required.is_empty() {
            param.insert("accountRequired".to_owned(), json!(self.account_required));
        }
        Value::Object(param)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionEncoding {
    #[serde(rename = "base58")]
    Base58,
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64+zstd")]
    Base64Zstd,
    #[serde(rename = "jsonParsed")]
    JsonParsed,
}

/// Level of detail returned for each streamed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDetails {
    Full,
    Signatures,
    Accounts,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionSubscribeOptions {
    pub commitment: Option<CommitmentLevel>,
    pub encoding: Option<TransactionEncoding>,
    pub transaction_details: Option<TransactionDetails>,
    pub show_rewards: Option<bool>,
    pub max_supported_transaction_version: Option<u8>,
}

impl TransactionSubscribeOptions {
    fn to_config(&self) -> Map<String, Value> {
        let mut config = Map::new();
        if let Some(commitment) = self.commitment {
            config.insert("commitment".to_owned(), json!(commitment));
        }
        if let Some(encoding) = self.encoding {
            config.insert("encoding".to_owned(), json!(encoding));
        }
        if let Some(details) = self.transaction_details {
            config.insert("transactionDetails".to_owned(), json!(details));
        }
        if let Some(show_rewards) = self.show_rewards {
            config.insert("showRewards".to_owned(), json!(show_rewards));
        }
        if let Some(version) = self.max_supported_transaction_version {
            config.insert("maxSupportedTransactionVersion".to_owned(), json!(version));
        }
        config
    }
}

/// The `params.result` payload of a `transactionNotification`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionNotification {
    pub transaction: TransactionContainer,
    pub signature: Signature,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionContainer {
    /// Encoded or parsed transaction, depending on the requested encoding.
    pub transaction: Value,
    #[serde(default)]
    pub meta: TransactionMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionMeta {
    pub err: Option<Value>,
    pub fee: u64,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub log_messages: Vec<String>,
    pub compute_units_consumed: u64,
}

impl Client {
    /// Subscribes to streamed transactions matching `filter`.
    pub async fn transaction_subscribe(
        &self,
        filter: TransactionSubscribeFilter,
        options: TransactionSubscribeOptions,
    ) -> Result<Subscription<TransactionNotification>, ClientError> {
        self.subscribe(
            vec![filter.to_param()],
            Some(options.to_config()),
            "transactionSubscribe",
            "transactionUnsubscribe",
        )
        .await
    }
}
