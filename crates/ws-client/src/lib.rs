//! A websocket subscription client for Solana-style JSON-RPC nodes,
//! including the Helius enhanced websocket API.
//!
//! One [`Client`] owns one persistent websocket connection and multiplexes
//! any number of logical subscriptions over it. Each subscription hands the
//! caller a [`Subscription`] handle with its own bounded result stream and a
//! single-slot error channel; the connection is never blocked by a slow
//! consumer (such subscriptions are closed instead).
//!
//! ```no_run
//! use helius_ws_client::{Client, LogsSubscribeFilter};
//!
//! # async fn example() -> Result<(), helius_ws_client::ClientError> {
//! let client = Client::connect("wss://mainnet.helius-rpc.com/?api-key=<key>").await?;
//! let mut logs = client.logs_subscribe(LogsSubscribeFilter::All, None).await?;
//! while let Ok(notification) = logs.recv().await {
//!     println!("{:?}", notification.value.signature);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod error;
mod filters;
mod method;
mod request;
mod response;
mod subscription;

pub use cache::{LruSignatureCache, SignatureCache};
pub use client::{Client, Options};
pub use error::{ClientError, ServerError};
pub use method::logs_subscribe::{LogsContext, LogsNotification, LogsSubscribeFilter, LogsValue};
pub use method::transaction_subscribe::{
    TransactionContainer, TransactionDetails, TransactionEncoding, TransactionMeta,
    TransactionNotification, TransactionSubscribeFilter, TransactionSubscribeOptions,
};
pub use method::CommitmentLevel;
pub use subscription::Subscription;

pub use helius_common::Signature;
