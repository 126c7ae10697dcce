//! Fast-path scans over raw notification bytes.
//!
//! Full JSON parsing of every notification is wasteful when the dispatcher
//! only needs the subscription id and a keep/drop decision. These filters
//! scan fixed byte ranges derived from the upstream server's canonical
//! field ordering. They are advisory: a miss falls back to generic JSON
//! lookup, so a format change degrades performance, not correctness.
//!
//! The window constants are wire-format assumptions. Do not "fix" them
//! without comparing against live server output.

use std::collections::HashMap;

use helius_common::Signature;

pub(crate) const TRANSACTION_NOTIFICATION: &str = "transactionNotification";
pub(crate) const LOGS_NOTIFICATION: &str = "logsNotification";

pub(crate) type SubIdRetrievalFn = fn(&[u8]) -> Option<u64>;
pub(crate) type TxDiscarderFn = fn(&[u8]) -> bool;
pub(crate) type SignatureRetrievalFn = fn(&[u8]) -> Option<Signature>;

/// Per-method scan strategies, resolved once per inbound frame.
#[derive(Default)]
pub(crate) struct FilterTables {
    pub sub_id_retrievals: HashMap<&'static str, SubIdRetrievalFn>,
    pub tx_discarders: HashMap<&'static str, TxDiscarderFn>,
    pub signature_retrievals: HashMap<&'static str, SignatureRetrievalFn>,
}

pub(crate) fn default_sub_id_retrievals() -> HashMap<&'static str, SubIdRetrievalFn> {
    HashMap::from([
        (
            TRANSACTION_NOTIFICATION,
            transaction_notification_sub_id as SubIdRetrievalFn,
        ),
        (
            LOGS_NOTIFICATION,
            logs_notification_sub_id as SubIdRetrievalFn,
        ),
    ])
}

pub(crate) fn default_tx_discarders() -> HashMap<&'static str, TxDiscarderFn> {
    HashMap::from([(LOGS_NOTIFICATION, logs_notification_discard as TxDiscarderFn)])
}

pub(crate) fn default_signature_retrievals() -> HashMap<&'static str, SignatureRetrievalFn> {
    HashMap::from([
        (
            LOGS_NOTIFICATION,
            logs_notification_signature as SignatureRetrievalFn,
        ),
        (
            TRANSACTION_NOTIFICATION,
            transaction_notification_signature as SignatureRetrievalFn,
        ),
    ])
}

const SUBSCRIPTION_KEY: &[u8] = br#""subscription":"#;
const SIGNATURE_KEY: &[u8] = br#""signature":""#;
const ERR_KEY: &[u8] = br#""err":"#;

/// Value delimiters in compact and pretty-printed JSON alike.
const DELIMITERS: &[u8] = b" ,]}";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// Reads the integer between `bytes[0]` and the next delimiter.
fn parse_u64_prefix(bytes: &[u8]) -> Option<u64> {
    let end = bytes.iter().position(|b| DELIMITERS.contains(b))?;
    std::str::from_utf8(trim(&bytes[..end])).ok()?.parse().ok()
}

/// The subscription id occurs once, near the start of a
/// `transactionNotification` in the current Helius format.
fn transaction_notification_sub_id(message: &[u8]) -> Option<u64> {
    const CHUNK_END: usize = 128;
    if message.len() < CHUNK_END {
        return None;
    }
    let chunk = &message[60..CHUNK_END];
    let at = find(chunk, SUBSCRIPTION_KEY)?;
    parse_u64_prefix(&chunk[at + SUBSCRIPTION_KEY.len()..])
}

/// The subscription id occurs once, at the end of a `logsNotification` in
/// the current Solana RPC format.
fn logs_notification_sub_id(message: &[u8]) -> Option<u64> {
    let chunk_size = message.len().min(64);
    let chunk = &message[message.len() - chunk_size..];
    let at = find(chunk, SUBSCRIPTION_KEY)?;
    parse_u64_prefix(&chunk[at + SUBSCRIPTION_KEY.len()..])
}

/// True when the notification reports a failed transaction (`"err"` holds
/// anything but `null`).
fn logs_notification_discard(message: &[u8]) -> bool {
    const CHUNK_START: usize = 192;
    const CHUNK_SIZE: usize = 64;
    if message.len() < CHUNK_START + CHUNK_SIZE {
        return false;
    }
    let chunk = &message[CHUNK_START..CHUNK_START + CHUNK_SIZE];
    let Some(at) = find(chunk, ERR_KEY) else {
        return false;
    };
    let after = &chunk[at + ERR_KEY.len()..];
    let Some(end) = after.iter().position(|b| DELIMITERS.contains(b)) else {
        return false;
    };
    trim(&after[..end]) != b"null"
}

fn signature_in_chunk(chunk: &[u8]) -> Option<Signature> {
    let at = find(chunk, SIGNATURE_KEY)?;
    let after = &chunk[at + SIGNATURE_KEY.len()..];
    let end = after.iter().position(|&b| b == b'"')?;
    std::str::from_utf8(trim(&after[..end])).ok()?.parse().ok()
}

fn logs_notification_signature(message: &[u8]) -> Option<Signature> {
    const CHUNK_START: usize = 96;
    const CHUNK_SIZE: usize = 128;
    if message.len() < CHUNK_START + CHUNK_SIZE {
        return None;
    }
    signature_in_chunk(&message[CHUNK_START..CHUNK_START + CHUNK_SIZE])
}

fn transaction_notification_signature(message: &[u8]) -> Option<Signature> {
    const CHUNK_SIZE: usize = 128;
    if message.len() < CHUNK_SIZE {
        return None;
    }
    signature_in_chunk(&message[message.len() - CHUNK_SIZE..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signature() -> (Signature, String) {
        let signature = Signature([7u8; 64]);
        let encoded = signature.to_string();
        (signature, encoded)
    }

    /// A `logsNotification` in the canonical Solana field order. The helper
    /// asserts the offset assumptions the filters rely on.
    fn logs_notification(signature: &str, err: &str, subscription: u64) -> Vec<u8> {
        let logs = r#""Program 11111111111111111111111111111111 invoke [1]","Program 11111111111111111111111111111111 success""#;
        let message = format!(
            r#"{{"jsonrpc":"2.0","method":"logsNotification","params":{{"result":{{"context":{{"slot":5208469}},"value":{{"signature":"{signature}","err":{err},"logs":[{logs}]}}}},"subscription":{subscription}}}}}"#,
        );
        let message = message.into_bytes();
        let sig_at = find(&message, SIGNATURE_KEY).unwrap();
        assert!((96..224 - SIGNATURE_KEY.len()).contains(&sig_at));
        let err_at = find(&message, ERR_KEY).unwrap();
        assert!((192..256 - ERR_KEY.len()).contains(&err_at));
        assert!(message.len() >= 256);
        message
    }

    /// A `transactionNotification` in the canonical Helius field order.
    fn transaction_notification(subscription: u64, signature: &str) -> Vec<u8> {
        let message = format!(
            r#"{{"jsonrpc":"2.0","method":"transactionNotification","params":{{"subscription":{subscription},"result":{{"transaction":{{"transaction":["AAAA","base64"],"meta":{{"err":null,"fee":5000,"preBalances":[28279852264,158122684],"postBalances":[28279847264,158122684]}}}},"signature":"{signature}"}}}}}}"#,
        );
        let message = message.into_bytes();
        let sub_at = find(&message, SUBSCRIPTION_KEY).unwrap();
        assert!((60..128 - SUBSCRIPTION_KEY.len()).contains(&sub_at));
        message
    }

    #[test]
    fn transaction_sub_id_hit() {
        let (_, signature) = sample_signature();
        let message = transaction_notification(4743323479349712, &signature);
        assert_eq!(
            transaction_notification_sub_id(&message),
            Some(4743323479349712)
        );
    }

    #[test]
    fn transaction_sub_id_short_message_misses() {
        assert_eq!(transaction_notification_sub_id(br#"{"id":1}"#), None);
    }

    #[test]
    fn transaction_sub_id_absent_literal_misses() {
        let message = vec![b'x'; 200];
        assert_eq!(transaction_notification_sub_id(&message), None);
    }

    #[test]
    fn logs_sub_id_hit() {
        let (_, signature) = sample_signature();
        let message = logs_notification(&signature, "null", 24040);
        assert_eq!(logs_notification_sub_id(&message), Some(24040));
    }

    #[test]
    fn logs_sub_id_not_in_trailing_window_misses() {
        // Subscription id buried too early for the trailing 64-byte scan.
        let filler = "x".repeat(100);
        let message = format!(r#"{{"params":{{"subscription":7,"result":"{filler}"}}}}"#);
        assert_eq!(logs_notification_sub_id(message.as_bytes()), None);
    }

    #[test]
    fn discarder_fires_on_failed_transaction() {
        let (_, signature) = sample_signature();
        let message = logs_notification(
            &signature,
            r#"{"InstructionError":[2,{"Custom":6000}]}"#,
            24040,
        );
        assert!(logs_notification_discard(&message));
    }

    #[test]
    fn discarder_keeps_successful_transaction() {
        let (_, signature) = sample_signature();
        let message = logs_notification(&signature, "null", 24040);
        assert!(!logs_notification_discard(&message));
    }

    #[test]
    fn discarder_ignores_short_messages() {
        assert!(!logs_notification_discard(br#"{"err":{"x":1}}"#));
    }

    #[test]
    fn logs_signature_hit() {
        let (signature, encoded) = sample_signature();
        let message = logs_notification(&encoded, "null", 24040);
        assert_eq!(logs_notification_signature(&message), Some(signature));
    }

    #[test]
    fn logs_signature_short_message_misses() {
        assert_eq!(logs_notification_signature(br#"{"signature":"x"}"#), None);
    }

    #[test]
    fn transaction_signature_hit() {
        let (signature, encoded) = sample_signature();
        let message = transaction_notification(1, &encoded);
        assert_eq!(
            transaction_notification_signature(&message),
            Some(signature)
        );
    }

    #[test]
    fn invalid_base58_signature_misses() {
        let bad = "0".repeat(88); // '0' is not in the base58 alphabet
        let message = logs_notification(&bad, "null", 24040);
        assert_eq!(logs_notification_signature(&message), None);
    }
}
