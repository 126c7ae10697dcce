use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::{SerializeMap, SerializeSeq};
use serde_json::{Map, Value};

/// Request ids are unique for the process lifetime and never zero, so that
/// the dispatcher's short-frame ack probe can rely on `id != 0`.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// An outgoing JSON-RPC 2.0 call.
///
/// A non-empty `config` object is appended as the trailing element of the
/// params array, matching the Solana RPC convention of
/// `[param, …, {"commitment": …}]`.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
    pub config: Option<Map<String, Value>>,
}

impl Request {
    pub fn new(
        params: Vec<Value>,
        method: impl Into<String>,
        config: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: next_request_id(),
            method: method.into(),
            params,
            config: config.filter(|config| !config.is_empty()),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl serde::Serialize for Request {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        struct Params<'a>(&'a Request);

        impl serde::Serialize for Params<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                let len = self.0.params.len() + usize::from(self.0.config.is_some());
                let mut seq = serializer.serialize_seq(Some(len))?;
                for param in &self.0.params {
                    seq.serialize_element(param)?;
                }
                if let Some(config) = &self.0.config {
                    seq.serialize_element(config)?;
                }
                seq.end()
            }
        }

        let mut obj = serializer.serialize_map(Some(4))?;
        obj.serialize_entry("jsonrpc", "2.0")?;
        obj.serialize_entry("id", &self.id)?;
        obj.serialize_entry("method", &self.method)?;
        obj.serialize_entry("params", &Params(self))?;
        obj.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ids_are_monotonic_and_non_zero() {
        let a = Request::new(vec![], "slotSubscribe", None);
        let b = Request::new(vec![], "slotSubscribe", None);
        assert!(a.id > 0);
        assert!(b.id > a.id);
    }

    #[test]
    fn encodes_jsonrpc_2_0() {
        let request = Request::new(vec![json!("all")], "logsSubscribe", None);
        let encoded: Value = serde_json::from_str(&request.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "method": "logsSubscribe",
                "params": ["all"],
            })
        );
    }

    #[test]
    fn config_is_appended_as_trailing_params_element() {
        let mut config = Map::new();
        config.insert("commitment".to_owned(), json!("finalized"));
        let request = Request::new(vec![json!("all")], "logsSubscribe", Some(config));
        let encoded: Value = serde_json::from_str(&request.encode().unwrap()).unwrap();
        assert_eq!(
            encoded["params"],
            json!(["all", {"commitment": "finalized"}])
        );
    }

    #[test]
    fn empty_config_is_dropped() {
        let request = Request::new(vec![json!(42)], "slotSubscribe", Some(Map::new()));
        let encoded: Value = serde_json::from_str(&request.encode().unwrap()).unwrap();
        assert_eq!(encoded["params"], json!([42]));
    }
}
