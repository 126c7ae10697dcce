use std::sync::Arc;

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{ClientError, ServerError};

/// The parts of a response body the client inspects before handing the
/// payload to a typed decoder. Borrowed `RawValue`s keep the untouched
/// fields unparsed.
#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow, default)]
    error: Option<&'a RawValue>,
    #[serde(borrow, default)]
    params: Option<EnvelopeParams<'a>>,
}

#[derive(Deserialize)]
struct EnvelopeParams<'a> {
    #[serde(borrow, default)]
    result: Option<&'a RawValue>,
}

/// Decodes a notification body into `T`.
///
/// A body with an `error` field yields [`ClientError::Server`]; if the error
/// object itself does not decode, a server error is synthesized from the raw
/// field. A body with neither `error` nor `params.result` yields the
/// null-result sentinel.
pub(crate) fn decode_notification<T>(body: &[u8]) -> Result<T, ClientError>
where
    T: serde::de::DeserializeOwned,
{
    let envelope: Envelope<'_> =
        serde_json::from_slice(body).map_err(|e| ClientError::Decode(Arc::new(e)))?;

    if let Some(error) = envelope.error {
        let error = serde_json::from_str::<ServerError>(error.get()).unwrap_or(ServerError {
            code: ServerError::SERVER_ERROR_CODE,
            message: error.get().to_owned(),
            data: None,
        });
        return Err(ClientError::Server(error));
    }

    let result = envelope
        .params
        .and_then(|params| params.result)
        .ok_or(ClientError::NullResult)?;

    serde_json::from_str(result.get()).map_err(|e| ClientError::Decode(Arc::new(e)))
}
