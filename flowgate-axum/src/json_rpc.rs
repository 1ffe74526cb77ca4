//! Helpers over the JSON-RPC 2.0 envelope types.

use serde::de::DeserializeOwned;
use serde_json::Value;

use a2a_types::{JSONRPCId, JSONRPCRequest, JSONRPCSuccessResponse};

use crate::error::Error;

/// Builds a JSON-RPC success response echoing the request id.
pub fn success(id: Option<JSONRPCId>, result: Value) -> JSONRPCSuccessResponse {
    JSONRPCSuccessResponse {
        jsonrpc: "2.0".to_string(),
        result,
        id,
    }
}

/// Rejects anything that is not a JSON-RPC 2.0 request.
pub fn validate_request(request: &JSONRPCRequest) -> Result<(), Error> {
    if request.jsonrpc != "2.0" {
        return Err(Error::InvalidRequest(
            "Invalid JSON-RPC version".to_string(),
        ));
    }
    Ok(())
}

/// Deserializes the params object of a request.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, Error> {
    let params = params.ok_or_else(|| Error::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_wrong_version() {
        let request = JSONRPCRequest {
            jsonrpc: "1.0".into(),
            method: "message/send".into(),
            params: None,
            id: None,
        };
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn parse_params_requires_params() {
        let result: Result<a2a_types::TaskIdParams, _> = parse_params(None);
        assert!(matches!(result, Err(Error::InvalidParams(_))));

        let parsed: a2a_types::TaskIdParams =
            parse_params(Some(json!({ "id": "task-1" }))).unwrap();
        assert_eq!(parsed.id, "task-1");
    }
}
