//! Typed request bodies for the REST passthrough.

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};

/// Body of `POST /v2/routes`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateRouteRequest<'a> {
    pub host: &'a str,
    pub path: &'a str,
    pub domain_guid: &'a str,
    pub space_guid: &'a str,
}

/// Body of `PUT /v2/apps/<guid>` selecting the runtime backend.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AppBackendRequest {
    pub diego: bool,
}

/// Serialize a request body to the compact JSON passed to `cf curl -d`.
pub fn encode<T: Serialize>(schema: &'static str, body: &T) -> HarnessResult<String> {
    serde_json::to_string(body).map_err(|source| HarnessError::Encode { schema, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_route_body_escapes_values() {
        let body = encode(
            "route creation",
            &CreateRouteRequest {
                host: "my\"host",
                path: "/a b",
                domain_guid: "d-1",
                space_guid: "s-1",
            },
        )
        .unwrap();
        let parsed: Value = serde_json::from_str(&body).expect("body must be valid JSON");
        assert_eq!(parsed["host"], "my\"host");
        assert_eq!(parsed["path"], "/a b");
        assert_eq!(parsed["domain_guid"], "d-1");
        assert_eq!(parsed["space_guid"], "s-1");
    }

    #[test]
    fn test_backend_body() {
        let body = encode("app update", &AppBackendRequest { diego: true }).unwrap();
        assert_eq!(body, r#"{"diego":true}"#);
    }
}
