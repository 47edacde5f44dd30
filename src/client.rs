//! HTTP plumbing to the vision API and the anti-forgery session.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, Response};
use serde::Serialize;

use crate::error::{Result, VisionError};

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body posted to `vision` and `externalVision`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisionPayload {
    pub mode: String,
    pub image: String,
}

/// Request/response transport. Paths are relative to the API base URL.
pub trait Transport: Send + Sync {
    fn get(&self, path: &str) -> Result<String>;

    /// Fetches raw bytes from an absolute URL.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    fn post_json(&self, path: &str, body: &VisionPayload, token: Option<&str>) -> Result<String>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::network(e.to_string()))?;
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Success is any status in [200, 300); everything else becomes `<status>:<reason>`.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(VisionError::http_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
        ))
    }
}

fn network_error(err: reqwest::Error) -> VisionError {
    VisionError::network(err.to_string())
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().map_err(network_error)?;
        check_status(response)?.text().map_err(network_error)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {url}");
        let response = self.client.get(url).send().map_err(network_error)?;
        let bytes = check_status(response)?.bytes().map_err(network_error)?;
        Ok(bytes.to_vec())
    }

    fn post_json(
        &self,
        path: &str,
        body: &VisionPayload,
        token: Option<&str>,
    ) -> Result<String> {
        let url = self.url(path);
        debug!("POST {url} (mode={}, image {} bytes)", body.mode, body.image.len());
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(serde_json::to_string(body)?);
        if let Some(token) = token {
            request = request.header(CSRF_HEADER, token);
        }
        let response = request.send().map_err(network_error)?;
        check_status(response)?.text().map_err(network_error)
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

/// Anti-forgery token echoed back on every vision request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Performs `GET session` and reads the `csrf-token` field.
    pub fn establish(transport: &dyn Transport) -> Result<Self> {
        let body = transport.get("session")?;
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| VisionError::malformed(format!("session reply is not JSON: {e}")))?;
        match value.get("csrf-token").and_then(|t| t.as_str()) {
            Some(token) => {
                info!("Session established");
                Ok(Self {
                    token: Some(token.to_owned()),
                })
            }
            None => {
                warn!("Session reply has no csrf-token field");
                Err(VisionError::malformed("session reply lacks `csrf-token`"))
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedTransport {
        session_body: Result<String>,
        gets: Mutex<Vec<String>>,
    }

    impl Transport for CannedTransport {
        fn get(&self, path: &str) -> Result<String> {
            self.gets.lock().unwrap().push(path.to_owned());
            match &self.session_body {
                Ok(body) => Ok(body.clone()),
                Err(e) => Err(VisionError::network(e.to_string())),
            }
        }

        fn get_bytes(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn post_json(&self, _path: &str, _body: &VisionPayload, _token: Option<&str>) -> Result<String> {
            unreachable!("session tests never post")
        }
    }

    fn canned(body: Result<String>) -> CannedTransport {
        CannedTransport {
            session_body: body,
            gets: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_session_reads_csrf_token() {
        let transport = canned(Ok(r#"{"csrf-token":"abc123"}"#.to_owned()));
        let session = Session::establish(&transport).unwrap();
        assert_eq!(session.token(), Some("abc123"));
        assert_eq!(transport.gets.lock().unwrap().as_slice(), ["session"]);
    }

    #[test]
    fn test_session_without_token_field() {
        let transport = canned(Ok(r#"{"token":"abc"}"#.to_owned()));
        assert!(matches!(
            Session::establish(&transport),
            Err(VisionError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_session_transport_failure_propagates() {
        let transport = canned(Err(VisionError::network("connection refused")));
        let err = Session::establish(&transport).unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3000/");
        assert_eq!(transport.url("/vision"), "http://localhost:3000/vision");
        assert_eq!(transport.url("externalVision"), "http://localhost:3000/externalVision");
    }

    #[test]
    fn test_payload_serializes_mode_and_image() {
        let payload = VisionPayload {
            mode: "labels".into(),
            image: "data:image/png;base64,AAAA".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["mode"], "labels");
        assert_eq!(json["image"], "data:image/png;base64,AAAA");
    }
}
