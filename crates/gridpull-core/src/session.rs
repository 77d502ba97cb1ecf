//! Minimal WebDriver wire-protocol client over libcurl.
//!
//! Only the handful of endpoints the workers need: create a session with a
//! download-directory preference, navigate, locate an element by XPath,
//! click it, and delete the session. JSON in and out via serde_json.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use url::Url;

/// W3C WebDriver key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Error payload from the remote end (HTTP >= 400 with a W3C error body).
/// Kept typed so callers can distinguish "no such element" from transport
/// failures.
#[derive(Debug)]
pub struct WireError {
    pub status: u32,
    pub error: String,
    pub message: String,
}

impl WireError {
    pub fn is_no_such_element(&self) -> bool {
        self.error == "no such element"
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "webdriver error {} ({}): {}", self.error, self.status, self.message)
    }
}

impl std::error::Error for WireError {}

enum Method {
    Post,
    Delete,
}

/// One live remote browser session. Exclusive to its worker; the protocol
/// is single-client. Dropping the session deletes it on the remote end.
pub struct Session {
    hub: Url,
    id: String,
}

impl Session {
    /// Create a session on the node, pointing the browser's default
    /// download directory at `download_dir`.
    pub fn create(hub: &Url, download_dir: &Path) -> Result<Self> {
        let url = format!("{}/session", hub.as_str().trim_end_matches('/'));
        let value = http_request(Method::Post, &url, Some(&new_session_payload(download_dir)))
            .context("create webdriver session")?;
        let id = session_id(&value)
            .ok_or_else(|| anyhow::anyhow!("session response carried no sessionId"))?;
        Ok(Self {
            hub: hub.clone(),
            id,
        })
    }

    fn url_for(&self, tail: &str) -> String {
        format!(
            "{}/session/{}/{}",
            self.hub.as_str().trim_end_matches('/'),
            self.id,
            tail
        )
    }

    pub fn navigate(&self, page: &str) -> Result<()> {
        http_request(Method::Post, &self.url_for("url"), Some(&json!({ "url": page })))
            .with_context(|| format!("navigate to {page}"))?;
        Ok(())
    }

    /// Locate one element by XPath. `Ok(None)` when the page has no match;
    /// other wire errors propagate.
    pub fn find_element(&self, xpath: &str) -> Result<Option<String>> {
        let body = json!({ "using": "xpath", "value": xpath });
        match http_request(Method::Post, &self.url_for("element"), Some(&body)) {
            Ok(value) => Ok(element_ref(&value)),
            Err(e) => match e.downcast_ref::<WireError>() {
                Some(w) if w.is_no_such_element() => Ok(None),
                _ => Err(e.context(format!("find element {xpath}"))),
            },
        }
    }

    pub fn click(&self, element: &str) -> Result<()> {
        http_request(
            Method::Post,
            &self.url_for(&format!("element/{element}/click")),
            Some(&json!({})),
        )
        .context("click element")?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let url = format!(
            "{}/session/{}",
            self.hub.as_str().trim_end_matches('/'),
            self.id
        );
        if let Err(e) = http_request(Method::Delete, &url, None) {
            tracing::debug!(session = %self.id, error = %e, "session delete failed");
        }
    }
}

fn new_session_payload(download_dir: &Path) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "prefs": {
                        "download.default_directory": download_dir.to_string_lossy(),
                        "download.prompt_for_download": false
                    }
                }
            }
        }
    })
}

fn session_id(value: &Value) -> Option<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn element_ref(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Perform one JSON request and unwrap the W3C `value` envelope.
/// Runs in the current thread; workers call it from their own threads.
fn http_request(method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(120))?;

    let payload = body.map(Value::to_string).unwrap_or_default();
    match method {
        Method::Post => {
            easy.post(true)?;
            easy.post_fields_copy(payload.as_bytes())?;
        }
        Method::Delete => {
            easy.custom_request("DELETE")?;
        }
    }

    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/json; charset=utf-8")?;
    easy.http_headers(list)?;

    let mut response: Vec<u8> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            response.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform().context("webdriver request failed")?;
    }

    let status = easy.response_code().context("no response code")?;
    let parsed: Value = if response.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&response).context("response was not JSON")?
    };
    unwrap_envelope(status, parsed)
}

/// Extract `value` from a W3C response, converting error envelopes into
/// [`WireError`].
fn unwrap_envelope(status: u32, parsed: Value) -> Result<Value> {
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);
    let wire_error = value.get("error").and_then(Value::as_str).map(str::to_string);
    if status >= 400 || wire_error.is_some() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        return Err(WireError {
            status,
            error: wire_error.unwrap_or_else(|| "unknown error".to_string()),
            message,
        }
        .into());
    }
    Ok(value)
}
