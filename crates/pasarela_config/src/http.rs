use serde::Deserialize;

// =======================================================
// HTTP CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    // Timeouts (seconds)
    pub client_read_timeout_secs: u64,
    pub upstream_connect_timeout_secs: u64,
    pub upstream_read_timeout_secs: u64,

    // Limits (bytes)
    pub max_request_headers_bytes: u64,
    /// Origin responses larger than this are streamed through to the
    /// client instead of buffered, and are never cached.
    pub max_buffered_response_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            client_read_timeout_secs: 30,
            upstream_connect_timeout_secs: 30,
            upstream_read_timeout_secs: 30,
            max_request_headers_bytes: 64 * 1024,
            max_buffered_response_bytes: 10 * 1024 * 1024,
        }
    }
}
