/// A complete origin response as received on the wire: status line,
/// headers and body. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    raw: Vec<u8>,
    status: u16,
}

impl StoredResponse {
    /// Wraps raw response bytes, parsing the status code out of the first
    /// line. A malformed status line yields status 0.
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        let status = parse_status_code(&raw);
        Self { raw, status }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Second whitespace-delimited token of the first line, or 0.
fn parse_status_code(raw: &[u8]) -> u16 {
    let first_line_end = raw
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(raw.len());
    let first_line = &raw[..first_line_end];

    first_line
        .split(|&b| b == b' ' || b == b'\t')
        .filter(|token| !token.is_empty())
        .nth(1)
        .and_then(|token| std::str::from_utf8(token).ok())
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}
