use bytes::{Buf, BytesMut};
use pasarela_config::HttpConfig;
use pasarela_http::latin1;
use tokio::net::TcpStream;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::timeouts::{ReadOutcome, read_more};

/// One parsed request head. Header names are lowercased and kept in
/// first-seen order; duplicates keep the last value.
#[derive(Debug)]
pub(crate) struct ParsedRequest {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) version: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_length: usize,
}

impl ParsedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }
}

/// Reads one request head (up to `\r\n\r\n`) from the client under the
/// configured read timeout and size ceiling.
///
/// Returns `Ok(None)` on every silent-close condition: EOF before a full
/// head, timeout, an oversized head, or an unparseable request line. Bytes
/// past the head stay in `buf` for the body/tunnel path.
pub(crate) async fn read_request_head(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    http: &HttpConfig,
) -> anyhow::Result<Option<ParsedRequest>> {
    let read_timeout = Duration::from_secs(http.client_read_timeout_secs);
    let max_headers = http.max_request_headers_bytes as usize;

    let headers_end = loop {
        if let Some(pos) = find_headers_end(buf) {
            break pos;
        }

        if max_headers > 0 && buf.len() > max_headers {
            warn!(
                target: "pasarela::worker",
                buffered = buf.len(),
                "Request head exceeds size ceiling; dropping connection"
            );
            return Ok(None);
        }

        match read_more(stream, buf, read_timeout).await? {
            ReadOutcome::Timeout => {
                debug!(target: "pasarela::worker", "Client read timed out before a full request head");
                return Ok(None);
            }
            ReadOutcome::Read(0) => return Ok(None),
            ReadOutcome::Read(_) => {}
        }
    };

    // Latin-1 keeps the byte <-> char mapping lossless for re-serialization.
    let head = latin1::decode(&buf[..headers_end]);
    buf.advance(headers_end + 4);

    Ok(parse_head(&head))
}

fn find_headers_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parses a decoded request head. `None` when the request line has fewer
/// than three tokens or is empty; the caller drops the connection silently.
pub(crate) fn parse_head(head: &str) -> Option<ParsedRequest> {
    let mut lines = head.lines();
    let request_line = lines.next()?.trim();
    if request_line.is_empty() {
        return None;
    }

    let mut tokens = request_line.split_whitespace();
    let method = tokens.next()?.to_string();
    let target = tokens.next()?.to_string();
    let version = tokens.next()?.to_string();

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Lines without a colon (and empty names) are ignored, not errors.
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();

        if let Some(slot) = headers.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            headers.push((name, value));
        }
    }

    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    Some(ParsedRequest {
        method,
        target,
        version,
        headers,
        content_length,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_head;

    #[test]
    fn parse_head_splits_request_line_into_three_tokens() {
        let req = parse_head("GET http://origin/x HTTP/1.1\r\nHost: origin\r\n").expect("parsed");
        assert_eq!(req.method, "GET");
        assert_eq!(req.target, "http://origin/x");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.header("host"), Some("origin"));
    }

    #[test]
    fn parse_head_rejects_short_request_lines() {
        assert!(parse_head("GET /x\r\n").is_none());
        assert!(parse_head("GET\r\n").is_none());
        assert!(parse_head("\r\n").is_none());
        assert!(parse_head("").is_none());
    }

    #[test]
    fn header_names_are_lowercased_and_values_trimmed() {
        let req = parse_head("GET / HTTP/1.1\r\nHoSt:   origin  \r\nX-Thing: a b\r\n").unwrap();
        assert_eq!(req.headers[0].0, "host");
        assert_eq!(req.header("host"), Some("origin"));
        assert_eq!(req.header("x-thing"), Some("a b"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = parse_head("GET / HTTP/1.1\r\nHost: origin\r\n").unwrap();
        assert_eq!(req.header("Host"), Some("origin"));
        assert_eq!(req.header("HOST"), Some("origin"));
        assert_eq!(req.header("host"), Some("origin"));
        assert_eq!(req.header("hosts"), None);
    }

    #[test]
    fn duplicate_headers_keep_last_value_and_first_position() {
        let req = parse_head("GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nA: 3\r\n").unwrap();
        assert_eq!(req.headers[0], ("a".to_string(), "3".to_string()));
        assert_eq!(req.headers[1], ("b".to_string(), "2".to_string()));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn lines_without_a_colon_are_ignored() {
        let req = parse_head("GET / HTTP/1.1\r\ngarbage line\r\nHost: origin\r\n").unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("host"), Some("origin"));
    }

    #[test]
    fn content_length_is_extracted_when_numeric() {
        let req = parse_head("POST /p HTTP/1.1\r\nContent-Length: 3\r\n").unwrap();
        assert_eq!(req.content_length, 3);
        let req = parse_head("POST /p HTTP/1.1\r\nContent-Length: nope\r\n").unwrap();
        assert_eq!(req.content_length, 0);
    }

    #[test]
    fn connect_is_detected_case_insensitively() {
        let req = parse_head("connect example.com:443 HTTP/1.1\r\n").unwrap();
        assert!(req.is_connect());
    }
}
