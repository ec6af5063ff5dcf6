use pasarela_http::latin1;

/// =======================================================
/// UPSTREAM HEAD (proxy semantics)
/// =======================================================
///
/// Rules:
/// - The request line carries the origin-form path, never the absolute
///   URL the client may have sent.
/// - Client `Connection` and `Proxy-Connection` headers are dropped.
/// - Exactly one `Connection: close` is appended; the origin closing the
///   socket is what delimits the response.
/// - `Host` and every other header pass through in client order.
///
/// Header names arrive already lowercased from the request parser; values
/// are re-encoded as latin-1 so non-ASCII bytes survive unchanged.
pub(super) fn build_upstream_head(
    method: &str,
    path: &str,
    http_version: &str,
    req_headers: &[(String, String)],
) -> Vec<u8> {
    let mut head = String::new();
    head.push_str(method);
    head.push(' ');
    head.push_str(path);
    head.push(' ');
    head.push_str(http_version);
    head.push_str("\r\n");

    for (name, value) in req_headers {
        if name == "connection" || name == "proxy-connection" {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    head.push_str("Connection: close\r\n\r\n");
    latin1::encode(&head)
}
