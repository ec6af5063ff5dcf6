use bytes::{Buf, BytesMut};
use pasarela_cache::{ResponseCache, StoredResponse};
use pasarela_config::HttpConfig;
use pasarela_http::responses::send_502;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Duration, timeout},
};
use tracing::{debug, error, info, instrument, warn};

mod headers;
mod tunnel;

pub use tunnel::serve_tunnel;

/// What a handled origin interaction amounts to for the access log:
/// the status the client ended up with and the response byte count
/// (`None` for tunnels, where the count is unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOutcome {
    pub status: u16,
    pub bytes: Option<usize>,
}

impl ProxyOutcome {
    fn bad_gateway() -> Self {
        Self {
            status: 502,
            bytes: Some(0),
        }
    }
}

/// Forwards one non-CONNECT request to its origin.
///
/// `GET` requests are answered from the cache when possible; otherwise the
/// request is replayed upstream with `Connection: close`, the response is
/// read to EOF, relayed to the client, and cached iff `GET` + 200.
///
/// All failure modes are folded into the returned outcome: 502 while the
/// client has received nothing yet, the parsed origin status (possibly 0)
/// once origin bytes have started flowing clientward.
#[allow(clippy::too_many_arguments)]
#[instrument(skip(client_stream, client_buf, req_headers, cache, http), fields(%method, upstream = %upstream_addr))]
pub async fn serve_forward(
    client_stream: &mut TcpStream,
    client_buf: &mut BytesMut,
    method: &str,
    http_version: &str,
    req_headers: &[(String, String)],
    content_length: usize,
    upstream_addr: &str,
    upstream_path: &str,
    cache_key: &str,
    cache: &ResponseCache,
    http: &HttpConfig,
) -> ProxyOutcome {
    let is_get = method.eq_ignore_ascii_case("GET");

    // 1) cache first; a hit never touches the origin
    if is_get {
        if let Some(cached) = cache.get(cache_key) {
            debug!(
                target: "pasarela::proxy",
                key = %cache_key,
                bytes = cached.len(),
                "Serving response from cache"
            );
            if let Err(e) = write_flush(client_stream, cached.as_bytes()).await {
                warn!(target: "pasarela::proxy", error = ?e, "Failed writing cached response to client");
            }
            return ProxyOutcome {
                status: cached.status(),
                bytes: Some(cached.len()),
            };
        }
    }

    let connect_timeout = Duration::from_secs(http.upstream_connect_timeout_secs);
    let read_timeout = Duration::from_secs(http.upstream_read_timeout_secs);
    let client_read_timeout = Duration::from_secs(http.client_read_timeout_secs);

    // 2) connect to the origin
    let mut upstream = match connect_with_timeout(upstream_addr, connect_timeout).await {
        Ok(s) => s,
        Err(e) => {
            error!(target: "pasarela::proxy", upstream = %upstream_addr, error = ?e, "Failed to connect to origin");
            return reply_bad_gateway(client_stream).await;
        }
    };

    info!(
        target: "pasarela::proxy",
        %method,
        path = %upstream_path,
        upstream = %upstream_addr,
        "Forwarding request to origin"
    );

    // 3) request head: origin-form path, filtered headers, Connection: close
    let head = headers::build_upstream_head(method, upstream_path, http_version, req_headers);
    if let Err(e) = write_flush(&mut upstream, &head).await {
        error!(target: "pasarela::proxy", upstream = %upstream_addr, error = ?e, "Failed writing request head to origin");
        return reply_bad_gateway(client_stream).await;
    }

    // 4) request body, byte-exact, when the client declared one
    if content_length > 0 {
        if let Err(e) = relay_exact(
            client_stream,
            client_buf,
            &mut upstream,
            content_length,
            client_read_timeout,
        )
        .await
        {
            error!(target: "pasarela::proxy", error = ?e, "Failed relaying request body to origin");
            return reply_bad_gateway(client_stream).await;
        }
    }

    // 5) read the origin response until EOF. Responses stay buffered (and
    // cacheable) up to the configured ceiling; past it we flush what we
    // have and fall back to pass-through streaming.
    let max_buffer = http.max_buffered_response_bytes as usize;
    let mut resp = Vec::new();
    let mut tmp = [0u8; 8192];
    let mut streamed = false;
    let mut total = 0usize;

    loop {
        let n = match timeout(read_timeout, upstream.read(&mut tmp)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                error!(target: "pasarela::proxy", upstream = %upstream_addr, error = ?e, "Error reading origin response");
                if streamed {
                    return ProxyOutcome {
                        status: StoredResponse::from_bytes(resp).status(),
                        bytes: Some(total),
                    };
                }
                return reply_bad_gateway(client_stream).await;
            }
            Err(_) => {
                error!(target: "pasarela::proxy", upstream = %upstream_addr, "Origin read timed out");
                if streamed {
                    return ProxyOutcome {
                        status: StoredResponse::from_bytes(resp).status(),
                        bytes: Some(total),
                    };
                }
                return reply_bad_gateway(client_stream).await;
            }
        };
        if n == 0 {
            break;
        }
        total += n;

        if streamed {
            if let Err(e) = write_flush(client_stream, &tmp[..n]).await {
                warn!(target: "pasarela::proxy", error = ?e, "Client went away mid-response");
                return ProxyOutcome {
                    status: StoredResponse::from_bytes(resp).status(),
                    bytes: Some(total),
                };
            }
        } else {
            resp.extend_from_slice(&tmp[..n]);
            if resp.len() > max_buffer {
                debug!(
                    target: "pasarela::proxy",
                    buffered = resp.len(),
                    "Response exceeds buffer ceiling; switching to pass-through"
                );
                if let Err(e) = write_flush(client_stream, &resp).await {
                    warn!(target: "pasarela::proxy", error = ?e, "Client went away mid-response");
                    return ProxyOutcome {
                        status: StoredResponse::from_bytes(resp).status(),
                        bytes: Some(total),
                    };
                }
                streamed = true;
            }
        }
    }

    if streamed {
        // Already delivered; too large to cache.
        return ProxyOutcome {
            status: StoredResponse::from_bytes(resp).status(),
            bytes: Some(total),
        };
    }

    let stored = StoredResponse::from_bytes(resp);
    let status = stored.status();

    if let Err(e) = write_flush(client_stream, stored.as_bytes()).await {
        warn!(target: "pasarela::proxy", error = ?e, "Failed writing origin response to client");
        return ProxyOutcome {
            status,
            bytes: Some(total),
        };
    }

    // 6) only successful GET responses are worth keeping
    if is_get && status == 200 {
        debug!(target: "pasarela::proxy", key = %cache_key, bytes = total, "Caching origin response");
        cache.put(cache_key.to_string(), stored);
    }

    ProxyOutcome {
        status,
        bytes: Some(total),
    }
}

/// 502 to the client (best effort) and the matching outcome.
async fn reply_bad_gateway(client_stream: &mut TcpStream) -> ProxyOutcome {
    if let Err(e) = send_502(client_stream).await {
        debug!(target: "pasarela::proxy", error = ?e, "Failed writing 502 to client");
    }
    ProxyOutcome::bad_gateway()
}

async fn write_flush(stream: &mut TcpStream, data: &[u8]) -> anyhow::Result<()> {
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

pub(crate) async fn connect_with_timeout(
    addr: &str,
    timeout_dur: Duration,
) -> anyhow::Result<TcpStream> {
    match timeout(timeout_dur, TcpStream::connect(addr)).await {
        Ok(res) => Ok(res?),
        Err(_) => anyhow::bail!("Origin connect timeout to {}", addr),
    }
}

/// Relays exactly `remaining` body bytes from the client (buffer first,
/// then socket) to the origin.
async fn relay_exact(
    client_stream: &mut TcpStream,
    client_buf: &mut BytesMut,
    upstream_stream: &mut TcpStream,
    mut remaining: usize,
    read_timeout: Duration,
) -> anyhow::Result<()> {
    while remaining > 0 {
        if !client_buf.is_empty() {
            let take = remaining.min(client_buf.len());
            upstream_stream.write_all(&client_buf[..take]).await?;
            client_buf.advance(take);
            remaining -= take;
            continue;
        }

        let mut tmp = [0u8; 4096];
        let n = match timeout(read_timeout, client_stream.read(&mut tmp)).await {
            Ok(res) => res?,
            Err(_) => anyhow::bail!("Client read timeout while relaying body"),
        };
        if n == 0 {
            anyhow::bail!("Client closed connection while relaying body");
        }

        if n > remaining {
            upstream_stream.write_all(&tmp[..remaining]).await?;
            client_buf.extend_from_slice(&tmp[remaining..n]);
            remaining = 0;
        } else {
            upstream_stream.write_all(&tmp[..n]).await?;
            remaining -= n;
        }
    }
    upstream_stream.flush().await?;
    Ok(())
}
