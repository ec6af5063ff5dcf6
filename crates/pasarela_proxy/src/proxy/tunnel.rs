use bytes::BytesMut;
use pasarela_config::HttpConfig;
use pasarela_http::responses::{send_502, send_connect_established};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{Duration, timeout},
};
use tracing::{debug, error, info, instrument};

use super::{ProxyOutcome, connect_with_timeout};

const TUNNEL_BUF_SIZE: usize = 8 * 1024;

/// Serves one `CONNECT` request as an opaque byte tunnel.
///
/// On origin connect failure the client gets a 502. Otherwise the client
/// gets `200 Connection Established`, any bytes it pipelined behind the
/// request head are relayed first, and then two copy loops run, one per
/// direction. EOF or an I/O error in either direction tears down the whole
/// tunnel; a read timeout retires only the idle direction and the peer
/// direction keeps flowing. Both sockets close on return.
#[instrument(skip(client_stream, leftover, http), fields(upstream = %upstream_addr))]
pub async fn serve_tunnel(
    client_stream: &mut TcpStream,
    leftover: &mut BytesMut,
    upstream_addr: &str,
    http: &HttpConfig,
) -> ProxyOutcome {
    let connect_timeout = Duration::from_secs(http.upstream_connect_timeout_secs);

    let mut upstream = match connect_with_timeout(upstream_addr, connect_timeout).await {
        Ok(s) => s,
        Err(e) => {
            error!(target: "pasarela::tunnel", upstream = %upstream_addr, error = ?e, "Failed to connect tunnel origin");
            if let Err(e) = send_502(client_stream).await {
                debug!(target: "pasarela::tunnel", error = ?e, "Failed writing 502 to client");
            }
            return ProxyOutcome::bad_gateway();
        }
    };

    info!(target: "pasarela::tunnel", upstream = %upstream_addr, "Tunnel established");

    let established = ProxyOutcome {
        status: 200,
        bytes: None,
    };

    if let Err(e) = send_connect_established(client_stream).await {
        debug!(target: "pasarela::tunnel", error = ?e, "Client went away before tunnel start");
        return established;
    }

    // Bytes the client sent behind the CONNECT head belong to the tunnel.
    if !leftover.is_empty() {
        if let Err(e) = upstream.write_all(leftover).await {
            debug!(target: "pasarela::tunnel", error = ?e, "Failed relaying buffered client bytes");
            return established;
        }
        if let Err(e) = upstream.flush().await {
            debug!(target: "pasarela::tunnel", error = ?e, "Failed relaying buffered client bytes");
            return established;
        }
        leftover.clear();
    }

    let client_timeout = Duration::from_secs(http.client_read_timeout_secs);
    let upstream_timeout = Duration::from_secs(http.upstream_read_timeout_secs);

    let (mut client_read, mut client_write) = client_stream.split();
    let (mut upstream_read, mut upstream_write) = upstream.split();

    let client_to_origin =
        copy_until_closed(&mut client_read, &mut upstream_write, client_timeout);
    let origin_to_client =
        copy_until_closed(&mut upstream_read, &mut client_write, upstream_timeout);
    tokio::pin!(client_to_origin, origin_to_client);

    // A read timeout retires only its own copy loop; EOF or an I/O error in
    // either direction ends the tunnel.
    let mut client_open = true;
    let mut origin_open = true;
    while client_open || origin_open {
        let end = tokio::select! {
            end = &mut client_to_origin, if client_open => {
                client_open = false;
                end
            }
            end = &mut origin_to_client, if origin_open => {
                origin_open = false;
                end
            }
        };
        if end == CopyEnd::Closed {
            break;
        }
        debug!(
            target: "pasarela::tunnel",
            "Tunnel direction idle past its read timeout; peer direction continues"
        );
    }

    established
}

/// How one tunnel direction ended: the stream closed (EOF or I/O error on
/// either side of the copy), or the direction went idle past its read
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyEnd {
    Closed,
    Timeout,
}

/// One tunnel direction: read up to 8 KiB, write it to the peer, flush.
async fn copy_until_closed<R, W>(reader: &mut R, writer: &mut W, read_timeout: Duration) -> CopyEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; TUNNEL_BUF_SIZE];
    loop {
        let n = match timeout(read_timeout, reader.read(&mut buf)).await {
            Ok(Ok(0)) => return CopyEnd::Closed,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => return CopyEnd::Closed,
            Err(_) => return CopyEnd::Timeout,
        };
        if writer.write_all(&buf[..n]).await.is_err() {
            return CopyEnd::Closed;
        }
        if writer.flush().await.is_err() {
            return CopyEnd::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Duration;

    use super::{CopyEnd, copy_until_closed};

    #[tokio::test]
    async fn copy_until_closed_relays_until_eof() {
        let (mut src, src_peer) = tokio::io::duplex(64);
        let (dst, mut dst_peer) = tokio::io::duplex(64);

        let copier = tokio::spawn(async move {
            let (mut reader, _w) = tokio::io::split(src_peer);
            let (_r, mut writer) = tokio::io::split(dst);
            copy_until_closed(&mut reader, &mut writer, Duration::from_secs(5)).await
        });

        src.write_all(b"hello ").await.unwrap();
        src.write_all(b"tunnel").await.unwrap();
        src.shutdown().await.unwrap();
        assert_eq!(copier.await.unwrap(), CopyEnd::Closed);

        let mut out = Vec::new();
        dst_peer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello tunnel");
    }

    #[tokio::test]
    async fn copy_until_closed_reports_an_idle_read_as_timeout() {
        let (_src, src_peer) = tokio::io::duplex(64);
        let (dst, _dst_peer) = tokio::io::duplex(64);

        let (mut reader, _w) = tokio::io::split(src_peer);
        let (_r, mut writer) = tokio::io::split(dst);

        // No bytes ever arrive; the loop must give up after the timeout and
        // say so, since a timeout must not end the peer direction.
        let end = copy_until_closed(&mut reader, &mut writer, Duration::from_millis(50)).await;
        assert_eq!(end, CopyEnd::Timeout);
    }
}
