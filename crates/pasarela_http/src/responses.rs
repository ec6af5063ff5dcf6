use tokio::{io::AsyncWriteExt, net::TcpStream};

/// `CONNECT` accepted; the connection becomes an opaque tunnel afterwards.
pub async fn send_connect_established(stream: &mut TcpStream) -> anyhow::Result<()> {
    stream
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    stream.flush().await?;
    Ok(())
}

/// Blocklist hit. The status line echoes the client's own version string.
pub async fn send_403(stream: &mut TcpStream, http_version: &str) -> anyhow::Result<()> {
    let response = format!("{http_version} 403 Forbidden\r\nContent-Length: 0\r\n\r\n");
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Origin unreachable or failed before any origin bytes reached the client.
pub async fn send_502(stream: &mut TcpStream) -> anyhow::Result<()> {
    stream
        .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\n\r\n")
        .await?;
    stream.flush().await?;
    Ok(())
}
