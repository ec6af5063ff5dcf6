//! Per-connection request pipeline.
//!
//! Parses one request head, resolves its target, checks the blocklist, then
//! hands off to the tunnel (`CONNECT`) or the forwarder (everything else).
//! One request per connection; the client socket closes when this returns.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use pasarela_config::PasarelaConfig;
use pasarela_http::responses::send_403;
use pasarela_proxy::{serve_forward, serve_tunnel};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::state::ProxyContext;

mod request;
mod target;
mod timeouts;

use request::read_request_head;
use target::ResolvedTarget;

#[instrument(skip(stream, ctx, cfg), fields(client = %client_addr))]
pub(crate) async fn handle_connection(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    ctx: ProxyContext,
    cfg: Arc<PasarelaConfig>,
) -> anyhow::Result<()> {
    let client_ip = client_addr.ip().to_string();
    let mut buf = BytesMut::new();

    let Some(req) = read_request_head(&mut stream, &mut buf, &cfg.http).await? else {
        debug!(target: "pasarela::worker", "No parseable request; closing connection");
        return Ok(());
    };

    debug!(
        target: "pasarela::worker",
        method = %req.method,
        req_target = %req.target,
        "Parsed request line"
    );

    let Some(resolved) = ResolvedTarget::resolve(&req) else {
        warn!(
            target: "pasarela::worker",
            req_target = %req.target,
            "Unresolvable request target; closing connection"
        );
        return Ok(());
    };

    if ctx.filter.is_blocked(&resolved.host) {
        info!(target: "pasarela::worker", host = %resolved.host, "Host is blocklisted");
        if let Err(e) = send_403(&mut stream, &req.version).await {
            debug!(target: "pasarela::worker", error = ?e, "Failed writing 403 to client");
        }
        ctx.access_log
            .log(&client_ip, &req.method, &req.target, 403, Some(0))
            .await;
        return Ok(());
    }

    let outcome = if req.is_connect() {
        serve_tunnel(&mut stream, &mut buf, &resolved.addr(), &cfg.http).await
    } else {
        serve_forward(
            &mut stream,
            &mut buf,
            &req.method,
            &req.version,
            &req.headers,
            req.content_length,
            &resolved.addr(),
            &resolved.path_query,
            &resolved.cache_key,
            &ctx.cache,
            &cfg.http,
        )
        .await
    };

    // Forwarded requests are logged under the canonical URL; CONNECT keeps
    // the authority the client sent.
    let log_target = if req.is_connect() {
        &req.target
    } else {
        &resolved.cache_key
    };
    ctx.access_log
        .log(
            &client_ip,
            &req.method,
            log_target,
            outcome.status,
            outcome.bytes,
        )
        .await;

    Ok(())
}
