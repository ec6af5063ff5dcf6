use std::sync::Arc;

use pasarela_config::PasarelaConfig;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument};

use crate::state::ProxyContext;
use crate::worker::handle_connection;

pub struct Master {
    cfg: Arc<PasarelaConfig>,
    ctx: ProxyContext,
}

impl Master {
    pub fn new(cfg: PasarelaConfig, ctx: ProxyContext) -> Self {
        Self {
            cfg: Arc::new(cfg),
            ctx,
        }
    }

    /// Binds the listener and serves until Ctrl-C. Bind failure is the one
    /// fatal error: it propagates out and terminates the process.
    #[instrument(skip(self), fields(
        listen = %self.cfg.listen_addr(),
        max_connections = %self.cfg.global.max_connections,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "pasarela::master", "Starting PASARELA MASTER");

        let listen_addr = self.cfg.listen_addr();
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(listener) => {
                info!(
                    target: "pasarela::master",
                    listen = %listen_addr,
                    "Bind() successful"
                );
                listener
            }
            Err(e) => {
                error!(
                    target: "pasarela::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to bind listener"
                );
                return Err(e.into());
            }
        };

        info!(
            target: "pasarela::master",
            "Master initialized. Waiting for incoming connections (Ctrl+C to stop)..."
        );

        tokio::select! {
            res = accept_loop(listener, self.ctx, self.cfg) => res,
            _ = tokio::signal::ctrl_c() => {
                info!(target: "pasarela::master", "Ctrl-C received; shutting down");
                Ok(())
            }
        }
    }
}

/// Accepts client connections and hands each one to a spawned handler task.
/// A semaphore of `max_connections` owned permits bounds how many handlers
/// run at once; accepted sockets queue on permit acquisition when the pool
/// is saturated.
#[instrument(skip(listener, ctx, cfg), fields(max_permits = cfg.global.max_connections))]
pub async fn accept_loop(
    listener: TcpListener,
    ctx: ProxyContext,
    cfg: Arc<PasarelaConfig>,
) -> anyhow::Result<()> {
    let semaphore = Arc::new(Semaphore::new(cfg.global.max_connections));

    info!(target: "pasarela::master", "accept_loop started for listening socket");

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    target: "pasarela::master",
                    error = ?e,
                    "Failed to accept connection"
                );
                return Err(e.into());
            }
        };

        // Permits must be acquired via acquire_owned to move into the task.
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(
                    target: "pasarela::master",
                    error = ?e,
                    "Failed to acquire connection permit"
                );
                return Err(e.into());
            }
        };

        debug!(
            target: "pasarela::master",
            client_addr = %addr,
            available_permits = semaphore.available_permits(),
            "New connection accepted"
        );

        let ctx_clone = ctx.clone();
        let cfg_clone = cfg.clone();

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = handle_connection(stream, addr, ctx_clone, cfg_clone).await {
                error!(
                    target: "pasarela::worker",
                    client_addr = %addr,
                    error = ?e,
                    "Error while handling connection"
                );
            } else {
                debug!(
                    target: "pasarela::worker",
                    client_addr = %addr,
                    "Connection handled"
                );
            }
        });
    }
}
