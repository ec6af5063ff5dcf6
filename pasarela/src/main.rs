use pasarela_config::PasarelaConfig;
use pasarela_core::{Master, ProxyContext};
use tracing::warn;
use utils::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut cfg = PasarelaConfig::from_file_or_default("pasarela.conf");

    // One optional positional argument: the listen port. Non-numeric values
    // are ignored and the configured port stands.
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<u16>() {
            Ok(port) => cfg.global.listen_port = port,
            Err(_) => warn!(
                target: "pasarela",
                argument = %arg,
                "Ignoring non-numeric port argument"
            ),
        }
    }

    cfg.print();

    let ctx = ProxyContext::from_config(&cfg).await;
    let master = Master::new(cfg, ctx);
    master.run().await?;

    Ok(())
}
