mod proxy;

pub use proxy::{ProxyOutcome, serve_forward, serve_tunnel};
