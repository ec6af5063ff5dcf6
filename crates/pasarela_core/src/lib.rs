//! Core of the proxy: listener + bounded worker pool, the per-connection
//! request pipeline, the host blocklist filter and the access logger.

pub mod filter;
pub mod logger;
pub mod master;
pub mod state;
mod worker;

pub use master::Master;
pub use state::ProxyContext;
