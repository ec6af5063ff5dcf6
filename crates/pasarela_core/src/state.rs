use std::sync::Arc;
use std::time::Duration;

use pasarela_cache::ResponseCache;
use pasarela_config::PasarelaConfig;

use crate::filter::HostFilter;
use crate::logger::AccessLogger;

/// Handles shared by every connection handler: the response cache, the host
/// filter and the access logger. Built once at startup and cloned (cheaply)
/// into each spawned worker task.
#[derive(Clone)]
pub struct ProxyContext {
    pub cache: Arc<ResponseCache>,
    pub filter: Arc<HostFilter>,
    pub access_log: Arc<AccessLogger>,
}

impl ProxyContext {
    pub fn new(cache: ResponseCache, filter: HostFilter, access_log: AccessLogger) -> Self {
        Self {
            cache: Arc::new(cache),
            filter: Arc::new(filter),
            access_log: Arc::new(access_log),
        }
    }

    pub async fn from_config(cfg: &PasarelaConfig) -> Self {
        let cache = ResponseCache::new(
            cfg.cache.max_entries,
            Duration::from_secs(cfg.cache.ttl_secs),
        );
        let filter = HostFilter::load(&cfg.filter.blacklist_file).await;
        let access_log = AccessLogger::open(&cfg.logging.access_log).await;
        Self::new(cache, filter, access_log)
    }
}
