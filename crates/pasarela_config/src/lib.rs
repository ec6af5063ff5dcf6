use serde::Deserialize;

mod global;
mod http;

pub use global::GlobalConfig;
pub use http::HttpConfig;

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses held at once.
    pub max_entries: usize,
    /// Seconds a cached response stays servable after insertion.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_secs: 300,
        }
    }
}

// =======================================================
// FILTER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Host-prefix blocklist file. Missing file means no blocks.
    pub blacklist_file: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blacklist_file: "blacklist.txt".into(),
        }
    }
}

// =======================================================
// LOGGING CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only access log; every line is mirrored to stdout.
    pub access_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            access_log: "proxy.log".into(),
        }
    }
}

// =======================================================
// PASARELA CONFIG — main config
// =======================================================
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PasarelaConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PasarelaConfig {
    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Ini).required(false))
            .build()?;

        built.try_deserialize()
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Continuing with default configuration...");
                PasarelaConfig::default()
            }
        }
    }

    /// "host:port" string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.global.listen_addr, self.global.listen_port)
    }

    pub fn print(&self) {
        println!("=============== PASARELA CONFIG ===============");
        println!("\n[global]");
        println!("  listen_addr          = {}", self.global.listen_addr);
        println!("  listen_port          = {}", self.global.listen_port);
        println!("  max_connections      = {}", self.global.max_connections);
        println!("\n[http]");
        println!(
            "  client_read_timeout_secs      = {}",
            self.http.client_read_timeout_secs
        );
        println!(
            "  upstream_connect_timeout_secs = {}",
            self.http.upstream_connect_timeout_secs
        );
        println!(
            "  upstream_read_timeout_secs    = {}",
            self.http.upstream_read_timeout_secs
        );
        println!(
            "  max_request_headers_bytes     = {}",
            self.http.max_request_headers_bytes
        );
        println!(
            "  max_buffered_response_bytes   = {}",
            self.http.max_buffered_response_bytes
        );
        println!("\n[cache]");
        println!("  max_entries          = {}", self.cache.max_entries);
        println!("  ttl_secs             = {}", self.cache.ttl_secs);
        println!("\n[filter]");
        println!("  blacklist_file       = {}", self.filter.blacklist_file);
        println!("\n[logging]");
        println!("  access_log           = {}", self.logging.access_log);
        println!("==============================================");
    }
}
