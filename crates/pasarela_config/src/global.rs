use serde::Deserialize;

// =======================================================
// GLOBAL CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub listen_addr: String,
    pub listen_port: u16,
    /// Upper bound on concurrently handled client connections.
    pub max_connections: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".into(),
            listen_port: 8080,
            max_connections: 100,
        }
    }
}
