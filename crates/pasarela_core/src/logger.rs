use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Append-only access log: one line per handled request, mirrored to stdout.
/// Writes are serialized through an internal mutex; I/O failures are
/// swallowed so logging can never fail a request.
pub struct AccessLogger {
    file: Mutex<Option<File>>,
}

impl AccessLogger {
    /// Opens (create + append) the log file. On failure the logger still
    /// works, mirroring lines to stdout only.
    pub async fn open(path: &str) -> Self {
        let file = match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(
                    target: "pasarela::logger",
                    file = %path,
                    error = ?e,
                    "Could not open access log; logging to stdout only"
                );
                None
            }
        };
        Self {
            file: Mutex::new(file),
        }
    }

    /// `[YYYY-MM-DD HH:MM:SS] <ip> <method> <target> <status> <bytes-or-"-">`
    pub async fn log(
        &self,
        client_ip: &str,
        method: &str,
        target: &str,
        status: u16,
        bytes: Option<usize>,
    ) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let bytes_field = match bytes {
            Some(n) => n.to_string(),
            None => "-".to_string(),
        };
        let line = format!("[{timestamp}] {client_ip} {method} {target} {status} {bytes_field}\n");

        print!("{line}");

        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()).await {
                debug!(target: "pasarela::logger", error = ?e, "Failed writing access log line");
                return;
            }
            if let Err(e) = file.flush().await {
                debug!(target: "pasarela::logger", error = ?e, "Failed flushing access log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AccessLogger;

    fn temp_path(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("pasarela-logger-{tag}-{}.log", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn writes_one_formatted_line_per_request() {
        let path = temp_path("format");
        let _ = tokio::fs::remove_file(&path).await;

        let logger = AccessLogger::open(&path).await;
        logger
            .log("127.0.0.1", "GET", "http://origin/x", 200, Some(5))
            .await;
        logger
            .log("127.0.0.1", "CONNECT", "example.com:443", 200, None)
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" 127.0.0.1 GET http://origin/x 200 5"));
        assert!(lines[0].starts_with('['));
        assert!(lines[1].ends_with(" 127.0.0.1 CONNECT example.com:443 200 -"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn unopenable_file_does_not_panic() {
        let logger = AccessLogger::open("/nonexistent-dir/proxy.log").await;
        logger.log("127.0.0.1", "GET", "http://x/", 502, Some(0)).await;
    }
}
