use url::Url;

use super::request::ParsedRequest;

/// Where a request is ultimately going, in the forms the pipeline needs:
/// the origin `host:port`, the origin-form path, and the canonical absolute
/// URL used as the cache key (both empty for `CONNECT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedTarget {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) path_query: String,
    pub(crate) cache_key: String,
}

impl ResolvedTarget {
    /// `CONNECT` targets are authority form (`host[:port]`, default 443).
    /// Absolute-form targets are parsed as URLs. Origin-form targets borrow
    /// host and port from the `Host` header (default port 80). `None` means
    /// the connection is dropped silently.
    pub(crate) fn resolve(req: &ParsedRequest) -> Option<Self> {
        if req.is_connect() {
            return resolve_authority(&req.target);
        }

        let url = if req.target.starts_with("http://") || req.target.starts_with("https://") {
            Url::parse(&req.target).ok()?
        } else {
            let host = req.header("host").unwrap_or("localhost");
            Url::parse(&format!("http://{host}{}", req.target)).ok()?
        };

        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;

        let mut path_query = url.path().to_string();
        if let Some(query) = url.query() {
            path_query.push('?');
            path_query.push_str(query);
        }

        // Url::to_string is canonical: default ports elided, empty path
        // rendered as "/". Equivalent absolute-form and origin-form requests
        // therefore share one cache key.
        Some(Self {
            host,
            port,
            path_query,
            cache_key: url.to_string(),
        })
    }

    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn resolve_authority(target: &str) -> Option<ResolvedTarget> {
    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (target, 443),
    };
    if host.is_empty() {
        return None;
    }
    Some(ResolvedTarget {
        host: host.to_string(),
        port,
        path_query: String::new(),
        cache_key: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::ResolvedTarget;
    use crate::worker::request::parse_head;

    fn resolve(head: &str) -> Option<ResolvedTarget> {
        ResolvedTarget::resolve(&parse_head(head).expect("head parses"))
    }

    #[test]
    fn absolute_form_takes_host_port_and_path_from_the_url() {
        let t = resolve("GET http://origin:8080/a/b?c=1 HTTP/1.1\r\n").unwrap();
        assert_eq!(t.host, "origin");
        assert_eq!(t.port, 8080);
        assert_eq!(t.path_query, "/a/b?c=1");
        assert_eq!(t.addr(), "origin:8080");
    }

    #[test]
    fn absolute_form_defaults_port_from_scheme() {
        let t = resolve("GET http://origin/ HTTP/1.1\r\n").unwrap();
        assert_eq!(t.port, 80);
        let t = resolve("GET https://origin/ HTTP/1.1\r\n").unwrap();
        assert_eq!(t.port, 443);
    }

    #[test]
    fn origin_form_uses_the_host_header() {
        let t = resolve("GET /x?y=z HTTP/1.1\r\nHost: origin:81\r\n").unwrap();
        assert_eq!(t.host, "origin");
        assert_eq!(t.port, 81);
        assert_eq!(t.path_query, "/x?y=z");
    }

    #[test]
    fn origin_form_without_host_falls_back_to_localhost() {
        let t = resolve("GET /x HTTP/1.1\r\n").unwrap();
        assert_eq!(t.host, "localhost");
        assert_eq!(t.port, 80);
    }

    #[test]
    fn empty_path_becomes_slash() {
        let t = resolve("GET http://origin HTTP/1.1\r\n").unwrap();
        assert_eq!(t.path_query, "/");
    }

    #[test]
    fn equivalent_absolute_and_origin_form_share_a_cache_key() {
        let a = resolve("GET http://origin/x HTTP/1.1\r\nHost: origin\r\n").unwrap();
        let b = resolve("GET /x HTTP/1.1\r\nHost: origin\r\n").unwrap();
        assert_eq!(a.cache_key, b.cache_key);
        assert_eq!(a.cache_key, "http://origin/x");

        // Default port spelled out still canonicalizes away.
        let c = resolve("GET http://origin:80/x HTTP/1.1\r\n").unwrap();
        assert_eq!(c.cache_key, "http://origin/x");
    }

    #[test]
    fn connect_parses_authority_with_default_port_443() {
        let t = resolve("CONNECT example.com:8443 HTTP/1.1\r\n").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 8443);

        let t = resolve("CONNECT example.com HTTP/1.1\r\n").unwrap();
        assert_eq!(t.port, 443);
        assert_eq!(t.path_query, "");
    }

    #[test]
    fn connect_with_garbage_port_is_rejected() {
        assert!(resolve("CONNECT example.com:no HTTP/1.1\r\n").is_none());
    }
}
