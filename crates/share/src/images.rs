//! Remote image allow-list.
//!
//! Product records carry arbitrary image URLs. Only images served by this
//! site (relative paths) or matching a configured [`RemotePattern`] are
//! rendered; everything else is treated as missing.
//!
//! # Pattern syntax
//!
//! ```text
//! https://cdn.example.com/products/**      any path under /products/
//! https://*.example.com/*/thumb.png        one subdomain label, one path segment
//! https://**.example.com/**                any subdomain depth, any path
//! http://localhost:9000/bucket/**          explicit port
//! ```
//!
//! An omitted port matches only the scheme's default port.

use thiserror::Error;
use url::Url;

/// Errors from parsing a [`RemotePattern`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern '{0}' must start with http:// or https://")]
    Protocol(String),
    #[error("pattern '{0}' has no hostname")]
    MissingHost(String),
    #[error("pattern '{0}' has an invalid port")]
    InvalidPort(String),
}

/// One allowed remote image location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePattern {
    protocol: String,
    hostname: String,
    port: Option<u16>,
    pathname: String,
}

impl RemotePattern {
    /// Parse a pattern such as `https://cdn.example.com/products/**`.
    ///
    /// A pattern without a path allows every path on the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol is not http(s), the hostname is
    /// empty, or the port is not a number.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (protocol, rest) = pattern
            .split_once("://")
            .filter(|(protocol, _)| matches!(*protocol, "http" | "https"))
            .ok_or_else(|| PatternError::Protocol(pattern.to_string()))?;

        let (authority, path) = rest
            .find('/')
            .map_or((rest, "/**"), |idx| rest.split_at(idx));

        let (hostname, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| PatternError::InvalidPort(pattern.to_string()))?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        if hostname.is_empty() {
            return Err(PatternError::MissingHost(pattern.to_string()));
        }

        Ok(Self {
            protocol: protocol.to_string(),
            hostname: hostname.to_ascii_lowercase(),
            port,
            pathname: path.to_string(),
        })
    }

    /// Whether `url` is covered by this pattern.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        if url.scheme() != self.protocol {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        if !hostname_matches(&self.hostname, &host.to_ascii_lowercase()) {
            return false;
        }

        let port_ok = match self.port {
            Some(port) => url.port_or_known_default() == Some(port),
            None => url.port().is_none(),
        };
        if !port_ok {
            return false;
        }

        let pattern: Vec<&str> = self.pathname.split('/').collect();
        let path: Vec<&str> = url.path().split('/').collect();
        glob_segments(&pattern, &path)
    }

    /// Source expression for the `img-src` CSP directive.
    #[must_use]
    pub fn csp_source(&self) -> String {
        let host = self
            .hostname
            .strip_prefix("**.")
            .map_or_else(|| self.hostname.clone(), |rest| format!("*.{rest}"));

        match self.port {
            Some(port) => format!("{}://{host}:{port}", self.protocol),
            None => format!("{}://{host}", self.protocol),
        }
    }
}

fn hostname_matches(pattern: &str, host: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("**.") {
        return host
            .strip_suffix(suffix)
            .and_then(|prefix| prefix.strip_suffix('.'))
            .is_some_and(|prefix| !prefix.is_empty());
    }

    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host
            .strip_suffix(suffix)
            .and_then(|prefix| prefix.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty() && !label.contains('.'));
    }

    pattern == host
}

/// Match path segments against a glob where `*` is one segment and `**` is
/// any number of segments.
fn glob_segments(pattern: &[&str], path: &[&str]) -> bool {
    match (pattern.split_first(), path.split_first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some((&"**", rest)), _) => (0..=path.len()).any(|skip| {
            path.get(skip..)
                .is_some_and(|remaining| glob_segments(rest, remaining))
        }),
        (Some(_), None) => false,
        (Some((&"*", rest)), Some((_, path_rest))) => glob_segments(rest, path_rest),
        (Some((literal, rest)), Some((segment, path_rest))) => {
            literal == segment && glob_segments(rest, path_rest)
        }
    }
}

/// The set of remote image locations the page may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAllowList {
    patterns: Vec<RemotePattern>,
}

impl ImageAllowList {
    #[must_use]
    pub const fn new(patterns: Vec<RemotePattern>) -> Self {
        Self { patterns }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether an image `src` may be rendered.
    ///
    /// Site-relative paths are always allowed. Protocol-relative and
    /// non-http(s) URLs never are.
    #[must_use]
    pub fn allows(&self, src: &str) -> bool {
        if src.starts_with('/') && !src.starts_with("//") {
            return true;
        }

        Url::parse(src).is_ok_and(|url| self.patterns.iter().any(|p| p.matches(&url)))
    }

    /// `img-src` source expressions for all patterns, deduplicated.
    #[must_use]
    pub fn csp_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.patterns.iter().map(RemotePattern::csp_source).collect();
        sources.sort();
        sources.dedup();
        sources
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn allow(patterns: &[&str]) -> ImageAllowList {
        ImageAllowList::new(
            patterns
                .iter()
                .map(|p| RemotePattern::parse(p).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_parse_pattern() {
        let pattern = RemotePattern::parse("https://cdn.example.com:8443/products/**").unwrap();
        assert_eq!(pattern.protocol, "https");
        assert_eq!(pattern.hostname, "cdn.example.com");
        assert_eq!(pattern.port, Some(8443));
        assert_eq!(pattern.pathname, "/products/**");
    }

    #[test]
    fn test_parse_pattern_without_path() {
        let pattern = RemotePattern::parse("https://cdn.example.com").unwrap();
        assert_eq!(pattern.pathname, "/**");
    }

    #[test]
    fn test_parse_pattern_errors() {
        assert!(matches!(
            RemotePattern::parse("cdn.example.com/**"),
            Err(PatternError::Protocol(_))
        ));
        assert!(matches!(
            RemotePattern::parse("ftp://cdn.example.com/**"),
            Err(PatternError::Protocol(_))
        ));
        assert!(matches!(
            RemotePattern::parse("https:///**"),
            Err(PatternError::MissingHost(_))
        ));
        assert!(matches!(
            RemotePattern::parse("https://cdn.example.com:http/**"),
            Err(PatternError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_relative_paths_always_allowed() {
        let list = ImageAllowList::default();
        assert!(list.allows("/fallback.jpg"));
        assert!(!list.allows("//evil.example.com/a.png"));
        assert!(!list.allows("fallback.jpg"));
    }

    #[test]
    fn test_exact_host_and_double_star_path() {
        let list = allow(&["https://proj.supabase.co/storage/v1/object/public/product_images/**"]);

        assert!(list.allows(
            "https://proj.supabase.co/storage/v1/object/public/product_images/a/b/c.png"
        ));
        assert!(!list.allows("https://proj.supabase.co/storage/v1/object/public/avatars/a.png"));
        assert!(!list.allows("http://proj.supabase.co/storage/v1/object/public/product_images/a.png"));
        assert!(!list.allows("https://other.supabase.co/storage/v1/object/public/product_images/a.png"));
    }

    #[test]
    fn test_single_star_segment() {
        let list = allow(&["https://cdn.example.com/*/thumb.png"]);
        assert!(list.allows("https://cdn.example.com/123/thumb.png"));
        assert!(!list.allows("https://cdn.example.com/1/2/thumb.png"));
        assert!(!list.allows("https://cdn.example.com/thumb.png"));
    }

    #[test]
    fn test_hostname_wildcards() {
        let one = allow(&["https://*.example.com/**"]);
        assert!(one.allows("https://img.example.com/a.png"));
        assert!(!one.allows("https://a.b.example.com/a.png"));
        assert!(!one.allows("https://example.com/a.png"));
        assert!(!one.allows("https://badexample.com/a.png"));

        let any = allow(&["https://**.example.com/**"]);
        assert!(any.allows("https://a.b.example.com/a.png"));
        assert!(any.allows("https://img.example.com/a.png"));
        assert!(!any.allows("https://example.com/a.png"));
    }

    #[test]
    fn test_ports() {
        let default_port = allow(&["https://cdn.example.com/**"]);
        assert!(default_port.allows("https://cdn.example.com:443/a.png"));
        assert!(!default_port.allows("https://cdn.example.com:8443/a.png"));

        let explicit = allow(&["http://localhost:9000/**"]);
        assert!(explicit.allows("http://localhost:9000/bucket/a.png"));
        assert!(!explicit.allows("http://localhost/bucket/a.png"));
    }

    #[test]
    fn test_host_case_insensitive() {
        let list = allow(&["https://CDN.Example.com/**"]);
        assert!(list.allows("https://cdn.example.COM/a.png"));
    }

    #[test]
    fn test_csp_sources() {
        let list = allow(&[
            "https://cdn.example.com/a/**",
            "https://cdn.example.com/b/**",
            "https://**.images.example.com/**",
            "http://localhost:9000/**",
        ]);
        assert_eq!(
            list.csp_sources(),
            vec![
                "http://localhost:9000".to_string(),
                "https://*.images.example.com".to_string(),
                "https://cdn.example.com".to_string(),
            ]
        );
    }
}
