// sentinel-guardrails/src/ssrf.rs
// ============================================================================
// Module: SSRF Guard
// Description: Rejects webhook/policy destinations that could reach
// internal infrastructure (§4.6 "SSRF-guarded").
// Dependencies: url
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;

use url::Url;

/// Why a candidate destination was rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SsrfError {
    /// The URL could not be parsed at all.
    #[error("not a valid URL: {0}")]
    Malformed(String),
    /// The scheme was not `http` or `https`.
    #[error("scheme {0:?} is not http(s)")]
    DisallowedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The host resolves to (or literally is) a loopback, private, or
    /// link-local address.
    #[error("host {0:?} targets internal network space")]
    InternalAddress(String),
}

/// Validates that `raw_url` is an `http(s)` URL whose literal host is not
/// loopback, RFC 1918 private space, or the `169.254.0.0/16` link-local
/// block (§4.6). This only rejects literal IP hosts; a DNS name that
/// resolves to an internal address at connection time is not caught here —
/// callers relying on this guard should also bind the HTTP client to avoid
/// following redirects to internal hosts.
pub fn guard_url(raw_url: &str) -> Result<Url, SsrfError> {
    let url = Url::parse(raw_url).map_err(|err| SsrfError::Malformed(err.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SsrfError::DisallowedScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal(ip) {
            return Err(SsrfError::InternalAddress(host.to_string()));
        }
    } else if host.eq_ignore_ascii_case("localhost") {
        return Err(SsrfError::InternalAddress(host.to_string()));
    }

    Ok(url)
}

/// True for loopback, RFC 1918 private, and `169.254.0.0/16` link-local
/// addresses, in either address family.
fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local() || is_link_local_v4(v4),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local(),
    }
}

/// [`Ipv4Addr::is_link_local`] already covers `169.254.0.0/16`; kept as a
/// named check so the 169.254 requirement from the spec is traceable in one
/// place even if std's definition ever narrows.
const fn is_link_local_v4(v4: Ipv4Addr) -> bool {
    v4.octets()[0] == 169 && v4.octets()[1] == 254
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_plain_https_url() {
        assert!(guard_url("https://hooks.example.com/alert").is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert_eq!(
            guard_url("file:///etc/passwd"),
            Err(SsrfError::DisallowedScheme("file".to_string()))
        );
    }

    #[test]
    fn rejects_loopback_literal() {
        assert!(guard_url("http://127.0.0.1/admin").is_err());
    }

    #[test]
    fn rejects_rfc_1918_literal() {
        assert!(guard_url("http://10.0.0.5/internal").is_err());
        assert!(guard_url("http://192.168.1.1/internal").is_err());
    }

    #[test]
    fn rejects_link_local_literal() {
        assert!(guard_url("http://169.254.169.254/latest/meta-data").is_err());
    }

    #[test]
    fn rejects_localhost_by_name() {
        assert!(guard_url("http://localhost:8080/").is_err());
    }
}
