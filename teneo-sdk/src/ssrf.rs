//! Pre-send URL validation for the webhook dispatcher (`spec.md` §4.6).

use std::net::IpAddr;

use tokio::net::lookup_host;
use url::Url;

/// Dangerous well-known ports the dispatcher refuses to target.
const DANGEROUS_PORTS: [u16; 5] = [22, 3306, 5432, 6379, 27017];

/// Why a webhook URL was rejected. Always a permanent error for that URL.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SsrfError {
    /// The URL could not be parsed at all.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The URL has no host component.
    #[error("url has no host")]
    NoHost,
    /// The host resolves to (or textually is) a private/loopback/link-local address.
    #[error("host {0} resolves to a disallowed private/internal address")]
    PrivateAddress(String),
    /// The host names a cloud metadata endpoint.
    #[error("host {0} is a cloud metadata endpoint")]
    CloudMetadata(String),
    /// The host names a Kubernetes-internal service.
    #[error("host {0} is a kubernetes-internal service")]
    KubernetesInternal(String),
    /// The port is a well-known dangerous service port.
    #[error("port {0} is not allowed")]
    DangerousPort(u16),
}

/// How long DNS resolution may take before a hostname target is treated as
/// unresolvable and let through on textual checks alone.
const RESOLUTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Validates `url` against the SSRF denylist in `spec.md` §4.6.
///
/// A hostname target (anything that is not already a literal IP or `localhost`) is
/// resolved and every returned address is checked too, so a domain name that merely
/// *points at* a disallowed address is rejected the same as one that names it
/// literally.
///
/// `allow_loopback` lifts only the loopback restriction, for local development
/// (`allowInsecureWebhooks`); every other check still applies.
pub async fn validate_webhook_url(url: &str, allow_loopback: bool) -> Result<(), SsrfError> {
    let parsed = Url::parse(url).map_err(|e| SsrfError::InvalidUrl(e.to_string()))?;
    let host = parsed.host_str().ok_or(SsrfError::NoHost)?.to_string();
    let host_lower = host.to_lowercase();

    if host_lower == "metadata.google.internal" || host_lower == "169.254.169.254" {
        return Err(SsrfError::CloudMetadata(host));
    }
    if host_lower.ends_with(".svc") || host_lower == "kubernetes.default" {
        return Err(SsrfError::KubernetesInternal(host));
    }
    let port = parsed.port_or_known_default();
    if let Some(port) = port {
        if DANGEROUS_PORTS.contains(&port) {
            return Err(SsrfError::DangerousPort(port));
        }
    }

    if let Ok(ip) = host_lower.parse::<IpAddr>() {
        if is_disallowed_address(ip, allow_loopback) {
            return Err(SsrfError::PrivateAddress(host));
        }
        return Ok(());
    }
    if host_lower == "localhost" {
        if !allow_loopback {
            return Err(SsrfError::PrivateAddress(host));
        }
        return Ok(());
    }

    let lookup_target = format!("{host}:{}", port.unwrap_or(0));
    let resolved = tokio::time::timeout(RESOLUTION_TIMEOUT, lookup_host(lookup_target)).await;
    match resolved {
        Ok(Ok(addrs)) => {
            for addr in addrs {
                if is_disallowed_address(addr.ip(), allow_loopback) {
                    return Err(SsrfError::PrivateAddress(host));
                }
            }
        }
        Ok(Err(_)) | Err(_) => {
            // Unresolvable or timed out: nothing to re-check, fall through on the
            // textual checks already applied above.
        }
    }

    Ok(())
}

fn is_disallowed_address(ip: IpAddr, allow_loopback: bool) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                return !allow_loopback;
            }
            v4.is_private() || v4.is_link_local()
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                return !allow_loopback;
            }
            // fe80::/10 link-local.
            let segments = v6.segments();
            (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_cloud_metadata_endpoint() {
        let err = validate_webhook_url("http://169.254.169.254/latest/meta-data/", false)
            .await
            .unwrap_err();
        assert_eq!(err, SsrfError::CloudMetadata("169.254.169.254".into()));
    }

    #[tokio::test]
    async fn rejects_private_ranges() {
        assert!(validate_webhook_url("http://10.0.0.5/hook", false).await.is_err());
        assert!(validate_webhook_url("http://172.16.0.5/hook", false).await.is_err());
        assert!(validate_webhook_url("http://192.168.1.5/hook", false).await.is_err());
    }

    #[tokio::test]
    async fn rejects_loopback_unless_allowed() {
        assert!(validate_webhook_url("http://127.0.0.1:8080/hook", false).await.is_err());
        assert!(validate_webhook_url("http://127.0.0.1:8080/hook", true).await.is_ok());
        assert!(validate_webhook_url("http://localhost:8080/hook", false).await.is_err());
    }

    #[tokio::test]
    async fn rejects_dangerous_ports() {
        assert!(validate_webhook_url("http://example.com:6379/hook", false).await.is_err());
    }

    #[tokio::test]
    async fn accepts_an_ordinary_public_https_url() {
        assert!(validate_webhook_url("https://hooks.example.com/teneo", false).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_kubernetes_internal_suffixes() {
        assert!(validate_webhook_url("http://my-svc.default.svc/hook", false).await.is_err());
        assert!(validate_webhook_url("http://kubernetes.default/hook", false).await.is_err());
    }
}
