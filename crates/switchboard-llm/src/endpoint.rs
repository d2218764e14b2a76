//! Endpoint resolution and transport security

use std::net::{Ipv4Addr, Ipv6Addr};

use switchboard_config::{ClientConfig, ProviderKind};
use url::{Host, Url};

use crate::error::LlmError;
use crate::types::WireDialect;

/// Default base URL for a provider family
pub const fn default_base_url(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::Openai | ProviderKind::OpenaiResponses => Some("https://api.openai.com/v1"),
        ProviderKind::Anthropic => Some("https://api.anthropic.com/v1"),
        ProviderKind::Openrouter => Some("https://openrouter.ai/api/v1"),
        ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
        ProviderKind::Deepseek => Some("https://api.deepseek.com/v1"),
        ProviderKind::Xai => Some("https://api.x.ai/v1"),
        ProviderKind::OpenaiCompatible => None,
    }
}

/// Transport rules applied to custom endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointPolicy {
    /// Permit plain HTTP to `127.0.0.1`, `::1` and `localhost`
    pub allow_insecure_loopback: bool,
}

impl From<&ClientConfig> for EndpointPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            allow_insecure_loopback: config.allow_insecure_loopback,
        }
    }
}

/// Resolves provider + optional base URL into the request URL
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointResolver {
    policy: EndpointPolicy,
}

impl EndpointResolver {
    /// Create a resolver with the given policy
    pub const fn new(policy: EndpointPolicy) -> Self {
        Self { policy }
    }

    /// Resolve the full request URL for a provider
    ///
    /// A blank `base_url` counts as absent.
    pub fn resolve(&self, kind: ProviderKind, base_url: Option<&str>) -> Result<Url, LlmError> {
        let custom = base_url.map(str::trim).filter(|url| !url.is_empty());

        let raw = match (custom, default_base_url(kind)) {
            (Some(url), _) => url,
            (None, Some(default)) => default,
            (None, None) => {
                return Err(LlmError::Configuration(format!("provider type {kind} requires base_url")));
            }
        };

        let mut url = Url::parse(raw).map_err(|e| LlmError::InvalidEndpoint(format!("{raw}: {e}")))?;
        self.check_transport(&url)?;

        let suffix = WireDialect::for_kind(kind).path();
        let path = url.path().trim_end_matches('/').to_owned();
        if !path.ends_with(suffix) {
            url.set_path(&format!("{path}{suffix}"));
        }

        Ok(url)
    }

    fn check_transport(&self, url: &Url) -> Result<(), LlmError> {
        let Some(host) = url.host() else {
            return Err(LlmError::InvalidEndpoint(format!("{url}: missing host")));
        };

        if !url.username().is_empty() || url.password().is_some() {
            return Err(LlmError::InvalidEndpoint(
                "credentials must not be embedded in the URL".to_owned(),
            ));
        }

        match url.scheme() {
            "https" => Ok(()),
            "http" if self.policy.allow_insecure_loopback && is_loopback(&host) => {
                tracing::debug!(endpoint = %url, "allowing plain http to loopback endpoint");
                Ok(())
            }
            _ => Err(LlmError::InsecureEndpoint(url.to_string())),
        }
    }
}

fn is_loopback(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => *ip == Ipv4Addr::LOCALHOST,
        Host::Ipv6(ip) => *ip == Ipv6Addr::LOCALHOST,
    }
}
