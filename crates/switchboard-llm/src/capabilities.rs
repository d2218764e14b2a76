//! Provider availability resolved from cargo features
//!
//! Which provider families are compiled in is data, looked up once, rather
//! than conditionals spread through the client code.

use std::sync::OnceLock;

use strum::IntoEnumIterator;
use switchboard_config::ProviderKind;

use crate::types::WireDialect;

/// Availability of one provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapability {
    /// Provider family
    pub kind: ProviderKind,
    /// Wire dialect it speaks
    pub dialect: WireDialect,
    /// Whether support was compiled in
    pub enabled: bool,
}

/// Build-time capability table
#[derive(Debug)]
pub struct CapabilityTable {
    providers: Vec<ProviderCapability>,
}

impl CapabilityTable {
    fn build() -> Self {
        let providers = ProviderKind::iter()
            .map(|kind| {
                let dialect = WireDialect::for_kind(kind);
                ProviderCapability {
                    kind,
                    dialect,
                    enabled: dialect_enabled(dialect),
                }
            })
            .collect();

        Self { providers }
    }

    /// Whether a provider family can be used in this build
    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|p| p.kind == kind && p.enabled)
    }

    /// Provider families compiled into this build
    pub fn enabled(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.providers.iter().filter(|p| p.enabled).map(|p| p.kind)
    }

    /// Every entry, enabled or not
    pub fn entries(&self) -> &[ProviderCapability] {
        &self.providers
    }
}

const fn dialect_enabled(dialect: WireDialect) -> bool {
    match dialect {
        WireDialect::ChatCompletions | WireDialect::Responses => cfg!(feature = "openai"),
        WireDialect::Messages => cfg!(feature = "anthropic"),
    }
}

/// Process-wide capability table
pub fn capabilities() -> &'static CapabilityTable {
    static TABLE: OnceLock<CapabilityTable> = OnceLock::new();
    TABLE.get_or_init(CapabilityTable::build)
}
