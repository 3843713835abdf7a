use crate::error::Result;
use crate::types::{ExcludeRule, ExternalService};

/// Per-connection exclusion predicate, built from the connection's decoded
/// `exclude` rules. Pure and side-effect-free: construction needs only the
/// configuration text, never the network.
#[derive(Debug, Default)]
pub struct ExcludeFilter {
    rules: Vec<ExcludeRule>,
}

impl ExcludeFilter {
    #[must_use]
    pub fn new(rules: Vec<ExcludeRule>) -> Self {
        Self { rules }
    }

    pub fn for_service(svc: &ExternalService) -> Result<Self> {
        Ok(Self::new(svc.exclude_rules()?))
    }

    /// Whether a candidate with the given provider-native id and name is
    /// excluded. A rule matches when either of its present fields matches:
    /// ids exactly, names exactly and case-sensitively.
    #[must_use]
    pub fn excludes(&self, id: &str, name: &str) -> bool {
        self.rules.iter().any(|rule| {
            let id_match = matches!(&rule.id, Some(rid) if !rid.is_empty() && rid == id);
            let name_match = matches!(&rule.name, Some(rn) if !rn.is_empty() && rn == name);
            id_match || name_match
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
