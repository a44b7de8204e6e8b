use kontrol_core::gateway::InvocationErrorKind;
use kontrol_core::snapshot::Domain;
use serde::Serialize;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub succeeded: Vec<Domain>,
    pub failed: Vec<(Domain, InvocationErrorKind)>,
    /// Domains whose published value was replaced.
    pub republished: Vec<Domain>,
    /// No credential was configured, so nothing was fetched.
    pub skipped_unconfigured: bool,
}

impl TickReport {
    pub(crate) fn unconfigured() -> Self {
        Self {
            skipped_unconfigured: true,
            ..Self::default()
        }
    }

    pub fn connected(&self) -> bool {
        !self.succeeded.is_empty()
    }

    /// Nothing succeeded and every failure needs a settings change to clear.
    pub fn misconfigured(&self) -> bool {
        !self.connected()
            && !self.failed.is_empty()
            && self.failed.iter().all(|(_, kind)| kind.is_configuration())
    }

    pub fn republished(&self, domain: Domain) -> bool {
        self.republished.contains(&domain)
    }
}
