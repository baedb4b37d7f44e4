pub mod allow_fhir;
pub mod allow_patient_summary;
pub mod allow_well_known;
pub mod default_deny;
pub mod fhir_request_security;
pub mod fhir_response_security;

use std::sync::Arc;

use gatekeeper_core::config::ABSENT_UNKNOWN_SYSTEM;
use gatekeeper_core::GatewayConfig;
use gatekeeper_plugin::PolicyModule;

pub use allow_fhir::AllowFhir;
pub use allow_patient_summary::AllowPatientSummary;
pub use allow_well_known::AllowWellKnown;
pub use default_deny::DefaultDeny;
pub use fhir_request_security::FhirRequestSecurity;
pub use fhir_response_security::FhirResponseSecurity;

/// Instantiates every built-in policy module. This list's order is
/// irrelevant — the `Registry` sorts by discovery name on build, so
/// only the numeric prefix in each module's `name()` carries precedence.
/// This is the build-time stand-in for the original's directory scan
/// over `policies/`.
pub fn register_all(config: &GatewayConfig) -> Vec<Arc<dyn PolicyModule>> {
    vec![
        Arc::new(AllowWellKnown),
        Arc::new(AllowPatientSummary::new(config.security_system.clone(), ABSENT_UNKNOWN_SYSTEM)),
        Arc::new(AllowFhir),
        Arc::new(FhirRequestSecurity::new(config.security_system.clone())),
        Arc::new(FhirResponseSecurity::new(config.security_system.clone())),
        Arc::new(DefaultDeny),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_plugin::Registry;

    #[test]
    fn register_all_produces_six_modules_in_discovery_order() {
        let modules = register_all(&GatewayConfig::default());
        assert_eq!(modules.len(), 6);
        let registry = Registry::build(modules);
        let names: Vec<&str> = registry.decision_rules().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["00_allow_well_known", "10_allow_fhir", "99_default_deny"]);
    }
}
