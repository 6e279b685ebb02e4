use std::fmt;
use std::sync::Arc;

use crate::anchor::TrustAnchorsResolver;
use crate::attestation::AttestationOutcome;
use crate::certpath::{AttestationCertificatePath, CertPathValidator};
use crate::data::{Aaguid, AttestationType};
use crate::errors::VerifyError;

/// How far a registration's attestation must be trusted.
#[derive(Clone)]
pub enum AttestationTrustPolicy {
    /// Accept any cryptographically valid statement.
    Skip,
    /// Certificate-based attestation must chain to an anchor resolved by
    /// AAGUID. Self and none attestation pass only when allowed.
    Strict {
        resolver: Arc<dyn TrustAnchorsResolver>,
        allow_self_and_none: bool,
    },
}

impl fmt::Debug for AttestationTrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "Skip"),
            Self::Strict {
                allow_self_and_none,
                ..
            } => f
                .debug_struct("Strict")
                .field("allow_self_and_none", allow_self_and_none)
                .finish_non_exhaustive(),
        }
    }
}

impl AttestationTrustPolicy {
    pub fn strict(resolver: Arc<dyn TrustAnchorsResolver>) -> Self {
        Self::Strict {
            resolver,
            allow_self_and_none: false,
        }
    }

    pub(super) fn check(
        &self,
        outcome: &AttestationOutcome,
        aaguid: Aaguid,
        validator: &CertPathValidator,
    ) -> Result<(), VerifyError> {
        let Self::Strict {
            resolver,
            allow_self_and_none,
        } = self
        else {
            tracing::debug!("Skipping attestation trustworthiness check");
            return Ok(());
        };

        if !outcome.attestation_type.requires_trust_path() {
            if *allow_self_and_none {
                return Ok(());
            }
            return Err(VerifyError::BadAttestationStatement(format!(
                "{} attestation is not accepted",
                attestation_type_name(outcome.attestation_type)
            )));
        }

        let certificates = outcome.trust_path.clone().ok_or_else(|| {
            VerifyError::Certificate("Attestation carries no certificate path".to_string())
        })?;
        let path = AttestationCertificatePath::new(certificates)?;
        let anchors = resolver.resolve(&aaguid)?;
        tracing::debug!(
            "Validating attestation path of {} certificates against {} anchors for AAGUID {}",
            path.certificates().len(),
            anchors.len(),
            aaguid
        );
        validator.validate(&path, &anchors)
    }
}

fn attestation_type_name(attestation_type: AttestationType) -> &'static str {
    match attestation_type {
        AttestationType::Basic => "Basic",
        AttestationType::SelfAttestation => "Self",
        AttestationType::AttCa => "AttCA",
        AttestationType::AnonCa => "AnonCA",
        AttestationType::None => "None",
    }
}
