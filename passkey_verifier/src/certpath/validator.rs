//! Revocation-agnostic X.509 path validation for attestation certificates.
//!
//! No CRL or OCSP lookups are made.

use x509_parser::prelude::*;

use crate::anchor::TrustAnchorSet;
use crate::crypto::parse_certificate;
use crate::errors::VerifyError;

/// Leaf-first attestation certificate chain, as carried in `x5c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationCertificatePath {
    certificates: Vec<Vec<u8>>,
}

impl AttestationCertificatePath {
    pub fn new(certificates: Vec<Vec<u8>>) -> Result<Self, VerifyError> {
        if certificates.is_empty() {
            return Err(VerifyError::Certificate(
                "Certificate path must not be empty".to_string(),
            ));
        }
        Ok(Self { certificates })
    }

    pub fn leaf(&self) -> &[u8] {
        &self.certificates[0]
    }

    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertPathValidator {
    /// Unix seconds; `None` checks validity at the current time.
    verification_time: Option<i64>,
}

impl CertPathValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_time(verification_time: i64) -> Self {
        Self {
            verification_time: Some(verification_time),
        }
    }

    pub fn validate(
        &self,
        path: &AttestationCertificatePath,
        trust_anchors: &TrustAnchorSet,
    ) -> Result<(), VerifyError> {
        if trust_anchors.is_empty() {
            return Err(VerifyError::Certificate(
                "trustAnchors is required; it must not be empty".to_string(),
            ));
        }

        let now = self.time()?;
        let certs = path
            .certificates()
            .iter()
            .map(|der| parse_certificate(der))
            .collect::<Result<Vec<_>, _>>()?;

        for (idx, cert) in certs.iter().enumerate() {
            if !cert.validity().is_valid_at(now) {
                return Err(VerifyError::Certificate(format!(
                    "Certificate {idx} in path ({}) is expired or not yet valid",
                    cert.subject()
                )));
            }
        }

        for (idx, pair) in certs.windows(2).enumerate() {
            let (child, issuer) = (&pair[0], &pair[1]);
            if child.issuer().as_raw() != issuer.subject().as_raw() {
                return Err(VerifyError::Certificate(format!(
                    "Certificate {idx} is not issued by the next certificate in path"
                )));
            }
            check_ca(issuer, idx)?;
            child
                .verify_signature(Some(issuer.public_key()))
                .map_err(|e| {
                    VerifyError::Certificate(format!(
                        "Signature of certificate {idx} in path is invalid: {e}"
                    ))
                })?;
        }

        // certs is non-empty by construction of the path.
        let last_idx = certs.len() - 1;
        let last = &certs[last_idx];
        let last_der = &path.certificates()[last_idx];

        if trust_anchors.iter().any(|anchor| anchor.der() == last_der.as_slice()) {
            tracing::debug!("Certificate path ends in a trust anchor");
            return Ok(());
        }

        for anchor in trust_anchors {
            let Ok(anchor_cert) = parse_certificate(anchor.der()) else {
                continue;
            };
            if anchor_cert.subject().as_raw() != last.issuer().as_raw() {
                continue;
            }
            if last.verify_signature(Some(anchor_cert.public_key())).is_ok() {
                check_anchor_path_len(&anchor_cert, last_idx)?;
                tracing::debug!(
                    "Certificate path chains to trust anchor {}",
                    anchor_cert.subject()
                );
                return Ok(());
            }
        }

        Err(VerifyError::Certificate(format!(
            "No trust anchor found for issuer {}",
            last.issuer()
        )))
    }

    fn time(&self) -> Result<ASN1Time, VerifyError> {
        let ts = self
            .verification_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        ASN1Time::from_timestamp(ts)
            .map_err(|e| VerifyError::Certificate(format!("Failed to convert time: {e}")))
    }
}

/// `issuer` signs the certificate at `child_idx`, so it must be a CA whose
/// path length constraint admits the intermediates below it.
fn check_ca(issuer: &X509Certificate<'_>, child_idx: usize) -> Result<(), VerifyError> {
    let constraints = issuer
        .basic_constraints()
        .map_err(|e| VerifyError::Certificate(format!("Invalid basic constraints: {e}")))?;
    let Some(constraints) = constraints.filter(|bc| bc.value.ca) else {
        return Err(VerifyError::Certificate(format!(
            "Issuer of certificate {child_idx} is not a CA"
        )));
    };
    if let Some(max) = constraints.value.path_len_constraint {
        // Intermediates strictly between the leaf and this issuer.
        if child_idx as u32 > max {
            return Err(VerifyError::Certificate(format!("Path length constraint {max} exceeded")));
        }
    }
    Ok(())
}

/// Anchors need not carry basic constraints, but a path length constraint
/// they do carry still bounds the intermediates beneath them.
fn check_anchor_path_len(
    anchor: &X509Certificate<'_>,
    intermediates: usize,
) -> Result<(), VerifyError> {
    let constraints = anchor
        .basic_constraints()
        .map_err(|e| VerifyError::Certificate(format!("Invalid basic constraints: {e}")))?;
    if let Some(max) = constraints.and_then(|bc| bc.value.path_len_constraint) {
        if intermediates as u32 > max {
            return Err(VerifyError::Certificate(format!(
                "Trust anchor path length constraint {max} exceeded"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::TrustAnchor;
    use crate::test_utils::{CertSpec, fido_subject, generate_ec_key, issue_cert};
    use rcgen::DnType;

    struct Chain {
        root: Vec<u8>,
        intermediate: Vec<u8>,
        leaf: Vec<u8>,
    }

    fn build_chain(leaf_expiry: Option<i32>) -> Chain {
        let root_key = generate_ec_key();
        let (root_cert, root) = issue_cert(
            &root_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Test Root CA")],
                is_ca: true,
                ..Default::default()
            },
            None,
        );
        let inter_key = generate_ec_key();
        let (inter_cert, intermediate) = issue_cert(
            &inter_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Test Intermediate CA")],
                is_ca: true,
                ..Default::default()
            },
            Some(&root_cert),
        );
        let leaf_key = generate_ec_key();
        let (_, leaf) = issue_cert(
            &leaf_key,
            CertSpec {
                subject: fido_subject(),
                not_after_year: leaf_expiry,
                ..Default::default()
            },
            Some(&inter_cert),
        );
        Chain {
            root,
            intermediate,
            leaf,
        }
    }

    fn anchors(ders: &[&Vec<u8>]) -> TrustAnchorSet {
        ders.iter()
            .map(|d| TrustAnchor::from_der((*d).clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_trust_anchors() {
        let chain = build_chain(None);
        let path = AttestationCertificatePath::new(vec![chain.leaf]).unwrap();
        let result = CertPathValidator::new().validate(&path, &TrustAnchorSet::new());
        if let Err(VerifyError::Certificate(msg)) = result {
            assert_eq!(msg, "trustAnchors is required; it must not be empty");
        } else {
            panic!("Expected VerifyError::Certificate");
        }
    }

    #[test]
    fn test_chain_to_root_anchor() {
        let chain = build_chain(None);
        let path =
            AttestationCertificatePath::new(vec![chain.leaf.clone(), chain.intermediate.clone()])
                .unwrap();
        assert!(CertPathValidator::new()
            .validate(&path, &anchors(&[&chain.root]))
            .is_ok());
    }

    #[test]
    fn test_path_including_anchor() {
        let chain = build_chain(None);
        let path = AttestationCertificatePath::new(vec![
            chain.leaf.clone(),
            chain.intermediate.clone(),
            chain.root.clone(),
        ])
        .unwrap();
        assert!(CertPathValidator::new()
            .validate(&path, &anchors(&[&chain.root]))
            .is_ok());
    }

    #[test]
    fn test_unrelated_anchor() {
        let chain = build_chain(None);
        let other = build_chain(None);
        let path =
            AttestationCertificatePath::new(vec![chain.leaf.clone(), chain.intermediate.clone()])
                .unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&other.root]));
        assert!(matches!(result, Err(VerifyError::Certificate(_))));
    }

    #[test]
    fn test_missing_intermediate() {
        let chain = build_chain(None);
        let path = AttestationCertificatePath::new(vec![chain.leaf.clone()]).unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&chain.root]));
        assert!(result.is_err());
    }

    #[test]
    fn test_expired_leaf() {
        let chain = build_chain(Some(2001));
        let path =
            AttestationCertificatePath::new(vec![chain.leaf.clone(), chain.intermediate.clone()])
                .unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&chain.root]));
        if let Err(VerifyError::Certificate(msg)) = result {
            assert!(msg.contains("expired or not yet valid"));
        } else {
            panic!("Expected VerifyError::Certificate");
        }

        // 1999-06-01, inside the leaf validity window.
        let validator = CertPathValidator::at_time(928_195_200);
        assert!(validator.validate(&path, &anchors(&[&chain.root])).is_ok());
    }

    /// root -> constrained CA -> extra CA -> leaf, where the constrained CA
    /// admits no intermediate below it.
    fn build_constrained_chain(constrained_path_len: u8) -> (Vec<u8>, Vec<Vec<u8>>) {
        let root_key = generate_ec_key();
        let (root_cert, root) = issue_cert(
            &root_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Test Root CA")],
                is_ca: true,
                ..Default::default()
            },
            None,
        );
        let constrained_key = generate_ec_key();
        let (constrained_cert, constrained) = issue_cert(
            &constrained_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Test Constrained CA")],
                is_ca: true,
                path_len: Some(constrained_path_len),
                ..Default::default()
            },
            Some(&root_cert),
        );
        let extra_key = generate_ec_key();
        let (extra_cert, extra) = issue_cert(
            &extra_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Test Extra CA")],
                is_ca: true,
                ..Default::default()
            },
            Some(&constrained_cert),
        );
        let leaf_key = generate_ec_key();
        let (_, leaf) = issue_cert(
            &leaf_key,
            CertSpec {
                subject: fido_subject(),
                ..Default::default()
            },
            Some(&extra_cert),
        );
        (root, vec![leaf, extra, constrained])
    }

    #[test]
    fn test_path_len_constraint_exceeded() {
        let (root, path) = build_constrained_chain(0);
        let path = AttestationCertificatePath::new(path).unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&root]));
        if let Err(VerifyError::Certificate(msg)) = result {
            assert!(msg.contains("Path length constraint 0 exceeded"));
        } else {
            panic!("Expected VerifyError::Certificate");
        }
    }

    #[test]
    fn test_path_len_constraint_satisfied() {
        let (root, path) = build_constrained_chain(1);
        let path = AttestationCertificatePath::new(path).unwrap();
        assert!(
            CertPathValidator::new()
                .validate(&path, &anchors(&[&root]))
                .is_ok()
        );
    }

    #[test]
    fn test_anchor_path_len_constraint_exceeded() {
        let (_, path) = build_constrained_chain(0);
        // The constrained CA itself is the anchor, with one CA below it.
        let anchor = path[2].clone();
        let path = AttestationCertificatePath::new(path[..2].to_vec()).unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&anchor]));
        if let Err(VerifyError::Certificate(msg)) = result {
            assert!(msg.contains("Trust anchor path length constraint 0 exceeded"));
        } else {
            panic!("Expected VerifyError::Certificate");
        }
    }

    #[test]
    fn test_non_ca_issuer_rejected() {
        let leaf_key = generate_ec_key();
        let (leaf_issuer_cert, leaf_issuer) = issue_cert(
            &leaf_key,
            CertSpec {
                subject: vec![(DnType::CommonName, "Not A CA")],
                ..Default::default()
            },
            None,
        );
        let child_key = generate_ec_key();
        let (_, child) = issue_cert(&child_key, CertSpec::default(), Some(&leaf_issuer_cert));
        let path = AttestationCertificatePath::new(vec![child, leaf_issuer.clone()]).unwrap();
        let result = CertPathValidator::new().validate(&path, &anchors(&[&leaf_issuer]));
        if let Err(VerifyError::Certificate(msg)) = result {
            assert!(msg.contains("is not a CA"));
        } else {
            panic!("Expected VerifyError::Certificate");
        }
    }
}
