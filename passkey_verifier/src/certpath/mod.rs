mod attestation_certificate;
mod validator;

pub use attestation_certificate::AttestationCertificate;
pub use validator::{AttestationCertificatePath, CertPathValidator};
