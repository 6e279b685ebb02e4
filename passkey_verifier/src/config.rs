use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Duration;
use url::Url;

use crate::ceremony::{
    AuthenticationParameters, RegistrationParameters, ServerProperty, UserVerificationRequirement,
    default_allowed_algorithms,
};
use crate::codec::CoseAlgorithm;
use crate::errors::VerifyError;

static DOTENV: LazyLock<()> = LazyLock::new(|| {
    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file found, using process environment only");
    }
});

/// Relying party settings read from the environment.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub origins: Vec<String>,
    pub rp_id: String,
    pub user_verification: UserVerificationRequirement,
    pub user_presence_required: bool,
    pub allowed_algorithms: Vec<CoseAlgorithm>,
    pub strict_attestation: bool,
    pub allow_self_and_none_attestation: bool,
    pub trust_anchor_files: Vec<PathBuf>,
    pub trust_anchor_bundle: Option<PathBuf>,
    pub safetynet_forward_threshold: Duration,
    pub safetynet_backward_threshold: Duration,
    pub fail_on_counter_regression: bool,
}

impl VerifierConfig {
    /// Reads `ORIGIN` and the `PASSKEY_*` variables. Only a missing or
    /// unusable `ORIGIN` is an error; other invalid values fall back to
    /// their defaults with a warning.
    pub fn from_env() -> Result<Self, VerifyError> {
        LazyLock::force(&DOTENV);

        let origin = env::var("ORIGIN")
            .map_err(|_| VerifyError::Config("ORIGIN must be set".to_string()))?;
        let rp_id = match env::var("PASSKEY_RP_ID").ok() {
            Some(rp_id) if !rp_id.is_empty() => rp_id,
            _ => rp_id_from_origin(&origin)?,
        };

        let mut origins = vec![origin];
        origins.extend(list_var("PASSKEY_ADDITIONAL_ORIGINS"));

        let user_verification = match env::var("PASSKEY_USER_VERIFICATION").ok() {
            None => UserVerificationRequirement::Preferred,
            Some(v) => v.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid user verification: {}. Using default 'preferred'", v);
                UserVerificationRequirement::Preferred
            }),
        };

        let user_presence_required = env::var("PASSKEY_USER_PRESENCE").map_or(true, |v| {
            match v.to_lowercase().as_str() {
                "required" => true,
                "optional" => false,
                invalid => {
                    tracing::warn!("Invalid user presence: {}. Using default 'required'", invalid);
                    true
                }
            }
        });

        let allowed_algorithms = match env::var("PASSKEY_ALLOWED_ALGORITHMS").ok() {
            None => default_allowed_algorithms(),
            Some(v) => {
                let algorithms: Vec<CoseAlgorithm> = v
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .filter_map(|name| {
                        let alg = algorithm_from_name(name);
                        if alg.is_none() {
                            tracing::warn!("Ignoring unknown algorithm: {}", name);
                        }
                        alg
                    })
                    .collect();
                if algorithms.is_empty() {
                    tracing::warn!(
                        "No usable algorithms in PASSKEY_ALLOWED_ALGORITHMS. Using defaults"
                    );
                    default_allowed_algorithms()
                } else {
                    algorithms
                }
            }
        };

        Ok(Self {
            origins,
            rp_id,
            user_verification,
            user_presence_required,
            allowed_algorithms,
            strict_attestation: bool_var("PASSKEY_STRICT_ATTESTATION", false),
            allow_self_and_none_attestation: bool_var("PASSKEY_ALLOW_SELF_ATTESTATION", false),
            trust_anchor_files: list_var("PASSKEY_TRUST_ANCHOR_FILES")
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            trust_anchor_bundle: env::var("PASSKEY_TRUST_ANCHOR_BUNDLE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            safetynet_forward_threshold: seconds_var("PASSKEY_SAFETYNET_FORWARD_THRESHOLD", 0),
            safetynet_backward_threshold: seconds_var("PASSKEY_SAFETYNET_BACKWARD_THRESHOLD", 60),
            fail_on_counter_regression: bool_var("PASSKEY_FAIL_ON_COUNTER_REGRESSION", false),
        })
    }

    pub fn server_property(&self, challenge: Vec<u8>) -> ServerProperty {
        ServerProperty {
            origins: self.origins.clone(),
            rp_id: self.rp_id.clone(),
            challenge,
            token_binding_id: None,
        }
    }

    pub fn registration_parameters(&self, challenge: Vec<u8>) -> RegistrationParameters {
        let mut params = RegistrationParameters::new(self.server_property(challenge));
        params.user_verification = self.user_verification;
        params.user_presence_required = self.user_presence_required;
        params.allowed_algorithms = self.allowed_algorithms.clone();
        params
    }

    pub fn authentication_parameters(&self, challenge: Vec<u8>) -> AuthenticationParameters {
        let mut params = AuthenticationParameters::new(self.server_property(challenge));
        params.user_verification = self.user_verification;
        params.user_presence_required = self.user_presence_required;
        params
    }
}

fn rp_id_from_origin(origin: &str) -> Result<String, VerifyError> {
    let url = Url::parse(origin)
        .map_err(|e| VerifyError::Config(format!("Invalid ORIGIN {origin}: {e}")))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| VerifyError::Config(format!("Could not extract RP ID from ORIGIN {origin}")))
}

fn algorithm_from_name(name: &str) -> Option<CoseAlgorithm> {
    match name.to_uppercase().as_str() {
        "ES256" => Some(CoseAlgorithm::ES256),
        "ES384" => Some(CoseAlgorithm::ES384),
        "ES512" => Some(CoseAlgorithm::ES512),
        "EDDSA" => Some(CoseAlgorithm::EdDSA),
        "RS256" => Some(CoseAlgorithm::RS256),
        "RS384" => Some(CoseAlgorithm::RS384),
        "RS512" => Some(CoseAlgorithm::RS512),
        "PS256" => Some(CoseAlgorithm::PS256),
        "RS1" => Some(CoseAlgorithm::RS1),
        _ => None,
    }
}

fn list_var(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn bool_var(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| match v.to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        invalid => {
            tracing::warn!("Invalid {}: {}. Using default '{}'", key, invalid, default);
            default
        }
    })
}

fn seconds_var(key: &str, default: i64) -> Duration {
    let fallback = Duration::seconds(default);
    let Ok(v) = env::var(key) else {
        return fallback;
    };
    match v.parse::<i64>().ok().and_then(Duration::try_seconds) {
        Some(duration) => duration,
        None => {
            tracing::warn!("Invalid {}: {}. Using default '{}'", key, v, default);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_KEYS: &[&str] = &[
        "ORIGIN",
        "PASSKEY_RP_ID",
        "PASSKEY_ADDITIONAL_ORIGINS",
        "PASSKEY_USER_VERIFICATION",
        "PASSKEY_USER_PRESENCE",
        "PASSKEY_ALLOWED_ALGORITHMS",
        "PASSKEY_STRICT_ATTESTATION",
        "PASSKEY_ALLOW_SELF_ATTESTATION",
        "PASSKEY_TRUST_ANCHOR_FILES",
        "PASSKEY_TRUST_ANCHOR_BUNDLE",
        "PASSKEY_SAFETYNET_FORWARD_THRESHOLD",
        "PASSKEY_SAFETYNET_BACKWARD_THRESHOLD",
        "PASSKEY_FAIL_ON_COUNTER_REGRESSION",
    ];

    /// Runs `test` with exactly `vars` set among the keys this module reads,
    /// restoring the previous environment afterward.
    fn with_env<F, R>(vars: &[(&str, &str)], test: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original: Vec<(&str, Option<String>)> =
            ALL_KEYS.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in ALL_KEYS {
            unsafe { env::remove_var(key) };
        }
        for (key, value) in vars {
            unsafe { env::set_var(key, value) };
        }

        let result = test();

        for (key, value) in original {
            match value {
                Some(val) => unsafe { env::set_var(key, val) },
                None => unsafe { env::remove_var(key) },
            }
        }
        result
    }

    #[test]
    #[serial]
    fn test_missing_origin() {
        with_env(&[], || {
            assert!(matches!(
                VerifierConfig::from_env(),
                Err(VerifyError::Config(_))
            ));
        });
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_env(&[("ORIGIN", "https://login.example.com:8443")], || {
            let config = VerifierConfig::from_env().unwrap();
            assert_eq!(config.rp_id, "login.example.com");
            assert_eq!(config.origins, vec!["https://login.example.com:8443"]);
            assert_eq!(config.user_verification, UserVerificationRequirement::Preferred);
            assert!(config.user_presence_required);
            assert_eq!(config.allowed_algorithms, default_allowed_algorithms());
            assert!(!config.strict_attestation);
            assert!(config.trust_anchor_files.is_empty());
            assert!(config.trust_anchor_bundle.is_none());
            assert_eq!(config.safetynet_forward_threshold, Duration::zero());
            assert_eq!(config.safetynet_backward_threshold, Duration::seconds(60));
            assert!(!config.fail_on_counter_regression);
        });
    }

    #[test]
    #[serial]
    fn test_explicit_values() {
        with_env(
            &[
                ("ORIGIN", "https://example.com"),
                ("PASSKEY_RP_ID", "example.com"),
                ("PASSKEY_ADDITIONAL_ORIGINS", "https://a.example.com, https://b.example.com"),
                ("PASSKEY_USER_VERIFICATION", "Required"),
                ("PASSKEY_USER_PRESENCE", "optional"),
                ("PASSKEY_ALLOWED_ALGORITHMS", "es256,EdDSA"),
                ("PASSKEY_STRICT_ATTESTATION", "true"),
                ("PASSKEY_TRUST_ANCHOR_FILES", "/etc/a.pem,/etc/b.der"),
                ("PASSKEY_SAFETYNET_BACKWARD_THRESHOLD", "120"),
                ("PASSKEY_FAIL_ON_COUNTER_REGRESSION", "true"),
            ],
            || {
                let config = VerifierConfig::from_env().unwrap();
                assert_eq!(config.origins.len(), 3);
                assert_eq!(config.origins[2], "https://b.example.com");
                assert_eq!(config.user_verification, UserVerificationRequirement::Required);
                assert!(!config.user_presence_required);
                assert_eq!(
                    config.allowed_algorithms,
                    vec![CoseAlgorithm::ES256, CoseAlgorithm::EdDSA]
                );
                assert!(config.strict_attestation);
                assert_eq!(
                    config.trust_anchor_files,
                    vec![PathBuf::from("/etc/a.pem"), PathBuf::from("/etc/b.der")]
                );
                assert_eq!(config.safetynet_backward_threshold, Duration::seconds(120));
                assert!(config.fail_on_counter_regression);
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        with_env(
            &[
                ("ORIGIN", "https://example.com"),
                ("PASSKEY_USER_VERIFICATION", "sometimes"),
                ("PASSKEY_USER_PRESENCE", "maybe"),
                ("PASSKEY_ALLOWED_ALGORITHMS", "HS256"),
                ("PASSKEY_STRICT_ATTESTATION", "yes"),
                ("PASSKEY_SAFETYNET_FORWARD_THRESHOLD", "soon"),
            ],
            || {
                let config = VerifierConfig::from_env().unwrap();
                assert_eq!(config.user_verification, UserVerificationRequirement::Preferred);
                assert!(config.user_presence_required);
                assert_eq!(config.allowed_algorithms, default_allowed_algorithms());
                assert!(!config.strict_attestation);
                assert_eq!(config.safetynet_forward_threshold, Duration::zero());
            },
        );
    }

    #[test]
    #[serial]
    fn test_out_of_range_threshold_falls_back() {
        with_env(
            &[
                ("ORIGIN", "https://example.com"),
                ("PASSKEY_SAFETYNET_FORWARD_THRESHOLD", "9223372036854775807"),
                ("PASSKEY_SAFETYNET_BACKWARD_THRESHOLD", "-9223372036854775808"),
            ],
            || {
                let config = VerifierConfig::from_env().unwrap();
                assert_eq!(config.safetynet_forward_threshold, Duration::zero());
                assert_eq!(config.safetynet_backward_threshold, Duration::seconds(60));
            },
        );
    }

    #[test]
    #[serial]
    fn test_parameters_from_config() {
        with_env(
            &[
                ("ORIGIN", "https://example.com"),
                ("PASSKEY_USER_VERIFICATION", "required"),
            ],
            || {
                let config = VerifierConfig::from_env().unwrap();
                let reg = config.registration_parameters(b"challenge".to_vec());
                assert_eq!(reg.server_property.rp_id, "example.com");
                assert_eq!(reg.server_property.challenge, b"challenge");
                assert!(reg.user_verification.is_required());

                let auth = config.authentication_parameters(b"other".to_vec());
                assert_eq!(auth.server_property.origins, vec!["https://example.com"]);
                assert!(auth.allow_credentials.is_empty());
            },
        );
    }

    #[test]
    fn test_rp_id_from_origin() {
        assert_eq!(rp_id_from_origin("http://localhost:3000").unwrap(), "localhost");
        assert!(rp_id_from_origin("not a url").is_err());
    }
}
