//! Credential resolution for the transcription service
//!
//! Resolution is an explicit ordered chain, not an implicit global lookup:
//! an explicit per-call argument wins, then each provider in construction
//! order is asked until one yields a credential.

use secrecy::SecretString;

/// Environment variable holding the process-wide default credential
pub const CREDENTIAL_ENV_VAR: &str = "MURMUR_API_KEY";

/// A single source of bearer credentials
pub trait CredentialProvider: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// The credential this source holds, if any
    fn resolve(&self) -> Option<SecretString>;
}

/// Credential persisted in the configuration file
pub struct ConfiguredCredential {
    credential: Option<SecretString>,
}

impl ConfiguredCredential {
    #[must_use]
    pub const fn new(credential: Option<SecretString>) -> Self {
        Self { credential }
    }
}

impl CredentialProvider for ConfiguredCredential {
    fn name(&self) -> &'static str {
        "config"
    }

    fn resolve(&self) -> Option<SecretString> {
        self.credential.clone()
    }
}

/// Credential taken from a process environment variable
pub struct EnvCredential {
    var: &'static str,
}

impl EnvCredential {
    #[must_use]
    pub const fn new(var: &'static str) -> Self {
        Self { var }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(CREDENTIAL_ENV_VAR)
    }
}

impl CredentialProvider for EnvCredential {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn resolve(&self) -> Option<SecretString> {
        std::env::var(self.var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}

/// Ordered list of credential sources
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Resolve a credential: the explicit argument wins, else the first
    /// provider with one.
    #[must_use]
    pub fn resolve(&self, explicit: Option<&str>) -> Option<SecretString> {
        if let Some(credential) = explicit.filter(|c| !c.is_empty()) {
            return Some(SecretString::from(credential.to_string()));
        }

        self.providers.iter().find_map(|provider| {
            let resolved = provider.resolve();
            if resolved.is_some() {
                tracing::debug!(provider = provider.name(), "credential resolved");
            }
            resolved
        })
    }
}
