//! In-memory API key holder with redacted debug output.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{ProviderError, ProviderId};

#[derive(PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zeroes are valid UTF-8 and the string is never read again.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

#[derive(Default)]
pub struct SecureCredentialManager {
    api_keys: Mutex<HashMap<ProviderId, SecretString>>,
}

impl std::fmt::Debug for SecureCredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureCredentialManager")
            .field("api_keys", &"[REDACTED]")
            .finish()
    }
}

impl SecureCredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(
        &self,
        provider: ProviderId,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ProviderError::authentication("api key must not be empty"));
        }

        self.keys()?.insert(provider, api_key);
        Ok(())
    }

    pub fn has_api_key(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.keys()?.contains_key(&provider))
    }

    pub fn with_api_key<R>(
        &self,
        provider: ProviderId,
        f: impl FnOnce(&str) -> R,
    ) -> Result<Option<R>, ProviderError> {
        Ok(self.keys()?.get(&provider).map(|secret| f(secret.expose())))
    }

    /// Copies the key out for a single request header.
    pub fn require_api_key(&self, provider: ProviderId) -> Result<String, ProviderError> {
        self.with_api_key(provider, str::to_string)?
            .ok_or_else(|| {
                ProviderError::authentication(format!("no {provider} credentials configured"))
            })
    }

    pub fn clear(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.keys()?.remove(&provider).is_some())
    }

    fn keys(&self) -> Result<MutexGuard<'_, HashMap<ProviderId, SecretString>>, ProviderError> {
        self.api_keys
            .lock()
            .map_err(|_| ProviderError::other("credential manager lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretString::new("sk-ant-123");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }

    #[test]
    fn api_keys_are_scoped_per_provider() {
        let credentials = SecureCredentialManager::new();
        credentials
            .set_api_key(ProviderId::Anthropic, "sk-ant-123")
            .expect("key should store");

        assert_eq!(
            credentials
                .require_api_key(ProviderId::Anthropic)
                .expect("key should resolve"),
            "sk-ant-123"
        );

        let missing = credentials
            .require_api_key(ProviderId::OpenAi)
            .expect_err("openai key is missing");
        assert_eq!(missing.kind, ProviderErrorKind::Authentication);
    }

    #[test]
    fn blank_keys_are_rejected() {
        let credentials = SecureCredentialManager::new();
        assert!(credentials.set_api_key(ProviderId::OpenAi, "  ").is_err());
    }
}
