//! Credential discovery.
//!
//! A username comes from the caller or the configuration. The password for it
//! is looked up in a fixed order: explicit argument, configuration file, OS
//! keyring, interactive prompt. The first source that yields a password wins;
//! when none does, or there is no username at all, the session is
//! unauthenticated and endpoints that require a login answer 401.

use std::fmt;
use std::io::IsTerminal;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::OlogError;

/// A username/password pair for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Value for the `authorization` header.
    pub fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One place a password may come from.
///
/// Returning `Ok(None)` means "not here, try the next source"; a missing
/// backend is not an error.
pub trait CredentialSource {
    fn name(&self) -> &'static str;

    fn password(&self, username: &str) -> Result<Option<String>, OlogError>;
}

/// A password handed to the client directly.
pub struct Explicit(pub Option<String>);

impl CredentialSource for Explicit {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn password(&self, _username: &str) -> Result<Option<String>, OlogError> {
        Ok(self.0.clone().filter(|p| !p.is_empty()))
    }
}

/// The `password` key of the loaded configuration.
pub struct ConfigFile(pub Option<String>);

impl CredentialSource for ConfigFile {
    fn name(&self) -> &'static str {
        "config"
    }

    fn password(&self, _username: &str) -> Result<Option<String>, OlogError> {
        Ok(self.0.clone().filter(|p| !p.is_empty()))
    }
}

/// The operating system's secret store, keyed by service and username.
pub struct OsKeyring {
    service: String,
}

impl OsKeyring {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl CredentialSource for OsKeyring {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn password(&self, username: &str) -> Result<Option<String>, OlogError> {
        debug!(service = %self.service, username, "checking keyring");
        let entry = match keyring::Entry::new(&self.service, username) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "keyring unavailable");
                return Ok(None);
            }
        };
        match entry.get_password() {
            Ok(password) if !password.is_empty() => Ok(Some(password)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => {
                warn!(%error, "keyring lookup failed");
                Ok(None)
            }
        }
    }
}

/// Ask on the terminal. Skipped when stdin is not a terminal.
pub struct InteractivePrompt;

impl CredentialSource for InteractivePrompt {
    fn name(&self) -> &'static str {
        "prompt"
    }

    fn password(&self, username: &str) -> Result<Option<String>, OlogError> {
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }
        let password = rpassword::prompt_password(format!("Olog password for {username}: "))
            .map_err(|e| OlogError::Authentication(format!("could not read password: {e}")))?;
        Ok(Some(password).filter(|p| !p.is_empty()))
    }
}

/// Ordered list of password sources for one username.
pub struct CredentialChain {
    username: Option<String>,
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new(username: Option<String>) -> Self {
        Self {
            username: username.filter(|u| !u.trim().is_empty()),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The standard order: explicit, config file, keyring (if enabled),
    /// prompt (if interactive).
    pub fn standard(
        config: &ClientConfig,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        let username = username.or_else(|| config.default_owner().map(str::to_string));
        let mut chain = Self::new(username)
            .with_source(Explicit(password))
            .with_source(ConfigFile(config.configured_password().map(str::to_string)));
        if config.use_keyring {
            chain = chain.with_source(OsKeyring::new(&config.keyring_service));
        }
        if config.interactive {
            chain = chain.with_source(InteractivePrompt);
        }
        chain
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Walk the sources in order. `Ok(None)` means no authentication.
    pub fn resolve(&self) -> Result<Option<Credentials>, OlogError> {
        let Some(username) = self.username.as_deref() else {
            info!("no username configured, using an unauthenticated session");
            return Ok(None);
        };
        for source in &self.sources {
            if let Some(password) = source.password(username)? {
                info!(username, source = source.name(), "using credentials");
                return Ok(Some(Credentials::new(username, password)));
            }
        }
        info!(username, "no password found, using an unauthenticated session");
        Ok(None)
    }
}
