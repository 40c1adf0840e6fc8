//! Layered client configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `/etc/olog/config.toml` (site-wide)
//! 3. `~/.config/olog/config.toml` (user)
//! 4. `./olog.toml` (working directory)
//! 5. Environment variables with the `OLOG_` prefix (`OLOG_URL`,
//!    `OLOG_USERNAME`, `OLOG_LOGBOOKS`, ...)
//!
//! `logbooks` and `tags` accept either a TOML array or a comma-separated
//! string, so `OLOG_LOGBOOKS=controls,operations` works from the shell.

use std::fmt;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::OlogError;

const DEFAULT_KEYRING_SERVICE: &str = "olog";

const ENV_PREFIX: &str = "OLOG_";

/// Keys whose environment values are strings even when they look numeric.
const TEXT_KEYS: &[&str] = &["url", "username", "password", "logbooks", "tags", "keyring_service"];

const fn default_true() -> bool {
    true
}

fn default_keyring_service() -> String {
    DEFAULT_KEYRING_SERVICE.to_string()
}

/// Connection settings and the defaults applied to new log entries.
#[derive(Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL of the Olog service, e.g. `https://olog.example.org/Olog`.
    #[serde(default)]
    pub url: Option<String>,

    /// User to authenticate as. Also the default owner of new log entries.
    #[serde(default, deserialize_with = "optional_text")]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub password: Option<String>,

    /// Logbooks used when a log entry names none.
    #[serde(default, deserialize_with = "string_list")]
    pub logbooks: Vec<String>,

    /// Tags used when a log entry names none.
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,

    /// Whether the client may prompt on the terminal for a password.
    #[serde(default = "default_true")]
    pub interactive: bool,

    /// Whether the OS credential store is consulted for a password.
    #[serde(default = "default_true")]
    pub use_keyring: bool,

    /// Service name under which passwords are stored in the OS keyring.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Skip TLS certificate verification (self-signed servers).
    #[serde(default)]
    pub insecure: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            logbooks: Vec::new(),
            tags: Vec::new(),
            interactive: true,
            use_keyring: true,
            keyring_service: default_keyring_service(),
            insecure: false,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("logbooks", &self.logbooks)
            .field("tags", &self.tags)
            .field("interactive", &self.interactive)
            .field("use_keyring", &self.use_keyring)
            .field("keyring_service", &self.keyring_service)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from every source listed in the module docs.
    pub fn load() -> Result<Self, OlogError> {
        Self::figment().extract().map_err(OlogError::from)
    }

    /// Build the figment provider chain.
    ///
    /// Public so callers can layer extra providers on top before extracting.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        for path in Self::file_paths() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // Text keys are taken verbatim: the `Env` provider would read
        // `OLOG_PASSWORD=007` as the integer 7.
        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(TEXT_KEYS));
        for key in TEXT_KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        figment
    }

    fn file_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/olog/config.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("olog").join("config.toml"));
        }
        paths.push(PathBuf::from("olog.toml"));
        paths
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_logbooks<I, S>(mut self, logbooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logbooks = logbooks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_keyring(mut self, use_keyring: bool) -> Self {
        self.use_keyring = use_keyring;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// The configured base URL, if it is set and not blank.
    pub fn base_url(&self) -> Option<&str> {
        non_blank(self.url.as_deref())
    }

    /// Owner applied to log entries built without one.
    pub fn default_owner(&self) -> Option<&str> {
        non_blank(self.username.as_deref())
    }

    pub fn configured_password(&self) -> Option<&str> {
        non_blank(self.password.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A value written where text is expected, e.g. `password = 123456` in TOML.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

/// Accept `["a", "b"]` or `"a, b"`; blank items are dropped.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(Scalar),
        Many(Vec<Scalar>),
    }

    let items: Vec<String> = match Raw::deserialize(deserializer)? {
        Raw::One(Scalar::Text(joined)) => joined.split(',').map(str::to_string).collect(),
        Raw::One(other) => vec![other.into()],
        Raw::Many(items) => items.into_iter().map(String::from).collect(),
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = ClientConfig::default();
        assert!(config.base_url().is_none());
        assert!(config.default_owner().is_none());
        assert!(config.logbooks.is_empty());
        assert!(config.interactive);
        assert!(config.use_keyring);
        assert_eq!(config.keyring_service, "olog");
        assert!(!config.insecure);
    }

    #[test]
    fn loads_from_working_directory_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "olog.toml",
                r#"
url = "https://olog.example.org/Olog"
username = "controls"
logbooks = ["commissioning", "operations"]
tags = "TimingSystem, Magnets"
interactive = false
"#,
            )?;

            let config = ClientConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.base_url(), Some("https://olog.example.org/Olog"));
            assert_eq!(config.default_owner(), Some("controls"));
            assert_eq!(config.logbooks, vec!["commissioning", "operations"]);
            assert_eq!(config.tags, vec!["TimingSystem", "Magnets"]);
            assert!(!config.interactive);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("olog.toml", r#"username = "from-file""#)?;
            jail.set_env("OLOG_USERNAME", "from-env");
            jail.set_env("OLOG_LOGBOOKS", "controls,ops");

            let config = ClientConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.default_owner(), Some("from-env"));
            assert_eq!(config.logbooks, vec!["controls", "ops"]);
            Ok(())
        });
    }

    #[test]
    fn numeric_looking_environment_values_stay_text() {
        Jail::expect_with(|jail| {
            jail.set_env("OLOG_USERNAME", "1001");
            jail.set_env("OLOG_PASSWORD", "007");
            jail.set_env("OLOG_LOGBOOKS", "2024");
            jail.set_env("OLOG_INTERACTIVE", "false");

            let config = ClientConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.default_owner(), Some("1001"));
            assert_eq!(config.configured_password(), Some("007"));
            assert_eq!(config.logbooks, vec!["2024"]);
            assert!(!config.interactive);
            Ok(())
        });
    }

    #[test]
    fn numbers_in_toml_are_read_as_text() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "olog.toml",
                r#"
username = 1001
password = 123456
tags = [2024, "Magnets"]
"#,
            )?;

            let config = ClientConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.default_owner(), Some("1001"));
            assert_eq!(config.configured_password(), Some("123456"));
            assert_eq!(config.tags, vec!["2024", "Magnets"]);
            Ok(())
        });
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ClientConfig::default().with_username("  ").with_url("");
        assert!(config.default_owner().is_none());
        assert!(config.base_url().is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let config = ClientConfig::default().with_password("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
