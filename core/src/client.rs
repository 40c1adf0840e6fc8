//! Blocking Olog client.
//!
//! `OlogClient` pairs the stateless [`OlogApi`] with a [`Transport`] and runs
//! each operation's round-trips in order. There is no retry and no rollback:
//! the first failing call ends the operation and its error is returned, while
//! anything already written on the server stays there.

use tracing::{debug, info};

use crate::api::OlogApi;
use crate::codec::AttachmentInfo;
use crate::config::ClientConfig;
use crate::credentials::{CredentialChain, Credentials};
use crate::error::OlogError;
use crate::http::{HttpRequest, HttpResponse};
use crate::query::{DeleteTarget, FindQuery};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Attachment, LogEntry, Logbook, Property, Tag};

/// Configures and opens an [`OlogClient`].
///
/// ```no_run
/// use olog_client::{ClientConfig, LogEntry, OlogClient};
///
/// let config = ClientConfig::load()?;
/// let client = OlogClient::builder(config)
///     .credentials("controls", "secret")
///     .connect()?;
/// let entry = LogEntry::builder("Beam dump at 14:02").build(client.config())?;
/// let created = client.log(&entry)?;
/// println!("created entry {:?}", created.id());
/// # Ok::<(), olog_client::OlogError>(())
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    chain: Option<CredentialChain>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            url: None,
            username: None,
            password: None,
            chain: None,
        }
    }

    /// Base URL, overriding the configured one.
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Explicit credentials; they take precedence over every other source.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.config.interactive = interactive;
        self
    }

    /// Replace the standard credential lookup entirely.
    pub fn credential_chain(mut self, chain: CredentialChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Connect over HTTP(S) with the default transport.
    pub fn connect(self) -> Result<OlogClient<UreqTransport>, OlogError> {
        let transport = UreqTransport::with_verification(!self.config.insecure);
        self.connect_with(transport)
    }

    /// Resolve credentials, then list tags once so that a wrong URL or
    /// rejected credentials fail here rather than on first use.
    pub fn connect_with<T: Transport>(self, transport: T) -> Result<OlogClient<T>, OlogError> {
        let url = match self.url {
            Some(url) => url,
            None => self
                .config
                .base_url()
                .map(str::to_string)
                .ok_or_else(|| OlogError::Validation("no Olog URL configured".to_string()))?,
        };
        info!(%url, "using base URL");

        let chain = match self.chain {
            Some(chain) => chain,
            None => CredentialChain::standard(&self.config, self.username, self.password),
        };
        let credentials = chain.resolve()?;

        let client = OlogClient {
            api: OlogApi::new(&url, credentials),
            transport,
            config: self.config,
        };
        client.list_tags()?;
        Ok(client)
    }
}

/// Session with one Olog service.
///
/// Not meant to be shared between threads; use one client per thread.
pub struct OlogClient<T = UreqTransport> {
    api: OlogApi,
    transport: T,
    config: ClientConfig,
}

impl OlogClient<UreqTransport> {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Connect using only the given configuration.
    pub fn connect(config: ClientConfig) -> Result<Self, OlogError> {
        ClientBuilder::new(config).connect()
    }
}

impl<T: Transport> OlogClient<T> {
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.credentials().is_some()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.api.credentials()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, OlogError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(request)?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }

    /// Create a log entry, then upload its attachments one by one.
    ///
    /// Attachment content is read before anything is sent, so an unreadable
    /// file fails the call without creating the entry. Once the entry exists,
    /// a failed upload leaves the entry and any earlier uploads in place.
    pub fn log(&self, entry: &LogEntry) -> Result<LogEntry, OlogError> {
        let uploads = entry
            .attachments()
            .iter()
            .map(|attachment| -> Result<_, OlogError> {
                Ok((attachment.filename(), attachment.mime_type(), attachment.read()?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let created = self
            .api
            .parse_create_log(self.round_trip(self.api.build_create_log(entry)?)?)?;
        let id = created
            .id()
            .ok_or_else(|| OlogError::Deserialization("created log entry has no id".into()))?;

        for (filename, mime_type, content) in &uploads {
            let request = self
                .api
                .build_upload_attachment(id, filename, mime_type, content);
            self.api.parse_upload_attachment(self.round_trip(request)?)?;
            debug!(id, %filename, "attachment uploaded");
        }

        info!(id, attachments = uploads.len(), "log entry created");
        Ok(created)
    }

    pub fn create_logbook(&self, logbook: &Logbook) -> Result<(), OlogError> {
        let request = self.api.build_create_logbook(logbook)?;
        self.api.parse_create(self.round_trip(request)?)
    }

    pub fn create_tag(&self, tag: &Tag) -> Result<(), OlogError> {
        let request = self.api.build_create_tag(tag)?;
        self.api.parse_create(self.round_trip(request)?)
    }

    pub fn create_property(&self, property: &Property) -> Result<(), OlogError> {
        let request = self.api.build_create_property(property)?;
        self.api.parse_create(self.round_trip(request)?)
    }

    /// Log entries matching every criterion of `query`, in server order.
    pub fn find(&self, query: &FindQuery) -> Result<Vec<LogEntry>, OlogError> {
        self.api.parse_find(self.round_trip(self.api.build_find(query))?)
    }

    /// Download every attachment of a log entry into temporary files.
    pub fn list_attachments(&self, log_id: u64) -> Result<Vec<Attachment>, OlogError> {
        let infos: Vec<AttachmentInfo> = self
            .api
            .parse_list_attachments(self.round_trip(self.api.build_list_attachments(log_id))?)?;

        let mut attachments = Vec::with_capacity(infos.len());
        for info in infos {
            let request = self.api.build_get_attachment(log_id, &info.file_name);
            let content = self.api.parse_get_attachment(self.round_trip(request)?)?;
            attachments.push(Attachment::materialize(&info.file_name, &content)?);
        }
        Ok(attachments)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>, OlogError> {
        self.api.parse_list_tags(self.round_trip(self.api.build_list_tags())?)
    }

    pub fn list_logbooks(&self) -> Result<Vec<Logbook>, OlogError> {
        self.api
            .parse_list_logbooks(self.round_trip(self.api.build_list_logbooks())?)
    }

    pub fn list_properties(&self) -> Result<Vec<Property>, OlogError> {
        self.api
            .parse_list_properties(self.round_trip(self.api.build_list_properties())?)
    }

    pub fn delete(&self, target: &DeleteTarget) -> Result<(), OlogError> {
        target.check()?;
        self.api.parse_delete(self.round_trip(self.api.build_delete(target))?)?;
        info!(%target, "deleted");
        Ok(())
    }
}
