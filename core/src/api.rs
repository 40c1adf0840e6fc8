//! Stateless HTTP request builder and response parser for the Olog API.
//!
//! # Design
//! `OlogApi` holds only the base URL and the resolved credentials. Each
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes the matching `HttpResponse`. The
//! facade in [`crate::client`] runs the round-trips in between; tests can
//! check either side without a network.

use crate::codec::{self, AttachmentInfo, Wire};
use crate::credentials::Credentials;
use crate::error::OlogError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{DeleteTarget, FindQuery};
use crate::types::{LogEntry, Logbook, Property, Tag};

pub const LOGS_RESOURCE: &str = "/resources/logs";
pub const PROPERTIES_RESOURCE: &str = "/resources/properties";
pub const TAGS_RESOURCE: &str = "/resources/tags";
pub const LOGBOOKS_RESOURCE: &str = "/resources/logbooks";
pub const ATTACHMENTS_RESOURCE: &str = "/resources/attachments";

const JSON: &str = "application/json";

/// Form field the service reads uploaded files from.
const ATTACHMENT_FIELD: &str = "file";

fn segment(value: &str) -> String {
    urlencoding::encode(value.trim()).into_owned()
}

/// Synchronous, stateless request layer for the Olog API.
#[derive(Debug, Clone)]
pub struct OlogApi {
    base_url: String,
    credentials: Option<Credentials>,
}

impl OlogApi {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(credentials) = &self.credentials {
            headers.push(("authorization".to_string(), credentials.basic_auth()));
        }
        HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers,
            body: None,
        }
    }

    fn json_request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut request = self.request(method, path);
        request.headers.push(("accept".to_string(), JSON.to_string()));
        request
    }

    fn json_request_with_body<T: Wire>(
        &self,
        method: HttpMethod,
        path: &str,
        value: &T,
    ) -> Result<HttpRequest, OlogError> {
        let mut request = self.json_request(method, path);
        request
            .headers
            .push(("content-type".to_string(), JSON.to_string()));
        request.body = Some(codec::to_body(&value.encode())?);
        Ok(request)
    }

    // -- logs ---------------------------------------------------------------

    pub fn build_create_log(&self, entry: &LogEntry) -> Result<HttpRequest, OlogError> {
        self.json_request_with_body(HttpMethod::Post, LOGS_RESOURCE, entry)
    }

    /// The created entry as echoed by the server. It must carry an id.
    pub fn parse_create_log(&self, response: HttpResponse) -> Result<LogEntry, OlogError> {
        check_status(&response)?;
        let created = codec::decode_log_entries(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| OlogError::Deserialization("create response holds no log entry".into()))?;
        if created.id().is_none() {
            return Err(OlogError::Deserialization(
                "created log entry has no id".into(),
            ));
        }
        Ok(created)
    }

    pub fn build_find(&self, query: &FindQuery) -> HttpRequest {
        let path = if query.is_empty() {
            LOGS_RESOURCE.to_string()
        } else {
            format!("{LOGS_RESOURCE}?{}", query.to_query_string())
        };
        self.json_request(HttpMethod::Get, &path)
    }

    pub fn parse_find(&self, response: HttpResponse) -> Result<Vec<LogEntry>, OlogError> {
        check_status(&response)?;
        codec::decode_log_entries(&response.body)
    }

    // -- attachments --------------------------------------------------------

    pub fn build_upload_attachment(
        &self,
        log_id: u64,
        filename: &str,
        mime_type: &str,
        content: &[u8],
    ) -> HttpRequest {
        let part = codec::encode_multipart(ATTACHMENT_FIELD, filename, mime_type, content);
        let mut request = self.request(
            HttpMethod::Post,
            &format!("{ATTACHMENTS_RESOURCE}/{log_id}"),
        );
        request
            .headers
            .push(("content-type".to_string(), part.content_type));
        request.body = Some(part.body);
        request
    }

    pub fn parse_upload_attachment(&self, response: HttpResponse) -> Result<(), OlogError> {
        check_status(&response)
    }

    pub fn build_list_attachments(&self, log_id: u64) -> HttpRequest {
        self.json_request(HttpMethod::Get, &format!("{ATTACHMENTS_RESOURCE}/{log_id}"))
    }

    pub fn parse_list_attachments(
        &self,
        response: HttpResponse,
    ) -> Result<Vec<AttachmentInfo>, OlogError> {
        check_status(&response)?;
        codec::decode_envelope(&response.body, "attachment", AttachmentInfo::decode)
    }

    pub fn build_get_attachment(&self, log_id: u64, file_name: &str) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            &format!("{ATTACHMENTS_RESOURCE}/{log_id}/{}", segment(file_name)),
        )
    }

    /// Raw attachment content.
    pub fn parse_get_attachment(&self, response: HttpResponse) -> Result<Vec<u8>, OlogError> {
        check_status(&response)?;
        Ok(response.body)
    }

    // -- logbooks, tags, properties -----------------------------------------

    pub fn build_create_logbook(&self, logbook: &Logbook) -> Result<HttpRequest, OlogError> {
        let path = format!("{LOGBOOKS_RESOURCE}/{}", segment(logbook.name()));
        self.json_request_with_body(HttpMethod::Put, &path, logbook)
    }

    pub fn build_create_tag(&self, tag: &Tag) -> Result<HttpRequest, OlogError> {
        let path = format!("{TAGS_RESOURCE}/{}", segment(tag.name()));
        self.json_request_with_body(HttpMethod::Put, &path, tag)
    }

    pub fn build_create_property(&self, property: &Property) -> Result<HttpRequest, OlogError> {
        let path = format!("{PROPERTIES_RESOURCE}/{}", segment(property.name()));
        self.json_request_with_body(HttpMethod::Put, &path, property)
    }

    /// Shared by the three create-or-replace calls; the body is not used.
    pub fn parse_create(&self, response: HttpResponse) -> Result<(), OlogError> {
        check_status(&response)
    }

    pub fn build_list_tags(&self) -> HttpRequest {
        self.json_request(HttpMethod::Get, TAGS_RESOURCE)
    }

    pub fn parse_list_tags(&self, response: HttpResponse) -> Result<Vec<Tag>, OlogError> {
        check_status(&response)?;
        codec::decode_envelope(&response.body, "tag", Tag::decode)
    }

    pub fn build_list_logbooks(&self) -> HttpRequest {
        self.json_request(HttpMethod::Get, LOGBOOKS_RESOURCE)
    }

    pub fn parse_list_logbooks(&self, response: HttpResponse) -> Result<Vec<Logbook>, OlogError> {
        check_status(&response)?;
        codec::decode_envelope(&response.body, "logbook", Logbook::decode)
    }

    pub fn build_list_properties(&self) -> HttpRequest {
        self.json_request(HttpMethod::Get, PROPERTIES_RESOURCE)
    }

    pub fn parse_list_properties(&self, response: HttpResponse) -> Result<Vec<Property>, OlogError> {
        check_status(&response)?;
        codec::decode_envelope(&response.body, "property", Property::decode)
    }

    // -- delete -------------------------------------------------------------

    /// Every delete is a bodiless DELETE. Older Olog clients sent the property
    /// (`{"name": …, "attributes": {}}`) with a property delete; the service
    /// identifies it by the path alone, so no body is sent here.
    pub fn build_delete(&self, target: &DeleteTarget) -> HttpRequest {
        let path = match target {
            DeleteTarget::LogEntry(id) => format!("{LOGS_RESOURCE}/{id}"),
            DeleteTarget::Logbook(name) => format!("{LOGBOOKS_RESOURCE}/{}", segment(name)),
            DeleteTarget::Tag(name) => format!("{TAGS_RESOURCE}/{}", segment(name)),
            DeleteTarget::Property(name) => format!("{PROPERTIES_RESOURCE}/{}", segment(name)),
        };
        self.json_request(HttpMethod::Delete, &path)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), OlogError> {
        check_status(&response)
    }
}

/// Map any non-2xx status to `OlogError::HttpStatus`.
fn check_status(response: &HttpResponse) -> Result<(), OlogError> {
    if response.is_success() {
        return Ok(());
    }
    Err(OlogError::HttpStatus {
        status: response.status,
        body: response.text().into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn api() -> OlogApi {
        OlogApi::new("http://localhost:8080/Olog", None)
    }

    fn authed() -> OlogApi {
        OlogApi::new(
            "http://localhost:8080/Olog",
            Some(Credentials::new("controls", "secret")),
        )
    }

    #[test]
    fn build_list_tags_produces_correct_request() {
        let req = api().build_list_tags();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/tags");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert!(req.header("authorization").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn credentials_add_basic_auth_header() {
        let req = authed().build_list_logbooks();
        assert_eq!(
            req.header("authorization"),
            Some(Credentials::new("controls", "secret").basic_auth().as_str())
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let api = OlogApi::new("http://localhost:8080/Olog/", None);
        let req = api.build_list_properties();
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/properties");
    }

    #[test]
    fn build_create_log_posts_json_list() {
        let entry = LogEntry::builder("test")
            .owner("controls")
            .logbook(Logbook::new("ops", "controls").unwrap())
            .build(&ClientConfig::default())
            .unwrap();
        let req = api().build_create_log(&entry).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/logs");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body[0]["description"], "test");
        assert_eq!(body[0]["level"], "Info");
    }

    #[test]
    fn build_create_logbook_puts_by_name() {
        let logbook = Logbook::new("beam studies", "controls").unwrap();
        let req = api().build_create_logbook(&logbook).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(
            req.url,
            "http://localhost:8080/Olog/resources/logbooks/beam%20studies"
        );
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "name": "beam studies", "owner": "controls" }));
    }

    #[test]
    fn build_find_appends_query() {
        let req = api().build_find(&FindQuery::new().logbook("controls").tag("magnets"));
        assert_eq!(
            req.url,
            "http://localhost:8080/Olog/resources/logs?logbook=controls&tag=magnets"
        );
        let req = api().build_find(&FindQuery::new());
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/logs");
    }

    #[test]
    fn build_upload_attachment_is_multipart() {
        let req = authed().build_upload_attachment(7, "photo.jpg", "image/jpeg", b"jpeg");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/attachments/7");
        assert!(req
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
        assert!(req.header("authorization").is_some());
        let body = req.body_text().unwrap();
        assert!(body.contains("filename=\"photo.jpg\""));
        assert!(body.contains("Content-Type: image/jpeg"));
    }

    #[test]
    fn build_get_attachment_encodes_filename() {
        let req = api().build_get_attachment(7, "scan 1.png");
        assert_eq!(
            req.url,
            "http://localhost:8080/Olog/resources/attachments/7/scan%201.png"
        );
    }

    #[test]
    fn build_delete_targets_each_resource() {
        let api = api();
        assert_eq!(
            api.build_delete(&DeleteTarget::LogEntry(12)).url,
            "http://localhost:8080/Olog/resources/logs/12"
        );
        assert_eq!(
            api.build_delete(&DeleteTarget::logbook(" ops ").unwrap()).url,
            "http://localhost:8080/Olog/resources/logbooks/ops"
        );
        assert_eq!(
            api.build_delete(&DeleteTarget::tag("myTag").unwrap()).url,
            "http://localhost:8080/Olog/resources/tags/myTag"
        );
        let req = api.build_delete(&DeleteTarget::property("position").unwrap());
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:8080/Olog/resources/properties/position");
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_list_tags_success() {
        let response = HttpResponse::new(
            200,
            r#"{"tag":[{"name":"Magnets","state":"Active"},{"name":"RF","state":"Inactive"}]}"#,
        );
        let tags = api().parse_list_tags(response).unwrap();
        assert_eq!(
            tags,
            vec![
                Tag::new("Magnets").unwrap(),
                Tag::with_state("RF", "Inactive").unwrap()
            ]
        );
    }

    #[test]
    fn parse_create_log_returns_entry_with_id() {
        let response = HttpResponse::new(
            200,
            r#"[{"id":99,"owner":"controls","description":"test","createdDate":1358271830000,
                "modifiedDate":1358271830000,"logbooks":[{"name":"ops","owner":"controls"}],
                "tags":[],"properties":[]}]"#,
        );
        let created = api().parse_create_log(response).unwrap();
        assert_eq!(created.id(), Some(99));
        assert_eq!(created.text(), "test");
    }

    #[test]
    fn parse_create_log_without_id_fails() {
        let response = HttpResponse::new(
            200,
            r#"[{"owner":"controls","description":"test","logbooks":[{"name":"ops","owner":"controls"}]}]"#,
        );
        let err = api().parse_create_log(response).unwrap_err();
        assert!(matches!(err, OlogError::Deserialization(_)));
    }

    #[test]
    fn any_non_success_status_is_an_http_error() {
        for status in [301, 400, 401, 404, 500] {
            let err = api()
                .parse_delete(HttpResponse::new(status, "nope"))
                .unwrap_err();
            assert!(
                matches!(err, OlogError::HttpStatus { status: s, ref body } if s == status && body == "nope"),
                "status {status}"
            );
        }
    }

    #[test]
    fn parse_create_accepts_any_2xx() {
        assert!(api().parse_create(HttpResponse::new(200, "")).is_ok());
        assert!(api().parse_create(HttpResponse::new(201, "")).is_ok());
        assert!(api().parse_create(HttpResponse::new(204, "")).is_ok());
    }

    #[test]
    fn parse_get_attachment_returns_raw_bytes() {
        let response = HttpResponse::new(200, vec![0u8, 159, 146, 150]);
        assert_eq!(api().parse_get_attachment(response).unwrap(), vec![0u8, 159, 146, 150]);
    }
}
