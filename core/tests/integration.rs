//! End-to-end tests against the mock Olog over real HTTP.
//!
//! Each test starts its own mock server on a random port and talks to it with
//! the default ureq transport, so request building, the transport and
//! response parsing are all exercised together.

use chrono::{Duration, Utc};
use olog_client::{
    Attachment, ClientConfig, DeleteTarget, FindQuery, LogEntry, Logbook, OlogClient, OlogError,
    Property, Tag,
};

/// Serve `app` on 127.0.0.1 from a background thread and return its base URL.
fn spawn(app: axum::Router) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_olog::run_app(listener, app).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// A config that never touches the keyring or the terminal.
fn config(url: &str) -> ClientConfig {
    ClientConfig::default()
        .with_url(url)
        .with_username("ops")
        .with_logbooks(["Operations"])
        .with_interactive(false)
        .with_keyring(false)
}

#[test]
fn full_lifecycle() {
    let url = spawn(mock_olog::app());
    let client = OlogClient::builder(config(&url))
        .credentials("ops", "secret")
        .connect()
        .unwrap();
    assert!(client.is_authenticated());

    // Step 1: reference data.
    client
        .create_logbook(&Logbook::new("Operations", "ops").unwrap())
        .unwrap();
    client.create_tag(&Tag::new("Beam").unwrap()).unwrap();
    client
        .create_property(
            &Property::new("Ticket")
                .unwrap()
                .attribute("id", 42)
                .attribute("url", "https://tickets.example.org/42"),
        )
        .unwrap();

    assert_eq!(client.list_tags().unwrap(), vec![Tag::new("Beam").unwrap()]);
    assert_eq!(
        client.list_logbooks().unwrap(),
        vec![Logbook::new("Operations", "ops").unwrap()]
    );
    let properties = client.list_properties().unwrap();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].attribute_value("id"), Some("42"));

    // Step 2: an entry with one attachment, logbook taken from the config.
    let entry = LogEntry::builder("Beam dump at 14:02")
        .tag(Tag::new("Beam").unwrap())
        .property(Property::new("Ticket").unwrap().attribute("id", 42))
        .attachment(Attachment::from_bytes(b"dump trace".to_vec(), "trace.txt").unwrap())
        .build(client.config())
        .unwrap();
    let created = client.log(&entry).unwrap();
    let id = created.id().unwrap();
    assert_eq!(created.text(), "Beam dump at 14:02");
    assert_eq!(created.owner(), "ops");
    assert_eq!(created.logbooks(), &[Logbook::new("Operations", "ops").unwrap()]);
    assert!(created.created_at().is_some());

    // Step 3: find it back by several criteria.
    let found = client.find(&FindQuery::new().search("*dump*")).unwrap();
    assert_eq!(found, vec![created.clone()]);
    let found = client
        .find(
            &FindQuery::new()
                .tag("Beam")
                .logbook("Operations")
                .property("Ticket")
                .start(Utc::now() - Duration::hours(1)),
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(client
        .find(&FindQuery::new().search("*vacuum*"))
        .unwrap()
        .is_empty());

    // Step 4: attachments come back as local files.
    let attachments = client.list_attachments(id).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename(), "trace.txt");
    assert_eq!(attachments[0].read().unwrap(), b"dump trace");
    assert!(attachments[0].path().unwrap().exists());

    // Step 5: deleting a tag strips it from the entry.
    client.delete(&DeleteTarget::tag("Beam").unwrap()).unwrap();
    assert!(client.list_tags().unwrap().is_empty());
    let found = client.find(&FindQuery::new().search("*dump*")).unwrap();
    assert!(found[0].tags().is_empty());

    // Step 6: delete the entry, then again.
    client.delete(&DeleteTarget::LogEntry(id)).unwrap();
    assert!(client.find(&FindQuery::new()).unwrap().is_empty());
    let err = client.delete(&DeleteTarget::LogEntry(id)).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn paging_splits_results() {
    let url = spawn(mock_olog::app());
    let client = OlogClient::builder(config(&url))
        .credentials("ops", "secret")
        .connect()
        .unwrap();

    for n in 0..5 {
        let entry = LogEntry::builder(&format!("shift note {n}"))
            .build(client.config())
            .unwrap();
        client.log(&entry).unwrap();
    }

    let first = client.find(&FindQuery::new().limit(2).page(1)).unwrap();
    let third = client.find(&FindQuery::new().limit(2).page(3)).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].text(), "shift note 4");
}

#[test]
fn large_attachment_round_trips() {
    let url = spawn(mock_olog::app());
    let client = OlogClient::builder(config(&url))
        .credentials("ops", "secret")
        .connect()
        .unwrap();

    // Larger than ureq's default 10 MiB response limit.
    let content: Vec<u8> = (0..12 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let entry = LogEntry::builder("Detector scan")
        .attachment(Attachment::from_bytes(content.clone(), "scan.h5").unwrap())
        .build(client.config())
        .unwrap();
    let id = client.log(&entry).unwrap().id().unwrap();

    let attachments = client.list_attachments(id).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename(), "scan.h5");
    assert!(attachments[0].read().unwrap() == content);
}

#[test]
fn writes_without_credentials_are_rejected() {
    let url = spawn(mock_olog::app_with_auth("ops", "secret"));

    // Reads are open, so connecting succeeds without a password.
    let client = OlogClient::connect(config(&url)).unwrap();
    assert!(!client.is_authenticated());

    let err = client.create_tag(&Tag::new("Beam").unwrap()).unwrap_err();
    assert_eq!(err.status(), Some(401));

    let client = OlogClient::builder(config(&url))
        .credentials("ops", "secret")
        .connect()
        .unwrap();
    client.create_tag(&Tag::new("Beam").unwrap()).unwrap();
}

#[test]
fn configured_password_is_used() {
    let url = spawn(mock_olog::app_with_auth("ops", "secret"));
    let client = OlogClient::connect(config(&url).with_password("secret")).unwrap();
    assert_eq!(client.credentials().unwrap().username(), "ops");
    client.create_tag(&Tag::new("Beam").unwrap()).unwrap();
}

#[test]
fn unreachable_server_fails_on_connect() {
    // Bind then drop to get a port with nothing listening.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let result = OlogClient::connect(config(&format!("http://127.0.0.1:{port}")));
    assert!(matches!(result, Err(OlogError::Connection(_))));
}
