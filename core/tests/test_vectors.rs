//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use olog_client::{
    ClientConfig, Credentials, DeleteTarget, FindQuery, HttpMethod, HttpResponse, LogEntry,
    Logbook, OlogApi, OlogError, Tag, Wire,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8080/Olog";

fn api(credentials: &Value) -> OlogApi {
    let credentials = credentials.as_array().map(|pair| {
        Credentials::new(
            pair[0].as_str().unwrap(),
            pair[1].as_str().unwrap(),
        )
    });
    OlogApi::new(BASE_URL, credentials)
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = strings(pair);
            (pair[0].clone(), pair[1].clone())
        })
        .collect()
}

fn simulated_response(response: &Value) -> HttpResponse {
    let body = match &response["body"] {
        Value::String(text) => text.clone().into_bytes(),
        other => serde_json::to_vec(other).unwrap(),
    };
    HttpResponse::new(response["status"].as_u64().unwrap() as u16, body)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn create_log_test_vectors() {
    let raw = include_str!("../../test-vectors/create_log.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let owner = input["owner"].as_str().unwrap();
        let api = api(&case["credentials"]);

        let mut builder = LogEntry::builder(input["text"].as_str().unwrap()).owner(owner);
        for logbook in strings(&input["logbooks"]) {
            builder = builder.logbook(Logbook::new(&logbook, owner).unwrap());
        }
        for tag in strings(&input["tags"]) {
            builder = builder.tag(Tag::new(&tag).unwrap());
        }
        let entry = builder.build(&ClientConfig::default()).unwrap();

        // Verify build
        let expected_req = &case["expected_request"];
        let req = api.build_create_log(&entry).unwrap();
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(
            req.url,
            format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()),
            "{name}: url"
        );
        assert_eq!(req.headers, pairs(&expected_req["headers"]), "{name}: headers");
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, expected_req["body"], "{name}: body");

        // Verify parse
        let result = api.parse_create_log(simulated_response(&case["response"]));
        if let Some(expected) = case.get("expected") {
            let created = result.unwrap();
            assert_eq!(created.id(), expected["id"].as_u64(), "{name}: id");
            assert_eq!(
                created.created_at().map(|t| t.timestamp_millis()),
                expected["created_ms"].as_i64(),
                "{name}: created"
            );
            assert_eq!(created, entry, "{name}: echoed entry");
        } else {
            let expected = &case["expected_error"];
            let err = result.unwrap_err();
            if let Some(status) = expected["status"].as_u64() {
                assert_eq!(err.status(), Some(status as u16), "{name}: status");
            } else {
                assert!(matches!(err, OlogError::Deserialization(_)), "{name}: {err}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

fn encode_all<T: Wire>(items: &[T]) -> Value {
    Value::Array(items.iter().map(Wire::encode).collect())
}

#[test]
fn listing_test_vectors() {
    let raw = include_str!("../../test-vectors/listings.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let api = api(&Value::Null);

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse::new(200, serde_json::to_vec(&case["response"]).unwrap());

        let decoded = match case["resource"].as_str().unwrap() {
            "tag" => encode_all(&api.parse_list_tags(response).unwrap()),
            "logbook" => encode_all(&api.parse_list_logbooks(response).unwrap()),
            "property" => encode_all(&api.parse_list_properties(response).unwrap()),
            other => panic!("unknown resource: {other}"),
        };
        assert_eq!(decoded, case["expected"], "{name}");
    }
}

// ---------------------------------------------------------------------------
// Find and delete
// ---------------------------------------------------------------------------

fn find_query(criteria: Vec<(String, String)>) -> FindQuery {
    criteria
        .into_iter()
        .fold(FindQuery::new(), |query, (key, value)| match key.as_str() {
            "search" => query.search(&value),
            "logbook" => query.logbook(&value),
            "tag" => query.tag(&value),
            "property" => query.property(&value),
            "page" => query.page(value.parse().unwrap()),
            "limit" => query.limit(value.parse().unwrap()),
            other => panic!("unknown criterion: {other}"),
        })
}

#[test]
fn find_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let api = api(&Value::Null);

    for case in vectors["find"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let req = api.build_find(&find_query(pairs(&case["query"])));
        assert_eq!(req.method, HttpMethod::Get, "{name}: method");
        assert_eq!(
            req.url,
            format!("{BASE_URL}{}", case["path"].as_str().unwrap()),
            "{name}: url"
        );
        assert!(req.body.is_none(), "{name}: body");
    }
}

#[test]
fn delete_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let api = api(&Value::Null);

    for case in vectors["delete"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let target = DeleteTarget::from_pairs(pairs(&case["pairs"]));

        match case["path"].as_str() {
            Some(path) => {
                let req = api.build_delete(&target.unwrap());
                assert_eq!(req.method, HttpMethod::Delete, "{name}: method");
                assert_eq!(req.url, format!("{BASE_URL}{path}"), "{name}: url");
                assert!(req.body.is_none(), "{name}: body");
            }
            None => {
                let err = target.unwrap_err();
                assert!(matches!(err, OlogError::Usage(_)), "{name}: {err}");
            }
        }
    }
}
