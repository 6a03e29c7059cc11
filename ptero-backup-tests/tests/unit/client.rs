//! Paged API client against the scripted transport

use rstest::rstest;
use serde_json::Value;
use std::sync::Arc;
use test_utils::{
    backup, list_page, ApiError, Method, MockReply, MockTransport, PagedApiClient,
    RecordingSleeper, RetryPolicy, TransportError,
};

const URL: &str = "https://panel.test/api/client/servers/s1/backups";

fn client(transport: &MockTransport, max_attempts: u32) -> PagedApiClient {
    PagedApiClient::new(
        Arc::new(transport.clone()),
        Arc::new(RecordingSleeper::new()),
        RetryPolicy::new(max_attempts, 1.0),
    )
}

fn page(start: usize, count: usize, current: u32, total: u32) -> Value {
    let items = (start..start + count)
        .map(|i| backup(&format!("b{}", i), i as i64))
        .collect();
    list_page(items, current, total)
}

fn uuids(value: &Value) -> Vec<String> {
    value["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["attributes"]["uuid"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_three_pages_aggregate_in_order() {
    let transport = MockTransport::new()
        .on(Method::Get, URL, MockReply::ok(page(0, 10, 1, 3)))
        .on(Method::Get, &format!("{}?page=2", URL), MockReply::ok(page(10, 10, 2, 3)))
        .on(Method::Get, &format!("{}?page=3", URL), MockReply::ok(page(20, 4, 3, 3)));

    let value = client(&transport, 5).get_all(URL).unwrap();

    let expected: Vec<String> = (0..24).map(|i| format!("b{}", i)).collect();
    assert_eq!(uuids(&value), expected);
    assert_eq!(value["meta"]["pagination"]["current_page"], 3);
    assert_eq!(transport.get_calls().len(), 3);
}

#[test]
fn test_failed_page_discards_partial_results() {
    let transport = MockTransport::new()
        .on(Method::Get, URL, MockReply::ok(page(0, 10, 1, 2)))
        .on(
            Method::Get,
            &format!("{}?page=2", URL),
            MockReply::NetworkError("connection reset".into()),
        );

    let err = client(&transport, 2).get_all(URL).unwrap_err();

    assert!(matches!(err, ApiError::RetriesExhausted { .. }));
    assert_eq!(transport.get_calls().len(), 3);
}

#[test]
fn test_five_network_failures_exhaust_retries() {
    let transport = MockTransport::new().on(
        Method::Get,
        URL,
        MockReply::NetworkError("connection refused".into()),
    );

    let err = client(&transport, 5).get_all(URL).unwrap_err();

    assert_eq!(
        err,
        ApiError::RetriesExhausted {
            url: URL.to_string(),
            last_status: None,
        }
    );
    assert_eq!(transport.get_calls().len(), 5);
}

#[test]
fn test_single_page_without_pagination_meta() {
    let body = serde_json::json!({ "object": "list", "data": [backup("b0", 0)] });
    let transport = MockTransport::new().on(Method::Get, URL, MockReply::ok(body));

    let value = client(&transport, 1).get_all(URL).unwrap();

    assert_eq!(uuids(&value), vec!["b0".to_string()]);
    assert_eq!(transport.get_calls().len(), 1);
}

#[rstest]
#[case::internal_error(500, 3)]
#[case::bad_gateway(502, 3)]
#[case::unavailable(503, 3)]
#[case::bad_request(400, 1)]
#[case::unauthorized(401, 1)]
#[case::not_found(404, 1)]
#[case::throttled(429, 1)]
fn test_status_retry_classification(#[case] status: u16, #[case] expected_attempts: usize) {
    let transport =
        MockTransport::new().on(Method::Get, URL, MockReply::error(status, "request failed"));

    let err = client(&transport, 3).get_all(URL).unwrap_err();

    assert_eq!(transport.get_calls().len(), expected_attempts);
    if expected_attempts == 1 {
        assert_eq!(err, ApiError::HttpStatus(status, "request failed".to_string()));
    } else {
        assert_eq!(
            err,
            ApiError::RetriesExhausted {
                url: URL.to_string(),
                last_status: Some(status),
            }
        );
    }
}

#[test]
fn test_interrupted_transfer_recovers() {
    let transport = MockTransport::new()
        .on(
            Method::Get,
            URL,
            MockReply::Failure(TransportError::Interrupted(
                "error decoding response body: unexpected EOF".into(),
            )),
        )
        .on(Method::Get, URL, MockReply::ok(page(0, 3, 1, 1)));

    let value = client(&transport, 5).get_all(URL).unwrap();

    assert_eq!(uuids(&value), vec!["b0", "b1", "b2"]);
    assert_eq!(transport.get_calls().len(), 2);
}
