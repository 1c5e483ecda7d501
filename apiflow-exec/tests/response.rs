use std::time::Duration;

use apiflow_core::compress::CompressKind;
use apiflow_core::types::{Assertion, ExampleResponse};
use apiflow_core::{Id, VarMap};
use apiflow_exec::executor::{process_response, Dispatched, HttpResponse, ProcessError};

fn dispatched(status: u16, body: &[u8]) -> Dispatched {
    Dispatched {
        response: HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_vec(),
        },
        duration: Duration::from_millis(12),
    }
}

#[test]
fn assertion_sees_status_and_decoded_body() {
    let example_id = Id::new();
    let shell = ExampleResponse::shell(example_id);
    let check = Assertion::new(example_id, "response.status == 200 && response.body.ok == true");

    let out = process_response(
        &dispatched(200, br#"{"ok":true}"#),
        shell.clone(),
        &[],
        &[check.clone()],
        &VarMap::new(),
        1024,
    )
    .unwrap();

    assert_eq!(out.response.id, shell.id);
    assert_eq!(out.response.status, 200);
    assert_eq!(out.response.duration_ms, 12);
    assert_eq!(out.response.body_compress_kind, CompressKind::None);
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.results[0].assert_id, check.id);
    assert_eq!(out.results[0].response_id, shell.id);
    assert!(out.results[0].result);
    assert_eq!(out.header_ops.create.len(), 1);
}

#[test]
fn assertions_are_templated_and_misses_are_false() {
    let example_id = Id::new();
    let vars: VarMap = [("expected", "201")].into_iter().collect();
    let templated = Assertion::new(example_id, "response.status == {{expected}}");
    let miss = Assertion::new(example_id, "response.body.missing == 1");
    let mut off = Assertion::new(example_id, "response.status == 200");
    off.enabled = false;

    let out = process_response(
        &dispatched(200, br#"{"ok":true}"#),
        ExampleResponse::shell(example_id),
        &[],
        &[templated, miss, off],
        &vars,
        1024,
    )
    .unwrap();

    let results: Vec<bool> = out.results.iter().map(|r| r.result).collect();
    assert_eq!(results, vec![false, false]);
}

#[test]
fn malformed_assertion_fails_processing() {
    let example_id = Id::new();
    let bad = Assertion::new(example_id, "response.status ==");
    let err = process_response(
        &dispatched(200, b"{}"),
        ExampleResponse::shell(example_id),
        &[],
        &[bad],
        &VarMap::new(),
        1024,
    )
    .unwrap_err();
    assert!(matches!(err, ProcessError::Parse(_)));
}

#[test]
fn large_bodies_are_stored_compressed() {
    let example_id = Id::new();
    let body = format!(r#"{{"data":"{}"}}"#, "a".repeat(5000));
    let out = process_response(
        &dispatched(200, body.as_bytes()),
        ExampleResponse::shell(example_id),
        &[],
        &[],
        &VarMap::new(),
        1024,
    )
    .unwrap();

    assert_eq!(out.response.body_compress_kind, CompressKind::Zstd);
    assert!(out.response.body.len() < body.len());
    assert_eq!(out.response.decoded_body().unwrap(), body.as_bytes());
    assert_eq!(out.root["response"]["body"]["data"].as_str().unwrap().len(), 5000);
}
