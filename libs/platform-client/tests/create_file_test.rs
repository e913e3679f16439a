#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Raw binary uploads through the stub and through the hyper transport.

mod common;

use common::{Reply, StubTransport, client_with, file_json};
use http::Method;
use http::header::CONTENT_TYPE;
use httpmock::prelude::*;
use platform_client::{
    ApiErrorKind, Client, ClientProps, CreateFileProps, Environment, ErrorKind, Headers,
    TransportErrorKind,
};
use serde_json::json;

fn stub_with_upload() -> std::sync::Arc<StubTransport> {
    let stub = StubTransport::new();
    stub.reply(
        "/v1/files",
        Reply::json(200, &json!({ "file": file_json("file_1", "a.txt") })),
    );
    stub
}

#[tokio::test]
async fn uploads_raw_body_with_filename_header() {
    let stub = stub_with_upload();
    let client = client_with(&stub, &ClientProps::new().with_token("tok"));

    let created = client
        .create_file(CreateFileProps::new("a.txt", "hello"))
        .await
        .unwrap();

    assert_eq!(created.file.id, "file_1");

    let request = stub.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.uri.path(), "/v1/files");
    assert_eq!(&request.body[..], b"hello");
    assert_eq!(request.headers.get("x-filename").unwrap(), "a.txt");
    assert_eq!(request.headers.get("authorization").unwrap(), "Bearer tok");
    assert!(request.headers.get(CONTENT_TYPE).is_none());
    assert!(request.suppressed_defaults.contains(&CONTENT_TYPE));
}

#[tokio::test]
async fn explicit_content_type_is_sent_exactly() {
    let stub = stub_with_upload();
    let client = client_with(&stub, &ClientProps::new());

    client
        .create_file(CreateFileProps::new("a.txt", "hello").with_content_type("text/plain"))
        .await
        .unwrap();

    let request = stub.last_request();
    assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    assert!(!request.suppressed_defaults.contains(&CONTENT_TYPE));
}

#[tokio::test]
async fn configured_content_type_is_not_forced_on_uploads() {
    let stub = stub_with_upload();
    let props = ClientProps::new().with_headers(
        [("content-type", "application/x-www-form-urlencoded")]
            .into_iter()
            .collect::<Headers>(),
    );
    let client = client_with(&stub, &props);

    client
        .create_file(CreateFileProps::new("a.txt", "hello"))
        .await
        .unwrap();

    assert!(stub.last_request().headers.get(CONTENT_TYPE).is_none());
    assert_eq!(
        client.config().headers().get_str("content-type"),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn identity_overrides_apply_to_one_call_only() {
    let stub = stub_with_upload();
    let client = client_with(
        &stub,
        &ClientProps::new()
            .with_bot_id("config-bot")
            .with_integration_id("config-int"),
    );

    client
        .create_file(
            CreateFileProps::new("a.txt", "hello")
                .with_bot_id("call-bot")
                .with_user_id("user_1")
                .with_tags(["b", "a"])
                .with_access_policies(["public_content"]),
        )
        .await
        .unwrap();
    client
        .create_file(CreateFileProps::new("b.txt", "again"))
        .await
        .unwrap();

    let requests = stub.requests();
    let first = &requests[0].headers;
    assert_eq!(first.get("x-bot-id").unwrap(), "call-bot");
    assert_eq!(first.get("x-integration-id").unwrap(), "config-int");
    assert_eq!(first.get("x-user-id").unwrap(), "user_1");
    let tags: Vec<_> = first.get_all("x-tags").iter().collect();
    assert_eq!(tags, vec!["a", "b"]);
    assert_eq!(first.get("x-access-policies").unwrap(), "public_content");

    let second = &requests[1].headers;
    assert_eq!(second.get("x-bot-id").unwrap(), "config-bot");
    assert!(second.get("x-user-id").is_none());
    assert!(second.get("x-tags").is_none());
    assert_eq!(client.config().headers().get_str("x-bot-id"), Some("config-bot"));
}

#[tokio::test]
async fn rejected_upload_uses_normalized_error() {
    let stub = StubTransport::new();
    stub.reply(
        "/v1/files",
        Reply::json(
            413,
            &json!({ "id": "err_1", "code": 413, "type": "PayloadTooLarge", "message": "file too large" }),
        ),
    );
    let client = client_with(&stub, &ClientProps::new());

    let err = client
        .create_file(CreateFileProps::new("big.bin", vec![0_u8; 16]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api(&ApiErrorKind::PayloadTooLarge));
    assert_eq!(err.message(), "file too large");
}

#[tokio::test]
async fn upload_goes_over_hyper_transport() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/files")
            .header("x-filename", "a.txt")
            .header("x-bot-id", "bot_1")
            .header("authorization", "Bearer tok")
            .header("content-type", "text/plain")
            .body("hello");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "file": file_json("file_1", "a.txt") }));
    });

    let props = ClientProps::new()
        .with_api_url(server.base_url())
        .with_token("tok")
        .with_bot_id("bot_1");
    let client = Client::with_environment(&props, &Environment::isolated()).unwrap();

    let created = client
        .create_file(CreateFileProps::new("a.txt", "hello").with_content_type("text/plain"))
        .await
        .unwrap();

    mock.assert();
    assert_eq!(created.file.name, "a.txt");
}

#[tokio::test]
async fn upload_without_content_type_sends_none_over_hyper() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/files")
            .header("x-filename", "a.bin")
            .header_missing("content-type")
            .body("hello");
        then.status(200)
            .json_body(json!({ "file": file_json("file_1", "a.bin") }));
    });

    let props = ClientProps::new()
        .with_api_url(server.base_url())
        .with_headers(
            [("content-type", "application/x-www-form-urlencoded")]
                .into_iter()
                .collect(),
        );
    let client = Client::with_environment(&props, &Environment::isolated()).unwrap();

    client
        .create_file(CreateFileProps::new("a.bin", "hello"))
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn oversized_upload_fails_before_sending() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/files");
        then.status(200);
    });

    let props = ClientProps::new().with_api_url(server.base_url());
    let config = platform_client::resolve(&props, &Environment::isolated());
    let transport = platform_client::HyperTransport::new(&config)
        .unwrap()
        .with_max_body_bytes(4);
    let client = Client::with_transport(config, std::sync::Arc::new(transport));

    let err = client
        .create_file(CreateFileProps::new("a.txt", "hello"))
        .await
        .unwrap_err();

    assert_eq!(
        err.kind(),
        ErrorKind::Transport(TransportErrorKind::BodyTooLarge)
    );
    mock.assert_hits(0);
}
