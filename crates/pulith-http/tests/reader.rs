mod support;

use std::time::Duration;

use bytes::Bytes;
use pulith_http::{
    Agent, Client, ClientConfig, Content, Error, JsonMode, ReadErrorKind, ReadOptions,
    RequestOptions, ShortcutOptions, read_stream, to_readable_stream,
};
use serde_json::json;
use support::{Reply, ScriptedTransport};

fn read_kind(err: Error) -> ReadErrorKind {
    match err {
        Error::Read(e) => e.kind(),
        other => panic!("expected a read error, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_body_fails_and_frees_its_slot() {
    let agent = Agent::new();
    let client = Client::new(ScriptedTransport::new(vec![Reply::ok("").chunks(vec![
        Bytes::from_static(b"0123456789"),
        Bytes::from_static(b"0123456789"),
    ])]));

    let response = client
        .request("GET", "http://example.test/", RequestOptions::default().agent(agent.clone()))
        .await
        .unwrap();
    let err = client
        .read(response, &ReadOptions::default().max_bytes(15))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(read_kind(err), ReadErrorKind::TooLarge);
    assert_eq!(agent.sockets(), 0);
}

#[tokio::test]
async fn configured_ceiling_applies_to_client_reads() {
    let config = ClientConfig {
        max_bytes: Some(4),
        ..ClientConfig::default()
    };
    let client = Client::with_config(ScriptedTransport::new(vec![Reply::ok("too long")]), config);

    let response = client
        .request("GET", "http://example.test/", RequestOptions::default())
        .await
        .unwrap();
    let err = client.read(response, &ReadOptions::default()).await.unwrap_err();
    assert_eq!(read_kind(err), ReadErrorKind::TooLarge);
}

#[tokio::test]
async fn slow_body_times_out_and_frees_its_slot() {
    let agent = Agent::with_max_sockets(1);
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::ok("slow").chunk_delay(Duration::from_millis(200)),
    ]));

    let response = client
        .request("GET", "http://example.test/", RequestOptions::default().agent(agent.clone()))
        .await
        .unwrap();
    let err = client
        .read(response, &ReadOptions::default().timeout(Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 408);
    assert_eq!(read_kind(err), ReadErrorKind::Timeout);
    assert_eq!(agent.sockets(), 0);
}

#[tokio::test]
async fn generous_timeout_returns_full_body() {
    let client = Client::new(ScriptedTransport::new(vec![Reply::ok("").chunks(vec![
        Bytes::from_static(b"abc"),
        Bytes::from_static(b"def"),
    ])
    .chunk_delay(Duration::from_millis(5))]));

    let response = client
        .request("GET", "http://example.test/", RequestOptions::default())
        .await
        .unwrap();
    let content = client
        .read(response, &ReadOptions::default().timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(content, Content::Raw(Bytes::from_static(b"abcdef")));
}

#[tokio::test]
async fn premature_close_is_a_transport_failure() {
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::ok("partial").reset_after_body(),
    ]));
    let response = client
        .request("GET", "http://example.test/", RequestOptions::default())
        .await
        .unwrap();
    let err = client.read(response, &ReadOptions::default()).await.unwrap_err();
    assert_eq!(err.status_code(), 502);
    assert_eq!(read_kind(err), ReadErrorKind::Transport);
}

#[tokio::test]
async fn get_shortcut_decodes_declared_json() {
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::ok(r#"{"foo":"bar"}"#).header("content-type", "application/json"),
    ]));

    let (head, content) = client
        .get(
            "http://example.test/",
            ShortcutOptions::default().json(JsonMode::ContentType),
        )
        .await
        .unwrap();
    assert_eq!(head.status.as_u16(), 200);
    assert_eq!(content, Content::Json(json!({ "foo": "bar" })));
}

#[tokio::test]
async fn shortcuts_use_their_verb() {
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::ok("1"),
        Reply::ok("2"),
        Reply::ok("3"),
        Reply::ok("4"),
        Reply::ok("5"),
    ]));
    let url = "http://example.test/item";

    client.get(url, RequestOptions::default()).await.unwrap();
    client.post(url, ShortcutOptions::default().payload("new")).await.unwrap();
    client.put(url, ShortcutOptions::default().payload("full")).await.unwrap();
    client.patch(url, ShortcutOptions::default().payload("part")).await.unwrap();
    let (_, content) = client.delete(url, ShortcutOptions::default()).await.unwrap();
    assert_eq!(content.as_bytes().unwrap(), &Bytes::from_static(b"5"));

    let methods: Vec<String> = client
        .transport()
        .seen()
        .iter()
        .map(|s| s.method.to_string())
        .collect();
    assert_eq!(methods, ["GET", "POST", "PUT", "PATCH", "DELETE"]);
}

#[tokio::test]
async fn shortcut_follows_redirects_and_reports_errors() {
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::redirect(302, "/target"),
        Reply::ok("{broken").header("content-type", "application/json"),
    ]));

    let err = client
        .get(
            "http://example.test/",
            ShortcutOptions::default()
                .redirects(1)
                .json(JsonMode::ContentType),
        )
        .await
        .unwrap_err();
    match err {
        Error::Read(e) => {
            assert_eq!(e.kind(), ReadErrorKind::Malformed);
            assert_eq!(e.raw().unwrap(), &Bytes::from_static(b"{broken"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn empty_json_body_reads_as_empty() {
    let client = Client::new(ScriptedTransport::new(vec![
        Reply::status(204).header("content-type", "application/json"),
    ]));
    let (_, content) = client
        .delete(
            "http://example.test/",
            ShortcutOptions::default().json(JsonMode::Force),
        )
        .await
        .unwrap();
    assert_eq!(content, Content::Empty);
}

#[tokio::test]
async fn readable_streams_read_with_the_same_rules() {
    let stream = to_readable_stream("68656c6c6f", Some("hex".parse().unwrap())).unwrap();
    let content = read_stream(stream, None, &ReadOptions::default()).await.unwrap();
    assert_eq!(content.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

    let empty = to_readable_stream("", None).unwrap();
    let content = read_stream(empty, None, &ReadOptions::default()).await.unwrap();
    assert!(content.is_empty());
}
