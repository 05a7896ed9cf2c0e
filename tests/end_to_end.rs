use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookflow_rust::hook_core::{ExchangeError, Header, RawRequest, RawResponse, RealResponse, ValidationError};
use hookflow_rust::prelude::*;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

struct EchoServer;

#[async_trait]
impl HttpClient for EchoServer {
    async fn perform(&self, transaction: &Transaction) -> Result<RealResponse, ExchangeError> {
        let mut real = RealResponse::new(200);
        real.body = transaction.url();
        Ok(real)
    }
}

struct StatusOnly;

impl Validator for StatusOnly {
    fn validate(&self,
                expected: &hookflow_rust::hook_core::ExpectedResponse,
                real: &RealResponse)
                -> Result<ValidationResult, ValidationError> {
        Ok(ValidationResult { valid: expected.status_code == real.status_code.to_string(),
                              ..ValidationResult::default() })
    }
}

fn raw(name: &str, uri: &str) -> RawTransaction {
    RawTransaction { name: format!("Machines API > {name}"),
                     request: RawRequest { method: "GET".into(),
                                           uri: uri.into(),
                                           headers: vec![Header { name: "Accept".into(),
                                                                  value: "application/json".into() }],
                                           body: String::new() },
                     response: RawResponse { status: "200".into(), ..RawResponse::default() },
                     origin: json!({ "apiName": "Machines API" }),
                     media_type: None }
}

#[tokio::test]
async fn raw_transactions_run_through_sandboxed_hooks() {
    let mut config = RunConfig { endpoint: "localhost:3000/api".into(),
                                 sandbox: true,
                                 ..RunConfig::default() };
    config.hooks_data.insert("hooks".into(),
                             r#"
before('Machines > Delete', function(t){ t.skip = true; });
beforeEach(function(t){ stash.last = t.fullPath; });
"#.into());
    let reporter = Arc::new(InMemoryReporter::new());
    let mut runner = TransactionRunner::new(config, Arc::new(EchoServer), Arc::new(StatusOnly));
    runner.add_reporter(reporter.clone());

    let stats = runner.run(&[raw("Machines > List", "/machines"), raw("Machines > Delete", "/machines/1")])
                      .await
                      .unwrap();

    assert_eq!((stats.passes, stats.skipped), (1, 1));
    assert!(stats.is_success());
    assert_eq!(reporter.verdicts().await,
               vec![("GET (200) /machines".to_string(), TestStatus::Pass),
                    ("GET (200) /machines/1".to_string(), TestStatus::Skip)]);
    assert_eq!(runner.context().stash()["last"], json!("/api/machines/1"));
    let events = reporter.list().await;
    let Some(RunEventKind::TestPass(test)) = events.iter().map(|e| &e.kind).find(|k| k.name() == "test pass") else {
        panic!("missing test pass")
    };
    assert_eq!(test.actual.as_ref().map(|a| a.body.as_str()), Some("http://localhost:3000/api/machines"));
}

/// Handler falso: agrega el evento a `hooks_modifications` y salta la
/// transacción llamada "Skip me".
async fn fake_handler(listener: TcpListener) {
    let Ok((socket, _)) = listener.accept().await else { return };
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let message: Value = serde_json::from_str(&line).unwrap();
        let event = message["event"].as_str().unwrap_or_default().to_string();
        let mut data = message["data"].clone();
        if let Some(object) = data.as_object_mut() {
            let mods = object.entry("hooks_modifications").or_insert_with(|| json!([]));
            mods.as_array_mut().unwrap().push(json!(format!("{event} modification")));
            if event == "beforeEach" && object.get("name") == Some(&json!("Skip me")) {
                object.insert("skip".into(), json!(true));
            }
        }
        let mut reply = serde_json::to_vec(&json!({ "uuid": message["uuid"], "event": event, "data": data })).unwrap();
        reply.push(b'\n');
        if write_half.write_all(&reply).await.is_err() {
            break;
        }
    }
}

#[cfg(unix)]
#[tokio::test]
async fn worker_hooks_round_trip_through_an_external_handler() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hooks.rb"), "# handled by the fake handler\n").unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(fake_handler(listener));

    let worker = WorkerConfig { connect_timeout: Duration::from_secs(2),
                                connect_retry: Duration::from_millis(50),
                                after_connect_wait: Duration::from_millis(10),
                                term_timeout: Duration::from_millis(1000),
                                term_retry: Duration::from_millis(100),
                                handler_port: port,
                                ..WorkerConfig::default() };
    let config = RunConfig { language: "sh -c 'sleep 30'".into(),
                             hookfiles: vec!["*.rb".into()],
                             custom_cwd: Some(dir.path().to_path_buf()),
                             test_handler_order: true,
                             worker,
                             ..RunConfig::default() };
    let reporter = Arc::new(InMemoryReporter::new());
    let mut runner = TransactionRunner::new(config, Arc::new(EchoServer), Arc::new(StatusOnly));
    runner.add_reporter(reporter.clone());

    let mut first = Transaction::named("List");
    first.id = "GET (200) /machines".into();
    first.expected.status_code = "200".into();
    let mut second = Transaction::named("Skip me");
    second.id = "DELETE (204) /machines/1".into();
    second.expected.status_code = "204".into();
    let mut transactions = vec![first, second];

    let stats = runner.execute(&mut transactions).await.unwrap();

    assert_eq!((stats.passes, stats.skipped), (1, 1));
    assert_eq!(transactions[0].extra["hooks_modifications"],
               json!(["beforeEach modification", "beforeEachValidation modification", "afterEach modification"]));
    assert_eq!(transactions[1].extra["hooks_modifications"],
               json!(["beforeEach modification", "afterEach modification"]));
    assert!(!runner.latch().is_tripped());
    assert!(!reporter.names().await.contains(&"test error"));
}
