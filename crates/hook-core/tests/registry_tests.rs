use std::sync::Arc;

use hook_core::{FailReason, HandlerFailure, Hook, HookContext, HookError, HookPhase, HookRegistry, HookTarget,
                InMemoryReporter, ReporterHub, RunEventKind, RunLatch, RunStats, TestReport, TestStatus, Transaction};
use serde_json::json;

fn tx(name: &str) -> Transaction {
    Transaction::named(name)
}

#[tokio::test]
async fn native_hooks_run_in_registration_order_and_share_the_stash() {
    let mut registry = HookRegistry::new();
    registry.before("Machines > List",
                    Hook::native(|target, ctx| {
                        ctx.stash_mut().insert("first".into(), json!(1));
                        if let Some(t) = target.transaction_mut() {
                            t.request.headers.insert("X-Order".into(), "a".into());
                        }
                        Ok(())
                    }))
            .before("Machines > List",
                    Hook::native(|target, ctx| {
                        let seen = ctx.stash().contains_key("first");
                        ctx.log(format!("second saw first: {seen}"));
                        if let Some(t) = target.transaction_mut() {
                            t.request.headers.entry("X-Order".into()).or_default().push('b');
                        }
                        Ok(())
                    }));

    let mut t = tx("Machines > List");
    let mut ctx = HookContext::new();
    for hook in registry.hooks_for(HookPhase::Before, Some("Machines > List")) {
        let Hook::Native(callback) = hook else { panic!("native hook expected") };
        callback.call(&mut HookTarget::Transaction(&mut t), &mut ctx).await.unwrap();
    }

    assert_eq!(t.request.headers.get("X-Order").map(String::as_str), Some("ab"));
    assert_eq!(ctx.logs().len(), 1);
    assert_eq!(ctx.logs()[0].content, "second saw first: true");
    assert!(registry.hooks_for(HookPhase::Before, Some("Other")).is_empty());
}

#[tokio::test]
async fn failing_hook_reports_its_message() {
    let mut registry = HookRegistry::new();
    registry.before_each(Hook::native(|_, _| Err(HookError::Assertion("expected 200".into()))));

    let Hook::Native(callback) = &registry.hooks_for(HookPhase::BeforeEach, None)[0] else {
        panic!("native hook expected")
    };
    let mut t = tx("A");
    let err = callback.call(&mut HookTarget::Transaction(&mut t), &mut HookContext::new())
                      .await
                      .unwrap_err();
    assert!(matches!(err, HookError::Assertion(ref m) if m == "expected 200"));
}

#[test]
fn array_replies_update_every_transaction_or_none() {
    let mut list = vec![tx("A"), tx("B")];
    let mut target = HookTarget::Transactions(&mut list);
    target.apply(&json!([{ "fail": "nope" }, { "skip": true }])).unwrap();
    assert_eq!(list[0].fail, Some(FailReason::Message("nope".into())));
    assert!(list[1].skip);

    let mut target = HookTarget::Transactions(&mut list);
    assert!(target.apply(&json!({ "skip": true })).is_err());
    assert!(!list[0].skip);
}

#[test]
fn legacy_and_merged_registries_keep_order() {
    let mut loaded = HookRegistry::new();
    loaded.after(" > Machines", Hook::sandboxed("legacy"));
    let mut registry = HookRegistry::new();
    registry.after("Machines", Hook::sandboxed("canonical"));
    registry.merge(loaded);
    registry.normalize_legacy_names();

    let sources: Vec<&str> = registry.hooks_for(HookPhase::After, Some("Machines"))
                                     .iter()
                                     .filter_map(|h| match h {
                                         Hook::Sandboxed(src) => Some(src.as_str()),
                                         Hook::Native(_) => None,
                                     })
                                     .collect();
    assert_eq!(sources, vec!["legacy", "canonical"]);
    assert_eq!(registry.names(HookPhase::After), vec!["Machines"]);
}

#[test]
fn latch_failure_is_visible_from_every_clone() {
    let latch = RunLatch::new();
    let watcher = latch.clone();
    tokio_test::block_on(async move {
                            watcher.trip(HandlerFailure::new("Hooks handler process 'x' was killed."));
                        });
    assert_eq!(latch.failure().map(|f| f.message.as_str()), Some("Hooks handler process 'x' was killed."));
}

#[tokio::test]
async fn reporter_hub_numbers_events_in_emission_order() {
    let memory = Arc::new(InMemoryReporter::new());
    let mut hub = ReporterHub::new();
    hub.add(memory.clone());

    hub.emit(RunEventKind::Start).await;
    hub.emit(RunEventKind::TestStart(TestReport { title: "A".into(), ..TestReport::default() })).await;
    hub.emit(RunEventKind::TestSkip(TestReport { title: "A".into(), ..TestReport::default() })).await;
    hub.emit(RunEventKind::End { stats: RunStats::default() }).await;

    let events = memory.list().await;
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
    assert_eq!(memory.names().await, vec!["start", "test start", "test skip", "end"]);
    assert_eq!(memory.verdicts().await, vec![("A".to_string(), TestStatus::Skip)]);
}
