use std::time::{Duration, Instant};

use hook_sandbox::{SandboxError, SandboxEvaluator};
use serde_json::json;

#[test]
fn before_all_renames_first_transaction() {
    let evaluator = SandboxEvaluator::default();
    let data = json!([{ "name": "Test" }]);
    let out = evaluator.evaluate("function(transactions){ transactions[0].name = 'Changed'; }", &data, &json!({}))
                       .expect("hook should not fail");
    assert_eq!(out.data, json!([{ "name": "Changed" }]));
}

#[test]
fn stash_changes_are_returned() {
    let evaluator = SandboxEvaluator::default();
    let first = evaluator.evaluate("function(t){ stash.token = 'abc'; stash.count = 1; }", &json!({}), &json!({}))
                         .expect("first");
    let second = evaluator.evaluate("function(t){ t.token = stash.token; stash.count += 1; }", &json!({}), &first.stash)
                          .expect("second");
    assert_eq!(second.data["token"], "abc");
    assert_eq!(second.stash["count"], 2);
}

#[test]
fn log_calls_are_collected_in_order() {
    let evaluator = SandboxEvaluator::default();
    let out = evaluator.evaluate("function(t){ log('first'); log({ n: 2 }); }", &json!({}), &json!({}))
                       .expect("evaluate");
    let contents: Vec<&str> = out.logs.iter().map(|l| l.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "{\"n\":2}"]);
    assert!(out.logs.iter().all(|l| l.timestamp > 0));
}

#[test]
fn failed_assertion_is_an_assertion_error() {
    let evaluator = SandboxEvaluator::default();
    let err = evaluator.evaluate("function(t){ assert.equal(t.status, 200, 'status should be 200'); }",
                                 &json!({ "status": 500 }),
                                 &json!({}))
                       .expect_err("assertion must fail");
    assert!(err.is_assertion(), "got {err:?}");
    assert_eq!(err.message(), "status should be 200");
}

#[test]
fn other_errors_are_not_assertions() {
    let evaluator = SandboxEvaluator::default();
    let err = evaluator.evaluate("function(t){ t.missing.field = 1; }", &json!({}), &json!({}))
                       .expect_err("must fail");
    assert!(!err.is_assertion());
    assert!(matches!(err, SandboxError::Thrown { ref name, .. } if name == "TypeError"));
}

#[test]
fn runaway_hook_times_out() {
    let evaluator = SandboxEvaluator::new(Duration::from_millis(100));
    let started = Instant::now();
    let err = evaluator.evaluate("function(t){ while (true) {} }", &json!({}), &json!({}))
                       .expect_err("must time out");
    assert!(matches!(err, SandboxError::Timeout(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn no_host_bindings_are_visible() {
    let evaluator = SandboxEvaluator::default();
    let out = evaluator.evaluate("function(t){ t.require = typeof require; t.process = typeof process; t.hooks = typeof before; }",
                                 &json!({}),
                                 &json!({}))
                       .expect("evaluate");
    assert_eq!(out.data, json!({ "require": "undefined", "process": "undefined", "hooks": "undefined" }));
}

#[test]
fn collects_registered_hooks_as_source() {
    let file = r#"
        before('Machines > Machines collection > Get Machines', function (transaction) {
          transaction.skip = true;
        });
        beforeAll(function (transactions) { log('all'); });
        afterEach(function (transaction) {});
        log('loaded');
    "#;
    let hooks = SandboxEvaluator::default().collect_hooks(file).expect("collect");
    let sources = &hooks.before_hooks["Machines > Machines collection > Get Machines"];
    assert_eq!(sources.len(), 1);
    assert!(sources[0].contains("transaction.skip = true"));
    assert_eq!(hooks.before_all_hooks.len(), 1);
    assert_eq!(hooks.after_each_hooks.len(), 1);
    assert_eq!(hooks.logs.len(), 1);
    assert_eq!(hooks.logs[0].content, "loaded");
}

#[test]
fn collected_source_evaluates_in_isolation() {
    let evaluator = SandboxEvaluator::default();
    let hooks = evaluator.collect_hooks("before('T', function (t) { t.fail = 'nope'; });").expect("collect");
    let out = evaluator.evaluate(&hooks.before_hooks["T"][0], &json!({ "name": "T" }), &json!({}))
                       .expect("evaluate");
    assert_eq!(out.data["fail"], "nope");
}

#[test]
fn syntax_error_in_hook_file_is_reported() {
    let err = SandboxEvaluator::default().collect_hooks("before('T', function (t) {").expect_err("must fail");
    assert!(matches!(err, SandboxError::Thrown { ref name, .. } if name == "SyntaxError"), "got {err:?}");
}
