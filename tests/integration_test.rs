// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Cross-crate integration tests exercising the whole replay → prompt →
//! turn-loop → compaction lifecycle through [`pz_core::Agent::run`], plus
//! the session-selection and no-session invariants that only show up once
//! the store, core, and provider crates are wired together.

use std::sync::Arc;

use pz_core::{Agent, CancelSource, RecordingSink, RunConfig};
use pz_events::{Event, EventBody, ModeEvent, ProviderEvent, SelectorTarget, SessionSelector, StopReason, SystemClock};
use pz_provider::{MockTransport, RetryPolicy, ScriptedMockTransport};
use pz_store::SessionStore;
use pz_tools::ToolRegistry;

fn base_cfg<'a>(
    sid: &str,
    prompt: &str,
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn pz_provider::Transport>,
    sink: &'a mut dyn pz_core::ModeSink,
) -> RunConfig<'a> {
    RunConfig {
        sid: sid.to_string(),
        prompt: prompt.to_string(),
        model: "m".into(),
        provider_label: "mock".into(),
        provider,
        store,
        registry,
        sink,
        system_prompt: None,
        provider_opts: serde_json::Value::Null,
        max_turns: 0,
        cancel: CancelSource::new(),
        time: Arc::new(SystemClock),
        compactor: None,
        compact_every: 0,
        retry_policy: RetryPolicy::default(),
        ask_hook: None,
    }
}

/// Spec §8 E4: `--continue`/`--resume` (the `continue` selector) picks the
/// most recently modified session in the directory, not the first or the
/// largest.
#[tokio::test]
async fn e4_continue_picks_the_most_recently_modified_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());

    let mut sink_a = RecordingSink::default();
    Agent::run(base_cfg("older", "first", store.clone(), registry.clone(), Arc::new(MockTransport), &mut sink_a))
        .await
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(10));

    let mut sink_b = RecordingSink::default();
    Agent::run(base_cfg("newer", "second", store.clone(), registry.clone(), Arc::new(MockTransport), &mut sink_b))
        .await
        .unwrap();

    let resolved = pz_store::resolve(&SessionSelector::Continue, &store, &SystemClock).unwrap();
    assert_eq!(resolved, "newer");
}

/// Spec §8 E5: a run performed against a store rooted outside the
/// configured session directory (what `--no-session` does in `main.rs`)
/// must never write into that directory.
#[tokio::test]
async fn e5_no_session_leaves_the_configured_directory_empty() {
    let configured_dir = tempfile::tempdir().unwrap();
    let ephemeral_dir = tempfile::tempdir().unwrap();

    let store = Arc::new(SessionStore::open(ephemeral_dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());
    let sid = pz_store::resolve(&SessionSelector::Auto, &store, &SystemClock).unwrap();

    let mut sink = RecordingSink::default();
    Agent::run(base_cfg(&sid, "hello", store, registry, Arc::new(MockTransport), &mut sink)).await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(configured_dir.path()).unwrap().collect();
    assert!(entries.is_empty(), "no-session run must not touch the configured session directory");
}

/// Spec §5 "Ordering": replaying a session log must fold into the exact
/// same history a live run produced, since replay is the only way a
/// resumed run reconstructs prior turns.
#[tokio::test]
async fn replay_reconstructs_the_same_event_sequence_as_the_live_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());

    let mut sink = RecordingSink::default();
    Agent::run(base_cfg("s1", "hi", store.clone(), registry, Arc::new(MockTransport), &mut sink)).await.unwrap();

    let live_events: Vec<Event> = sink
        .events
        .into_iter()
        .filter_map(|e| match e {
            ModeEvent::Session(ev) => Some(ev),
            _ => None,
        })
        .collect();
    let replayed_events: Vec<Event> = store.replay("s1").unwrap().collect();

    assert_eq!(live_events, replayed_events);
}

/// Spec §5 "Ordering": for any `tool_call` at position i, the matching
/// `tool_result` must appear at i+1, both in the session log and the
/// sink's provider stream.
#[tokio::test]
async fn tool_call_is_always_immediately_followed_by_its_tool_result() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());
    let provider = ScriptedMockTransport::new(vec![
        vec![
            ProviderEvent::ToolCall { id: "c1".into(), name: "bash".into(), args: r#"{"cmd":"printf a"}"#.into() },
            ProviderEvent::Stop(StopReason::Tool),
        ],
        vec![ProviderEvent::Text("done".into()), ProviderEvent::Stop(StopReason::Done)],
    ]);

    let mut sink = RecordingSink::default();
    Agent::run(base_cfg("s2", "go", store.clone(), registry, Arc::new(provider), &mut sink)).await.unwrap();

    let events: Vec<Event> = store.replay("s2").unwrap().collect();
    let call_idx = events.iter().position(|e| matches!(e.data, EventBody::ToolCall { .. })).expect("a tool_call event");
    assert!(matches!(events[call_idx + 1].data, EventBody::Stop { reason: StopReason::Tool }));
    assert!(matches!(events[call_idx + 2].data, EventBody::ToolResult { .. }));
}

/// Spec §5 "Cancellation": once `stop{canceled}` is emitted the loop exits
/// immediately — nothing else may follow it in the session log.
#[tokio::test]
async fn nothing_follows_a_canceled_stop() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());
    let cancel = CancelSource::new();
    cancel.cancel();

    let mut sink = RecordingSink::default();
    let mut cfg = base_cfg("s3", "go", store.clone(), registry, Arc::new(MockTransport), &mut sink);
    cfg.cancel = cancel;
    Agent::run(cfg).await.unwrap();

    let events: Vec<Event> = store.replay("s3").unwrap().collect();
    let last = events.last().expect("at least the prompt and the cancel stop");
    assert!(matches!(last.data, EventBody::Stop { reason: StopReason::Canceled }));
}

/// Spec §4.4 compaction: once the retained tail already fits the budget, a
/// second compaction pass over the same log must be a no-op.
#[tokio::test]
async fn compacting_an_already_compact_session_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    store.append("s4", &Event::new(1, EventBody::Text { text: "small".into() })).unwrap();

    let first = store.compact("s4", 2, 1_000_000).unwrap();
    let second = store.compact("s4", 3, 1_000_000).unwrap();

    assert_eq!(first.out_lines, second.in_lines);
    assert_eq!(second.in_lines, second.out_lines, "nothing left to summarise on the second pass");
}

/// Spec §9 open question resolved in `resolve_id`: an unambiguous prefix of
/// exactly one existing session id resolves to that session, even when
/// several unrelated sessions also exist in the same directory.
#[tokio::test]
async fn explicit_prefix_resolves_against_a_populated_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let registry = Arc::new(ToolRegistry::with_builtins());

    for sid in ["aaa111", "bbb222", "ccc333"] {
        let mut sink = RecordingSink::default();
        Agent::run(base_cfg(sid, "hi", store.clone(), registry.clone(), Arc::new(MockTransport), &mut sink))
            .await
            .unwrap();
    }

    let resolved = pz_store::resolve(
        &SessionSelector::Explicit(SelectorTarget::Id("bbb".into())),
        &store,
        &SystemClock,
    )
    .unwrap();
    assert_eq!(resolved, "bbb222");
}
