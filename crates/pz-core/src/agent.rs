// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use futures::StreamExt;
use pz_events::{Event, EventBody, ModeEvent, ProviderEvent, StopReason, TimeSource};
use pz_provider::{retry, Req, ReqOpts, RetryPolicy, Transport};
use pz_store::SessionStore;
use pz_tools::{is_err, AskHook, HandlerCtx, ToolCall, ToolRegistry};
use tracing::{debug, warn};

use crate::cancel::CancelSource;
use crate::compact::Compactor;
use crate::history;
use crate::sink::ModeSink;

/// Everything one call to [`Agent::run`] needs (spec §4.4 inputs).
pub struct RunConfig<'a> {
    pub sid: String,
    pub prompt: String,
    pub model: String,
    pub provider_label: String,
    pub provider: Arc<dyn Transport>,
    pub store: Arc<SessionStore>,
    pub registry: Arc<ToolRegistry>,
    pub sink: &'a mut dyn ModeSink,
    pub system_prompt: Option<String>,
    pub provider_opts: serde_json::Value,
    /// `0` means unlimited (spec §9 open question 3).
    pub max_turns: u32,
    pub cancel: CancelSource,
    pub time: Arc<dyn TimeSource>,
    pub compactor: Option<Arc<dyn Compactor>>,
    pub compact_every: u32,
    pub retry_policy: RetryPolicy,
    pub ask_hook: Option<Arc<dyn AskHook>>,
}

/// Runs the replay → prompt → turn-loop → compaction lifecycle for one
/// session (spec §4.4). Stateless: all mutable state lives in this
/// function's locals, matching "conversation history is owned by the loop
/// frame; no other component touches it" (spec §5).
pub struct Agent;

/// Per-append counter driving the compaction cadence (spec §9 open
/// question 2: counts every appended event — replay excluded, since replay
/// does not append — prompt, each provider event, each tool_result).
struct CompactionCounter {
    count: u32,
    every: u32,
}

impl CompactionCounter {
    fn tick(&mut self) -> bool {
        if self.every == 0 {
            return false;
        }
        self.count += 1;
        self.count % self.every == 0
    }
}

/// Append `event` to the store, push it to the sink as `ModeEvent::Session`,
/// and fold it into `history`. The three steps always happen together in
/// this loop, so this helper keeps the call sites free of repetition.
fn record_session_event(
    store: &SessionStore,
    sink: &mut dyn ModeSink,
    history: &mut Vec<pz_provider::Msg>,
    sid: &str,
    event: Event,
) -> anyhow::Result<()> {
    store
        .append(sid, &event)
        .map_err(|e| anyhow::anyhow!("{}", e.kind()))
        .map_err(|e| wrap_stage(store, sink, sid, "store_append", e))?;
    history::fold_event(history, &event);
    sink.push(ModeEvent::Session(event));
    Ok(())
}

/// Best-effort runtime error reporting (spec §4.4): append a session `err`
/// event tagged with the failing stage, push it to the sink, then return
/// the *original* error for the caller to propagate. If the reporting
/// itself fails, that failure is swallowed — the original error still
/// wins.
fn wrap_stage(store: &SessionStore, sink: &mut dyn ModeSink, sid: &str, stage: &str, err: anyhow::Error) -> anyhow::Error {
    let text = format!("runtime:{stage}:{err}");
    let event = Event::new(0, EventBody::Err { text: text.clone() });
    if store.append(sid, &event).is_ok() {
        sink.push(ModeEvent::Session(event));
    }
    warn!(stage, error = %err, "runtime error");
    err
}

fn provider_event_to_session_body(ev: &ProviderEvent) -> Option<EventBody> {
    match ev {
        ProviderEvent::Text(text) => Some(EventBody::Text { text: text.clone() }),
        ProviderEvent::Thinking(text) => Some(EventBody::Thinking { text: text.clone() }),
        ProviderEvent::ToolCall { id, name, args } => Some(EventBody::ToolCall {
            id: id.clone(),
            name: name.clone(),
            args: args.clone(),
        }),
        ProviderEvent::ToolResult { id, out, is_err } => Some(EventBody::ToolResult {
            id: id.clone(),
            out: out.clone(),
            is_err: *is_err,
        }),
        ProviderEvent::Usage(u) => Some(EventBody::Usage(*u)),
        ProviderEvent::Stop(reason) => Some(EventBody::Stop { reason: *reason }),
        ProviderEvent::Err(text) => Some(EventBody::Err { text: text.clone() }),
    }
}

impl Agent {
    pub async fn run(cfg: RunConfig<'_>) -> anyhow::Result<()> {
        anyhow::ensure!(!cfg.sid.is_empty(), "sid must not be empty");
        anyhow::ensure!(!cfg.prompt.is_empty(), "prompt must not be empty");
        anyhow::ensure!(!cfg.model.is_empty(), "model must not be empty");
        if cfg.compactor.is_some() {
            anyhow::ensure!(cfg.compact_every > 0, "compact_every must be > 0 when a compactor is configured");
        }

        let RunConfig {
            sid,
            prompt,
            model,
            provider_label,
            provider,
            store,
            registry,
            sink,
            system_prompt,
            provider_opts,
            max_turns,
            cancel,
            time,
            compactor,
            compact_every,
            retry_policy,
            ask_hook,
        } = cfg;

        let mut history: Vec<pz_provider::Msg> = Vec::new();
        if let Some(sp) = &system_prompt {
            history.push(pz_provider::Msg::system(sp.clone()));
        }

        let mut counter = CompactionCounter { count: 0, every: compact_every };

        // 1. Replay phase — tolerate a missing session (fresh history).
        match store.replay(&sid) {
            Ok(mut reader) => {
                for event in &mut reader {
                    history::fold_event(&mut history, &event);
                    sink.push(ModeEvent::Replay(event));
                }
                // Corrupted lines are skipped during replay, never written
                // back to the log — surface them to the live sink only
                // (spec §4.1).
                for warning in reader.take_warnings() {
                    sink.push(ModeEvent::Warning(warning));
                }
            }
            Err(e) if e.kind() == "not_found" => {}
            Err(e) => return Err(wrap_stage(&store, sink, &sid, "replay_open", anyhow::anyhow!("{}", e.kind()))),
        }

        // 2. Persist prompt.
        record_session_event(&store, sink, &mut history, &sid, Event::new(time.now_ms(), EventBody::Prompt { text: prompt }))?;
        maybe_compact(&compactor, &mut counter, &store, sink, &sid, &time)?;

        // 3. Tool schema cache — the registry is static across the run.
        let tool_specs: Vec<pz_provider::ToolSpec> = registry
            .specs()
            .into_iter()
            .map(|s| pz_provider::ToolSpec { name: s.name, desc: s.desc, schema: s.schema })
            .collect();

        let mut turns = 0u32;
        loop {
            if cancel.is_cancelled() {
                emit_stop(&store, sink, &mut history, &sid, &time, StopReason::Canceled)?;
                return Ok(());
            }

            let req = Req {
                model: model.clone(),
                provider_label: provider_label.clone(),
                msgs: history.clone(),
                tools: tool_specs.clone(),
                opts: ReqOpts(provider_opts.clone()),
            };

            let mut stream = {
                let provider = provider.clone();
                retry(retry_policy, move || {
                    let provider = provider.clone();
                    let req = req.clone();
                    async move { provider.start(req).await }
                })
                .await
                .map_err(|e| wrap_stage(&store, sink, &sid, "provider_start", anyhow::anyhow!("{e}")))?
            };

            // Events are recorded as the stream yields them; any tool calls
            // seen are queued and dispatched only after the stream ends, so
            // a provider's trailing `stop: tool` marker lands in the session
            // log before the tool_result it precipitates.
            let mut pending_calls: Vec<(String, String, String)> = Vec::new();
            loop {
                if cancel.is_cancelled() {
                    emit_stop(&store, sink, &mut history, &sid, &time, StopReason::Canceled)?;
                    return Ok(());
                }

                let Some(ev) = stream.next().await else { break };
                sink.push(ModeEvent::Provider(ev.clone()));

                if let Some(body) = provider_event_to_session_body(&ev) {
                    record_session_event(&store, sink, &mut history, &sid, Event::new(time.now_ms(), body))?;
                    maybe_compact(&compactor, &mut counter, &store, sink, &sid, &time)?;
                }

                if let ProviderEvent::ToolCall { id, name, args } = ev {
                    pending_calls.push((id, name, args));
                }
            }

            let saw_tool_call = !pending_calls.is_empty();
            for (id, name, args) in pending_calls {
                let call = ToolCall { call_id: id, name, args };
                let ctx = HandlerCtx { clock: time.as_ref(), ask_hook: ask_hook.as_deref() };
                let result = registry
                    .run(&call, &ctx, |e| sink.push(e))
                    .await
                    .map_err(|e| wrap_stage(&store, sink, &sid, "tool_run", e))?;

                let result_ev = ProviderEvent::ToolResult {
                    id: result.call_id.clone(),
                    out: result.text(),
                    is_err: is_err(&result.outcome),
                };
                sink.push(ModeEvent::Provider(result_ev.clone()));
                if let Some(body) = provider_event_to_session_body(&result_ev) {
                    record_session_event(&store, sink, &mut history, &sid, Event::new(time.now_ms(), body))?;
                    maybe_compact(&compactor, &mut counter, &store, sink, &sid, &time)?;
                }
            }

            if !saw_tool_call {
                debug!(sid, "turn terminal: no tool call this turn");
                return Ok(());
            }

            turns += 1;
            if max_turns != 0 && turns >= max_turns {
                emit_stop(&store, sink, &mut history, &sid, &time, StopReason::MaxOut)?;
                return Ok(());
            }
        }
    }
}

fn emit_stop(
    store: &SessionStore,
    sink: &mut dyn ModeSink,
    history: &mut Vec<pz_provider::Msg>,
    sid: &str,
    time: &Arc<dyn TimeSource>,
    reason: StopReason,
) -> anyhow::Result<()> {
    sink.push(ModeEvent::Provider(ProviderEvent::Stop(reason)));
    record_session_event(store, sink, history, sid, Event::new(time.now_ms(), EventBody::Stop { reason }))
}

fn maybe_compact(
    compactor: &Option<Arc<dyn Compactor>>,
    counter: &mut CompactionCounter,
    store: &SessionStore,
    sink: &mut dyn ModeSink,
    sid: &str,
    time: &Arc<dyn TimeSource>,
) -> anyhow::Result<()> {
    let Some(compactor) = compactor else { return Ok(()) };
    if !counter.tick() {
        return Ok(());
    }
    compactor
        .compact(sid, time.now_ms())
        .map(|_| ())
        .map_err(|e| wrap_stage(store, sink, sid, "compact", anyhow::anyhow!("{}", e.kind())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pz_events::SystemClock;
    use pz_provider::{MockTransport, ScriptedMockTransport};
    use pz_tools::ToolRegistry as Registry;

    fn harness(store_dir: &std::path::Path) -> (Arc<SessionStore>, Arc<Registry>) {
        (Arc::new(SessionStore::open(store_dir).unwrap()), Arc::new(Registry::with_builtins()))
    }

    #[tokio::test]
    async fn e1_print_mode_no_tools() {
        let dir = tempfile::tempdir().unwrap();
        let (store, registry) = harness(dir.path());
        let mut sink = crate::sink::RecordingSink::default();

        let cfg = RunConfig {
            sid: "s1".into(),
            prompt: "ping".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(MockTransport),
            store: store.clone(),
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel: CancelSource::new(),
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        Agent::run(cfg).await.unwrap();

        let events: Vec<Event> = store.replay("s1").unwrap().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].data, EventBody::Prompt { .. }));
        assert!(matches!(events[2].data, EventBody::Stop { reason: StopReason::Done }));
    }

    #[tokio::test]
    async fn replay_phase_surfaces_a_warning_for_a_corrupted_prior_line_but_never_logs_it() {
        let dir = tempfile::tempdir().unwrap();
        let (store, registry) = harness(dir.path());
        store.append("s1", &Event::new(0, EventBody::Prompt { text: "earlier".into() })).unwrap();
        {
            use std::io::Write;
            let path = dir.path().join("s1.jsonl");
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not json}}").unwrap();
        }
        let lines_before = std::fs::read_to_string(dir.path().join("s1.jsonl")).unwrap().lines().count();

        let mut sink = crate::sink::RecordingSink::default();
        let cfg = RunConfig {
            sid: "s1".into(),
            prompt: "ping".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(MockTransport),
            store: store.clone(),
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel: CancelSource::new(),
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        Agent::run(cfg).await.unwrap();

        assert!(sink.events.iter().any(|e| matches!(e, ModeEvent::Warning(_))), "the live sink must see a warning");

        let lines_after = std::fs::read_to_string(dir.path().join("s1.jsonl")).unwrap().lines().count();
        assert_eq!(lines_after, lines_before + 3, "the warning itself is never appended to the log");
    }

    #[tokio::test]
    async fn e2_tool_dispatch_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, registry) = harness(dir.path());
        let mut sink = crate::sink::RecordingSink::default();

        let provider = ScriptedMockTransport::new(vec![
            vec![ProviderEvent::ToolCall { id: "call-1".into(), name: "bash".into(), args: r#"{"cmd":"printf hi"}"#.into() }, ProviderEvent::Stop(StopReason::Tool)],
            vec![ProviderEvent::Text("done".into()), ProviderEvent::Stop(StopReason::Done)],
        ]);

        let cfg = RunConfig {
            sid: "s2".into(),
            prompt: "go".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(provider),
            store: store.clone(),
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel: CancelSource::new(),
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        Agent::run(cfg).await.unwrap();

        let events: Vec<Event> = store.replay("s2").unwrap().collect();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match &e.data {
                EventBody::Prompt { .. } => "prompt",
                EventBody::ToolCall { .. } => "tool_call",
                EventBody::Stop { reason: StopReason::Tool } => "stop_tool",
                EventBody::ToolResult { .. } => "tool_result",
                EventBody::Text { .. } => "text",
                EventBody::Stop { reason: StopReason::Done } => "stop_done",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["prompt", "tool_call", "stop_tool", "tool_result", "text", "stop_done"]);

        let tool_result = events.iter().find_map(|e| match &e.data {
            EventBody::ToolResult { out, is_err, .. } => Some((out.clone(), *is_err)),
            _ => None,
        });
        assert_eq!(tool_result, Some(("hi".to_string(), false)));
    }

    #[tokio::test]
    async fn e3_tool_mask_filters_yield_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = harness(dir.path());
        let mut registry = Registry::with_builtins();
        registry.set_mask(pz_events::ToolKind::Read.mask());
        let registry = Arc::new(registry);
        let mut sink = crate::sink::RecordingSink::default();

        let provider = ScriptedMockTransport::new(vec![
            vec![ProviderEvent::ToolCall { id: "call-1".into(), name: "bash".into(), args: "{}".into() }, ProviderEvent::Stop(StopReason::Tool)],
            vec![ProviderEvent::Stop(StopReason::Done)],
        ]);

        let cfg = RunConfig {
            sid: "s3".into(),
            prompt: "go".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(provider),
            store: store.clone(),
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel: CancelSource::new(),
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        Agent::run(cfg).await.unwrap();

        let events: Vec<Event> = store.replay("s3").unwrap().collect();
        let (out, is_err) = events
            .iter()
            .find_map(|e| match &e.data {
                EventBody::ToolResult { out, is_err, .. } => Some((out.clone(), *is_err)),
                _ => None,
            })
            .unwrap();
        assert!(is_err);
        assert!(out.starts_with("tool-not-found:bash"));
    }

    #[tokio::test]
    async fn max_turns_zero_means_unlimited_runs_to_natural_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let (store, registry) = harness(dir.path());
        let mut sink = crate::sink::RecordingSink::default();

        let cfg = RunConfig {
            sid: "s4".into(),
            prompt: "ping".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(MockTransport),
            store,
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel: CancelSource::new(),
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        assert!(Agent::run(cfg).await.is_ok());
    }

    #[tokio::test]
    async fn cancellation_before_a_turn_emits_stop_canceled_and_returns() {
        let dir = tempfile::tempdir().unwrap();
        let (store, registry) = harness(dir.path());
        let mut sink = crate::sink::RecordingSink::default();
        let cancel = CancelSource::new();
        cancel.cancel();

        let cfg = RunConfig {
            sid: "s5".into(),
            prompt: "ping".into(),
            model: "m".into(),
            provider_label: "mock".into(),
            provider: Arc::new(MockTransport),
            store: store.clone(),
            registry,
            sink: &mut sink,
            system_prompt: None,
            provider_opts: serde_json::Value::Null,
            max_turns: 0,
            cancel,
            time: Arc::new(SystemClock),
            compactor: None,
            compact_every: 0,
            retry_policy: RetryPolicy::default(),
            ask_hook: None,
        };
        Agent::run(cfg).await.unwrap();

        let events: Vec<Event> = store.replay("s5").unwrap().collect();
        assert!(matches!(events.last().unwrap().data, EventBody::Stop { reason: StopReason::Canceled }));
    }
}
