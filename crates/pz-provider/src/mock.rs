// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use pz_events::{ProviderEvent, StopReason};

use crate::retry::TransportError;
use crate::transport::{ProviderStream, Transport};
use crate::types::{Req, Role};

/// Deterministic mock transport for agent-loop tests. Echoes the last user
/// message back as a single `text` event followed by `stop{done}`.
#[derive(Default)]
pub struct MockTransport;

#[async_trait]
impl Transport for MockTransport {
    async fn start(&self, req: Req) -> Result<ProviderStream, TransportError> {
        let reply = req
            .msgs
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();

        let events = vec![
            ProviderEvent::Text(format!("MOCK: {reply}")),
            ProviderEvent::Stop(StopReason::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted mock transport. Each call to `start` pops the next
/// response script from the front of the queue, letting tests specify exact
/// event sequences — including tool calls — without network access or an
/// external process.
pub struct ScriptedMockTransport {
    scripts: Arc<Mutex<Vec<Vec<ProviderEvent>>>>,
    pub last_request: Arc<Mutex<Option<Req>>>,
}

impl ScriptedMockTransport {
    pub fn new(scripts: Vec<Vec<ProviderEvent>>) -> Self {
        Self { scripts: Arc::new(Mutex::new(scripts)), last_request: Arc::new(Mutex::new(None)) }
    }
}

#[async_trait]
impl Transport for ScriptedMockTransport {
    async fn start(&self, req: Req) -> Result<ProviderStream, TransportError> {
        *self.last_request.lock().unwrap() = Some(req);
        let mut scripts = self.scripts.lock().unwrap();
        let events = if scripts.is_empty() {
            vec![ProviderEvent::Stop(StopReason::Done)]
        } else {
            scripts.remove(0)
        };
        Ok(Box::pin(stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Msg;
    use futures::StreamExt;

    fn req_with(msgs: Vec<Msg>) -> Req {
        Req { model: "m".into(), provider_label: "mock".into(), msgs, tools: vec![], opts: Default::default() }
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let mut stream = MockTransport.start(req_with(vec![Msg::user("hello")])).await.unwrap();
        let ev = stream.next().await.unwrap();
        assert!(matches!(ev, ProviderEvent::Text(t) if t == "MOCK: hello"));
    }

    #[tokio::test]
    async fn scripted_transport_pops_scripts_in_order() {
        let transport = ScriptedMockTransport::new(vec![
            vec![ProviderEvent::Text("first".into())],
            vec![ProviderEvent::Text("second".into())],
        ]);
        let mut s1 = transport.start(req_with(vec![])).await.unwrap();
        assert!(matches!(s1.next().await, Some(ProviderEvent::Text(t)) if t == "first"));
        let mut s2 = transport.start(req_with(vec![])).await.unwrap();
        assert!(matches!(s2.next().await, Some(ProviderEvent::Text(t)) if t == "second"));
    }

    #[tokio::test]
    async fn scripted_transport_records_last_request() {
        let transport = ScriptedMockTransport::new(vec![]);
        transport.start(req_with(vec![Msg::user("hi")])).await.unwrap();
        let last = transport.last_request.lock().unwrap();
        assert_eq!(last.as_ref().unwrap().msgs[0].as_text(), Some("hi"));
    }
}
