//! Mock line transport for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ecudiag_core::wire::{reply, verb, DEFAULT_FIRMWARE_VERSION};
use parking_lot::{Mutex, RwLock};

use super::{LineTransport, TransportError};
use crate::config::MockConfig;

/// A scripted reply; `None` means the device stays silent
type ScriptedReply = Option<String>;

struct ResponseRule {
    request: String,
    /// Replies consumed in order; the last one repeats
    replies: VecDeque<ScriptedReply>,
}

impl ResponseRule {
    fn next_reply(&mut self) -> ScriptedReply {
        if self.replies.len() > 1 {
            self.replies.pop_front().flatten()
        } else {
            self.replies.front().cloned().flatten()
        }
    }
}

/// Mock transport that answers each written line from a response table
pub struct MockLineTransport {
    config: MockConfig,
    connected: AtomicBool,
    /// Predefined responses (request -> reply)
    responses: RwLock<Vec<ResponseRule>>,
    inbox: Mutex<VecDeque<String>>,
    sent: Mutex<Vec<String>>,
}

impl MockLineTransport {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            config: config.clone(),
            connected: AtomicBool::new(true),
            responses: RwLock::new(Self::default_responses()),
            inbox: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Add a mock reply for a given request; newer rules take precedence
    pub fn add_response(&self, request: impl Into<String>, response: impl Into<String>) {
        self.push_rule(request.into(), vec![Some(response.into())]);
    }

    /// Never answer `request`
    pub fn add_silent(&self, request: impl Into<String>) {
        self.push_rule(request.into(), vec![None]);
    }

    /// Answer successive `request`s with `replies` in order, repeating the last
    pub fn add_response_sequence(&self, request: impl Into<String>, replies: Vec<Option<&str>>) {
        let replies = replies
            .into_iter()
            .map(|reply| reply.map(str::to_string))
            .collect();
        self.push_rule(request.into(), replies);
    }

    /// Inject an unsolicited line (simulates the device talking on its own)
    pub fn inject_incoming(&self, line: impl Into<String>) {
        self.inbox.lock().push_back(line.into());
    }

    /// Set connection state
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Every line written so far
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Lines written so far that start with `prefix`
    pub fn sent_matching(&self, prefix: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    fn push_rule(&self, request: String, replies: Vec<ScriptedReply>) {
        let replies = if replies.is_empty() {
            VecDeque::from([None])
        } else {
            VecDeque::from(replies)
        };
        self.responses.write().push(ResponseRule { request, replies });
    }

    fn default_responses() -> Vec<ResponseRule> {
        let rule = |request: &str, response: &str| ResponseRule {
            request: request.to_string(),
            replies: VecDeque::from([Some(response.to_string())]),
        };

        vec![
            rule(verb::GET_DATA, "SPEED:72,RPM:2200,TEMP:87,FUEL:65"),
            rule("SET_MAX_RPM:", "MAX_RPM_SET:6000"),
            rule("SET_FAN_TEMP:", "FAN_TEMP_SET:95"),
            rule("SET_FUEL_WARNING:", "FUEL_WARNING_SET:15"),
            rule(verb::GET_DTC, reply::NO_DTC),
            rule(verb::CLEAR_DTC, reply::DTC_CLEARED),
            rule(
                verb::GET_CONFIG,
                r#"{"max_rpm":6000,"fan_trigger_temp":95,"fuel_warning_level":15}"#,
            ),
            rule("APPLY_PATCH:", reply::PATCH_APPLIED),
            rule(verb::GET_VER, DEFAULT_FIRMWARE_VERSION),
            rule(verb::START_FIRMWARE, reply::READY),
            rule("FIRMWARE:", reply::OK),
            rule(verb::END_FIRMWARE, reply::UPDATE_SUCCESS),
        ]
    }

    fn find_response(&self, request: &str) -> ScriptedReply {
        let mut responses = self.responses.write();

        // Newest exact match first
        if let Some(rule) = responses.iter_mut().rev().find(|r| r.request == request) {
            return rule.next_reply();
        }

        // Then prefix match for payload-carrying requests
        if let Some(rule) = responses
            .iter_mut()
            .rev()
            .find(|r| request.starts_with(&r.request))
        {
            return rule.next_reply();
        }

        Some(reply::UNKNOWN_VERB.to_string())
    }
}

impl Default for MockLineTransport {
    fn default() -> Self {
        Self::new(&MockConfig::default())
    }
}

#[async_trait]
impl LineTransport for MockLineTransport {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        self.sent.lock().push(line.to_string());
        tracing::debug!(line, "Mock transport: sent line");

        let response = self.find_response(line);
        if let Some(response) = response {
            self.inbox.lock().push_back(response);
        }
        Ok(())
    }

    async fn read_line(&self) -> Result<String, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        // Simulate latency
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let ready = self.inbox.lock().pop_front();
        if let Some(line) = ready {
            return Ok(line);
        }

        tokio::time::sleep(self.read_timeout()).await;
        self.inbox
            .lock()
            .pop_front()
            .ok_or(TransportError::ReadTimeout)
    }

    async fn discard_input(&self) -> Result<(), TransportError> {
        self.inbox.lock().clear();
        Ok(())
    }

    async fn input_pending(&self) -> Result<bool, TransportError> {
        Ok(!self.inbox.lock().is_empty())
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.read_timeout_ms)
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}
