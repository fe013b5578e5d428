//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StoreResult;
use crate::transport::{HttpTransport, StoreRequest, StoreResponse};

/// Replays canned results in order and records every request it sees.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<StoreResult<StoreResponse>>>,
    calls: Mutex<Vec<(StoreRequest, Instant)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<StoreResult<StoreResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub(crate) fn call_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.url.clone())
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<StoreRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &StoreRequest) -> StoreResult<StoreResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                panic!("no scripted response for {} {}", request.method, request.url)
            })
    }
}
