// Scripted byte source for pipeline and coordinator tests.

use crate::error::RecoveryError;
use crate::source::ByteSource;
use async_trait::async_trait;
use bytes::Bytes;
use hls_manifest::ByteRange;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Ok(Bytes),
    Err(String),
}

/// Maps URLs to scripted responses. A URL with a queued sequence pops one
/// response per fetch; the last entry is sticky. Unknown URLs fail like a
/// 404 (non-retryable).
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(&self, url: &str, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .insert(url.to_string(), VecDeque::from([Scripted::Ok(body.into())]));
    }

    pub fn fail_always(&self, url: &str, reason: &str) {
        self.responses.lock().insert(
            url.to_string(),
            VecDeque::from([Scripted::Err(reason.to_string())]),
        );
    }

    /// First fetch fails with `reason`, subsequent fetches return `body`.
    pub fn fail_then_succeed(&self, url: &str, reason: &str, body: impl Into<Bytes>) {
        self.responses.lock().insert(
            url.to_string(),
            VecDeque::from([Scripted::Err(reason.to_string()), Scripted::Ok(body.into())]),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ByteSource for ScriptedSource {
    async fn fetch(
        &self,
        url: &Url,
        _byte_range: Option<&ByteRange>,
    ) -> Result<Bytes, RecoveryError> {
        self.calls.lock().push(url.to_string());
        let response = {
            let mut map = self.responses.lock();
            match map.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match response {
            Some(Scripted::Ok(bytes)) => Ok(bytes),
            Some(Scripted::Err(reason)) => Err(RecoveryError::SegmentFetch {
                reason,
                retryable: false,
            }),
            None => Err(RecoveryError::SegmentFetch {
                reason: format!("no scripted response for {url}"),
                retryable: false,
            }),
        }
    }
}
