//! Scripted HTTP probe.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::port::{HttpProbe, ProbeError, ProbeResponse};

type Reply = Result<ProbeResponse, ProbeError>;

/// A successful reply with an empty body.
#[must_use]
pub fn status(code: u16) -> Reply {
    Ok(ProbeResponse {
        status: code,
        body: String::new(),
    })
}

/// A successful reply carrying a JSON body.
#[must_use]
pub fn json(code: u16, body: &str) -> Reply {
    Ok(ProbeResponse {
        status: code,
        body: body.to_string(),
    })
}

/// A connection-refused reply.
#[must_use]
pub fn refused() -> Reply {
    Err(ProbeError::Connect("connection refused".into()))
}

/// One recorded request.
#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub url: String,
    pub at: Instant,
}

/// Replays scripted replies per URL path.
///
/// Each path has a queue of replies; the last reply repeats once the queue
/// is drained. Paths without a script answer with a connection error.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    calls: Mutex<Vec<ProbeCall>>,
}

impl ScriptedProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the replies for requests whose URL ends with `path`.
    #[must_use]
    pub fn on(self, path: &str, replies: Vec<Reply>) -> Self {
        self.scripts.lock().insert(path.to_string(), replies);
        self
    }

    /// Every request, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().clone()
    }

    /// Requests whose URL ends with `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> Vec<ProbeCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.url.ends_with(path))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpProbe for ScriptedProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        self.calls.lock().push(ProbeCall {
            url: url.to_string(),
            at: Instant::now(),
        });

        let mut scripts = self.scripts.lock();
        // Longest matching path wins so "/" does not shadow "/health".
        let key = scripts
            .keys()
            .filter(|path| url.ends_with(path.as_str()))
            .max_by_key(|path| path.len())
            .cloned();
        let Some(key) = key else {
            return refused();
        };
        let Some(replies) = scripts.get_mut(&key) else {
            return refused();
        };
        match replies.len() {
            0 => refused(),
            1 => replies[0].clone(),
            _ => replies.remove(0),
        }
    }
}
