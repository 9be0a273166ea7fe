//! Test doubles for the network and the clock

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use crate::error::TransportError;
use crate::fetcher::{HttpResponse, Transport};
use crate::pacing::Sleeper;

type Scripted = Result<HttpResponse, TransportError>;

/// Replays canned responses per URL, in order
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<HashMap<String, VecDeque<Scripted>>>,
    calls: RefCell<HashMap<String, u32>>,
}

impl ScriptedTransport {
    pub fn script(self, url: &str, responses: Vec<Scripted>) -> Self {
        self.responses
            .borrow_mut()
            .insert(url.to_string(), responses.into());
        self
    }

    pub fn status(status: u16) -> Scripted {
        Ok(HttpResponse {
            status,
            body: Vec::new(),
            content_type: None,
        })
    }

    pub fn page(html: &str) -> Scripted {
        Self::encoded_page(html.as_bytes(), "text/html; charset=utf-8")
    }

    pub fn encoded_page(body: &[u8], content_type: &str) -> Scripted {
        Ok(HttpResponse {
            status: 200,
            body: body.to_vec(),
            content_type: Some(content_type.to_string()),
        })
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        *self.calls.borrow_mut().entry(url.to_string()).or_default() += 1;
        self.responses
            .borrow_mut()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(TransportError(format!("nothing scripted for {url}"))))
    }
}

/// Records requested sleeps instead of blocking
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}
