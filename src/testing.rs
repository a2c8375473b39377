//! In-memory HTTP fake shared by unit tests.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::http::{HttpClient, Method, RequestConfig};

struct Scripted {
  result: Result<Value, String>,
  delay: Duration,
}

/// Records every request and answers from a queue of scripted responses.
#[derive(Default)]
pub struct FakeHttpClient {
  requests: Mutex<Vec<RequestConfig>>,
  responses: Mutex<VecDeque<Scripted>>,
}

impl FakeHttpClient {
  pub fn respond(&self, value: Value) {
    self.script(Ok(value), Duration::ZERO);
  }

  pub fn respond_after(&self, value: Value, delay: Duration) {
    self.script(Ok(value), delay);
  }

  pub fn fail(&self, message: &str) {
    self.script(Err(message.to_string()), Duration::ZERO);
  }

  fn script(&self, result: Result<Value, String>, delay: Duration) {
    self
      .responses
      .lock()
      .unwrap()
      .push_back(Scripted { result, delay });
  }

  pub fn requests(&self) -> Vec<RequestConfig> {
    self.requests.lock().unwrap().clone()
  }

  pub fn count(&self, method: Method) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.method() == method)
      .count()
  }
}

impl HttpClient for FakeHttpClient {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>> {
    self.requests.lock().unwrap().push(config);
    let scripted = self.responses.lock().unwrap().pop_front();

    async move {
      let Some(scripted) = scripted else {
        return Err(eyre!("No scripted response"));
      };
      if !scripted.delay.is_zero() {
        tokio::time::sleep(scripted.delay).await;
      }
      scripted.result.map_err(|e| eyre!(e))
    }
    .boxed()
  }
}
