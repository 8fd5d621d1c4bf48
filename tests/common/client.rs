//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per agent endpoint. When routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn print(&self, body: Value) -> Response {
        self.client
            .post(self.url("/print"))
            .json(&body)
            .send()
            .await
            .expect("POST /print failed")
    }

    /// Submits a base64 job and returns its id.
    pub async fn print_base64(&self, printer: &str) -> String {
        let response = self
            .print(json!({
                "base64": PDF_BASE64,
                "printer": printer,
                "hospitalNo": "HN-0001",
                "userName": "nurse.joy",
            }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Invalid /print response");
        body["jobId"]
            .as_str()
            .expect("Missing jobId")
            .to_string()
    }

    pub async fn printers(&self) -> Response {
        self.client
            .get(self.url("/printers"))
            .send()
            .await
            .expect("GET /printers failed")
    }

    pub async fn status(&self) -> Response {
        self.client
            .get(self.url("/status"))
            .send()
            .await
            .expect("GET /status failed")
    }

    pub async fn queue(&self) -> Vec<Value> {
        self.client
            .get(self.url("/queue"))
            .send()
            .await
            .expect("GET /queue failed")
            .json()
            .await
            .expect("Invalid /queue response")
    }

    pub async fn job(&self, id: &str) -> Option<Value> {
        self.queue().await.into_iter().find(|job| job["id"] == id)
    }

    pub async fn clear_queue(&self) -> Response {
        self.client
            .post(self.url("/queue/clear"))
            .send()
            .await
            .expect("POST /queue/clear failed")
    }

    pub async fn retry(&self, id: &str) -> Response {
        self.client
            .post(self.url("/queue/retry"))
            .query(&[("id", id)])
            .send()
            .await
            .expect("POST /queue/retry failed")
    }

    pub async fn view(&self, id: &str) -> Response {
        self.client
            .post(self.url("/queue/view"))
            .query(&[("id", id)])
            .send()
            .await
            .expect("POST /queue/view failed")
    }

    pub async fn delete(&self, id: Option<&str>) -> Response {
        let mut request = self.client.delete(self.url("/queue/delete"));
        if let Some(id) = id {
            request = request.query(&[("id", id)]);
        }
        request.send().await.expect("DELETE /queue/delete failed")
    }

    pub async fn metrics(&self) -> String {
        self.client
            .get(self.url("/metrics"))
            .send()
            .await
            .expect("GET /metrics failed")
            .text()
            .await
            .expect("Invalid /metrics response")
    }

    /// Polls `/queue` until the job satisfies `pred` (`None` means absent).
    pub async fn wait_for_job<F>(&self, id: &str, pred: F) -> Option<Value>
    where
        F: Fn(Option<&Value>) -> bool,
    {
        let start = std::time::Instant::now();
        loop {
            let job = self.job(id).await;
            if pred(job.as_ref()) {
                return job;
            }
            if start.elapsed() > Duration::from_millis(JOB_SETTLE_TIMEOUT_MS) {
                panic!("Job {} never reached the expected state, last: {:?}", id, job);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        self.wait_for_job(id, |job| job.is_some_and(|j| j["status"] == status))
            .await
            .expect("Job disappeared")
    }

    pub async fn wait_until_gone(&self, id: &str) {
        self.wait_for_job(id, |job| job.is_none()).await;
    }
}
