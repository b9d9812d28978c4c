use droneworld_shared::config::ConfigurationRecord;
use droneworld_shared::models::{Drone, DroneId, Environment, Monitors};
use droneworld_shared::submission::SubmissionPayload;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SIMULATION_PATH: &str = "/api/simulation";
pub const DRONES_PATH: &str = "/api/simulation/drones";
pub const ENVIRONMENT_PATH: &str = "/api/simulation/environment";
pub const MONITORS_PATH: &str = "/api/simulation/monitors";

/// Build the path addressing a single drone.
pub fn drone_path(id: DroneId) -> String {
    format!("{}/{}", DRONES_PATH, id)
}

/// Build the path of a saved task configuration.
pub fn task_path(config_id: &str) -> String {
    format!("/api/sade_task/{}", config_id)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{code} ({status}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Turn a non-2xx body into an [`ApiError`]. Bodies that are not an error
/// envelope get a generic message.
pub fn error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError::Status {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
            request_id: envelope.error.request_id,
        },
        Err(_) => ApiError::Status {
            status,
            code: "INTERNAL_SERVER_ERROR".to_string(),
            message: format!("Request failed with status {}", status),
            request_id: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskReceipt {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueStatus {
    pub current_task: Option<String>,
    pub queue_size: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// HTTP client for the simulation backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        BackendClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.http.get(self.url(path)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn send_ignoring_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        Self::check(req.send().await?).await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json("/api/health").await
    }

    /// The backend's copy of the configuration being edited.
    pub async fn fetch_simulation(&self) -> Result<ConfigurationRecord, ApiError> {
        self.get_json(SIMULATION_PATH).await
    }

    /// Overwrite the backend's copy with `record`.
    pub async fn replace_simulation(&self, record: &ConfigurationRecord) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::PUT, SIMULATION_PATH, Some(record))
            .await
    }

    /// A previously submitted configuration, by task id.
    pub async fn fetch_configuration(&self, config_id: &str) -> Result<SubmissionPayload, ApiError> {
        self.get_json(&task_path(config_id)).await
    }

    pub async fn create_drone(&self, drone: &Drone) -> Result<Drone, ApiError> {
        self.send_json(Method::POST, DRONES_PATH, drone).await
    }

    pub async fn update_drone(&self, drone: &Drone) -> Result<Drone, ApiError> {
        self.send_json(Method::PUT, &drone_path(drone.id), drone)
            .await
    }

    pub async fn delete_drone(&self, id: DroneId) -> Result<(), ApiError> {
        self.send_ignoring_body::<()>(Method::DELETE, &drone_path(id), None)
            .await
    }

    pub async fn put_environment(&self, environment: &Environment) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::PUT, ENVIRONMENT_PATH, Some(environment))
            .await
    }

    pub async fn put_monitors(&self, monitors: &Monitors) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::PUT, MONITORS_PATH, Some(monitors))
            .await
    }

    pub async fn add_task(&self, payload: &SubmissionPayload) -> Result<TaskReceipt, ApiError> {
        self.send_json(Method::POST, "/addTask", payload).await
    }

    pub async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        self.get_json("/currentRunning").await
    }
}
