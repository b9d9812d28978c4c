use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use droneworld_shared::config::ConfigurationRecord;
use droneworld_shared::models::{Drone, DroneId, Environment, Monitors};
use droneworld_shared::submission::SubmissionPayload;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::storage::Storage;

type AppState = State<Arc<Storage>>;

/// Build the full application router.
pub fn build_app(storage: Arc<Storage>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/simulation", get(get_simulation).put(replace_simulation))
        .route("/api/simulation/drones", post(create_drone))
        .route(
            "/api/simulation/drones/{id}",
            put(update_drone).delete(delete_drone),
        )
        .route("/api/simulation/environment", put(put_environment))
        .route("/api/simulation/monitors", put(put_monitors))
        .route("/api/sade_task/{id}", get(get_task))
        .route("/addTask", post(add_task))
        .route("/currentRunning", get(current_running))
        .with_state(storage)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_simulation(State(storage): AppState) -> Result<Json<ConfigurationRecord>, ApiError> {
    Ok(Json(storage.load_state()?))
}

/// Overwrite the whole stored configuration.
async fn replace_simulation(
    State(storage): AppState,
    body: Result<Json<ConfigurationRecord>, JsonRejection>,
) -> Result<Json<ConfigurationRecord>, ApiError> {
    let Json(record) = body?;
    let stored = record.clone();
    storage.update_state(move |state| *state = stored)?;
    tracing::debug!(drones = record.drones.len(), "simulation replaced");
    Ok(Json(record))
}

fn parse_drone_id(raw: &str) -> Result<DroneId, ApiError> {
    raw.parse::<u32>()
        .map(DroneId)
        .map_err(|_| ApiError::Validation(format!("Invalid drone id: {}", raw)))
}

fn parse_drone(body: Value) -> Result<Drone, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Validation(format!("Invalid drone: {}", e)))
}

/// Add a drone. Re-sending a known id replaces the stored copy.
async fn create_drone(
    State(storage): AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Drone>), ApiError> {
    let Json(body) = body?;
    if body.get("id").is_none() {
        return Err(ApiError::Validation("Drone must have an id".into()));
    }
    let drone = parse_drone(body)?;

    let stored = drone.clone();
    storage.update_state(move |state| {
        match state.drones.iter_mut().find(|d| d.id == stored.id) {
            Some(existing) => *existing = stored,
            None => state.drones.push(stored),
        }
    })?;
    tracing::debug!(id = %drone.id, "drone created");
    Ok((StatusCode::CREATED, Json(drone)))
}

async fn update_drone(
    State(storage): AppState,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Drone>, ApiError> {
    let id = parse_drone_id(&id)?;
    let Json(body) = body?;
    let mut drone = parse_drone(body)?;
    drone.id = id;

    let stored = drone.clone();
    let found = storage.update_state(move |state| {
        match state.drones.iter_mut().find(|d| d.id == id) {
            Some(existing) => {
                *existing = stored;
                true
            }
            None => false,
        }
    })?;
    if !found {
        return Err(ApiError::NotFound(format!("Drone {} not found", id)));
    }
    Ok(Json(drone))
}

async fn delete_drone(
    State(storage): AppState,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_drone_id(&id)?;
    let removed = storage.update_state(|state| {
        let before = state.drones.len();
        state.drones.retain(|d| d.id != id);
        state.drones.len() != before
    })?;
    if !removed {
        return Err(ApiError::NotFound(format!("Drone {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn put_environment(
    State(storage): AppState,
    body: Result<Json<Environment>, JsonRejection>,
) -> Result<Json<Environment>, ApiError> {
    let Json(environment) = body?;
    let stored = environment.clone();
    storage.update_state(move |state| state.environment = stored)?;
    Ok(Json(environment))
}

async fn put_monitors(
    State(storage): AppState,
    body: Result<Json<Monitors>, JsonRejection>,
) -> Result<Json<Monitors>, ApiError> {
    let Json(monitors) = body?;
    let stored = monitors.clone();
    storage.update_state(move |state| state.monitors = stored)?;
    Ok(Json(monitors))
}

async fn add_task(
    State(storage): AppState,
    body: Result<Json<SubmissionPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = body?;
    let task = storage.add_task(payload)?;
    tracing::info!(task_id = %task.task_id, "task queued");
    Ok(Json(json!({ "task_id": task.task_id })))
}

/// The saved submission for a task, used to reopen a configuration.
async fn get_task(
    State(storage): AppState,
    Path(id): Path<String>,
) -> Result<Json<SubmissionPayload>, ApiError> {
    storage
        .get_task(&id)?
        .map(|task| Json(task.payload))
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))
}

async fn current_running(State(storage): AppState) -> Result<Json<Value>, ApiError> {
    let queued = storage.count_tasks()?;
    Ok(Json(json!({ "current_task": null, "queue_size": queued })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use droneworld_shared::models::{MonitorKind, MonitorSettings, Origin, OriginKind};
    use droneworld_shared::{to_submission_payload, SimulationConfiguration};
    use tower::ServiceExt;

    fn test_app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.redb")).unwrap();
        (build_app(storage), dir)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app();
        let (status, _, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_create_drone_requires_id() {
        let (app, _dir) = test_app();
        let (status, headers, body) = send(
            &app,
            Method::POST,
            "/api/simulation/drones",
            Some(json!({ "Name": "Alpha" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let request_id = body["error"]["request_id"].as_str().unwrap();
        assert_eq!(headers.get("x-request-id").unwrap(), request_id);
        assert!(body["error"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_drone_crud() {
        let (app, _dir) = test_app();
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/simulation/drones",
            Some(json!({ "id": 0, "Name": "Alpha", "X": 41.98, "Y": -87.93, "Z": 12.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["Name"], "Alpha");
        assert_eq!(body["VehicleType"], "SimpleFlight");

        let (status, _, body) = send(
            &app,
            Method::PUT,
            "/api/simulation/drones/0",
            Some(json!({ "id": 0, "Name": "Alpha", "X": 1.0, "Y": 2.0, "Z": 3.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["X"], 1.0);

        let (_, _, state) = send(&app, Method::GET, "/api/simulation", None).await;
        assert_eq!(state["drones"].as_array().unwrap().len(), 1);
        assert_eq!(state["drones"][0]["Z"], 3.0);

        let (status, _, _) = send(&app, Method::DELETE, "/api/simulation/drones/0", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, _, state) = send(&app, Method::GET, "/api/simulation", None).await;
        assert!(state["drones"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_simulation_drops_stale_drones() {
        let (app, _dir) = test_app();
        for (id, name) in [(0, "X"), (1, "Y")] {
            send(
                &app,
                Method::POST,
                "/api/simulation/drones",
                Some(json!({ "id": id, "Name": name })),
            )
            .await;
        }

        let (status, _, body) = send(
            &app,
            Method::PUT,
            "/api/simulation",
            Some(json!({ "drones": [{ "id": 0, "Name": "Z" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["drones"][0]["Name"], "Z");

        let (_, _, state) = send(&app, Method::GET, "/api/simulation", None).await;
        let names: Vec<&str> = state["drones"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["Name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Z"]);
    }

    #[tokio::test]
    async fn test_unknown_drone_is_404() {
        let (app, _dir) = test_app();
        let (status, _, body) = send(
            &app,
            Method::PUT,
            "/api/simulation/drones/9",
            Some(json!({ "id": 9, "Name": "Ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");

        let (status, _, _) = send(&app, Method::DELETE, "/api/simulation/drones/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_drone_id_is_validation_error() {
        let (app, _dir) = test_app();
        let (status, _, body) =
            send(&app, Method::DELETE, "/api/simulation/drones/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let (app, _dir) = test_app();
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/simulation/environment")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_environment_and_monitors_replace_independently() {
        let (app, _dir) = test_app();
        let environment = Environment {
            origin: Origin::from_kind(OriginKind::ChicagoOhareAirport),
            ..Environment::default()
        };
        let (status, _, _) = send(
            &app,
            Method::PUT,
            "/api/simulation/environment",
            Some(serde_json::to_value(&environment).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mut monitors = Monitors::all_disabled();
        monitors.set(
            MonitorKind::BatteryMonitor,
            MonitorSettings::enabled(vec![json!(20)]),
        );
        let (status, _, _) = send(
            &app,
            Method::PUT,
            "/api/simulation/monitors",
            Some(serde_json::to_value(&monitors).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, state) = send(&app, Method::GET, "/api/simulation", None).await;
        assert_eq!(state["environment"]["Origin"]["latitude"], 41.980381);
        assert_eq!(state["monitors"]["battery_monitor"]["enable"], true);
    }

    #[tokio::test]
    async fn test_add_task_and_fetch_saved_configuration() {
        let (app, _dir) = test_app();
        let mut config = SimulationConfiguration::new();
        config.set_origin(Origin::from_kind(OriginKind::ChicagoOhareAirport));
        config.add_drone(Drone::named("Drone 1"));
        let payload = to_submission_payload(&config);

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/addTask",
            Some(serde_json::to_value(&payload).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let task_id = body["task_id"].as_str().unwrap().to_string();
        assert!(task_id.ends_with("_Batch_1"));

        let (status, _, saved) =
            send(&app, Method::GET, &format!("/api/sade_task/{}", task_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["Drones"][0]["Name"], "Drone 1");

        let (_, _, running) = send(&app, Method::GET, "/currentRunning", None).await;
        assert_eq!(running["queue_size"], 1);
        assert!(running["current_task"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_task_is_404() {
        let (app, _dir) = test_app();
        let (status, _, body) = send(&app, Method::GET, "/api/sade_task/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
    }
}
