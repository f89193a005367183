use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::{Host, ObjectStore, Service};

pub type SharedObjects = Arc<Mutex<ObjectStore>>;

pub async fn get_hosts(State(objects): State<SharedObjects>) -> Json<Vec<Host>> {
    let objects = objects.lock().await;
    Json(objects.hosts().cloned().collect())
}

pub async fn get_services(State(objects): State<SharedObjects>) -> Json<Vec<Service>> {
    let objects = objects.lock().await;
    Json(objects.services().cloned().collect())
}

pub fn create_router(objects: SharedObjects) -> Router {
    Router::new()
        .route("/api/hosts", get(get_hosts))
        .route("/api/services", get(get_services))
        .layer(TraceLayer::new_for_http())
        .with_state(objects)
}

pub async fn start_server(port: u16, objects: SharedObjects) -> Result<()> {
    let app = create_router(objects);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    info!("Status API: http://localhost:{}/api/hosts", addr.port());
    axum::serve(listener, app).await.context("Status API failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostState, ObjectId, ServiceState};

    #[tokio::test]
    async fn snapshots_list_every_object() {
        let mut store = ObjectStore::new();
        store.insert_host(Host::new(ObjectId::host("web01"), HostState::Up, 3));
        store.insert_host(Host::new(ObjectId::host("db01"), HostState::Down, 3));
        store.insert_service(Service::new(
            ObjectId::service("web01", "HTTP"),
            ServiceState::Ok,
            3,
        ));
        let objects: SharedObjects = Arc::new(Mutex::new(store));

        let Json(hosts) = get_hosts(State(objects.clone())).await;
        let names: Vec<&str> = hosts.iter().map(|h| h.id.host_name()).collect();
        assert_eq!(names, vec!["db01", "web01"]);

        let Json(services) = get_services(State(objects)).await;
        let json = serde_json::to_value(&services).unwrap();
        assert_eq!(json[0]["id"]["description"], "HTTP");
        assert_eq!(json[0]["current_state"], "Ok");
    }
}
