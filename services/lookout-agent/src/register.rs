//! Registration handshake with the master server.

use lookout_core::{endpoints, AgentInfo, LookoutError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// What the master hands back to a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub nats_url: String,
}

fn registration_error(reason: impl Into<String>) -> LookoutError {
    LookoutError::Registration {
        reason: reason.into(),
    }
}

/// `POST {master_addr}/api/agents` with the agent's identity.
pub async fn register(client: &Client, master_addr: &str, agent: &AgentInfo) -> Result<Registration> {
    if agent.uid.is_empty() {
        return Err(LookoutError::InvalidArgument {
            reason: "UID can't be empty".to_string(),
        });
    }

    let url = format!(
        "{}{}",
        master_addr.trim_end_matches('/'),
        endpoints::API_AGENTS
    );
    debug!(%url, uid = %agent.uid, "Registering with master");

    let resp = client
        .post(&url)
        .json(agent)
        .send()
        .await
        .map_err(|e| registration_error(format!("{url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(registration_error(format!(
            "{url} answered {status}: {body}"
        )));
    }

    let registration: Registration = resp
        .json()
        .await
        .map_err(|e| registration_error(format!("malformed response from {url}: {e}")))?;

    info!(nats_url = %registration.nats_url, "Registered with master");
    Ok(registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_register_returns_bus_url() {
        let app = Router::new().route(
            "/api/agents",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["uid"], "23fcdd694986");
                assert_eq!(body["host_name"], "web-01");
                (
                    StatusCode::CREATED,
                    Json(json!({ "nats_url": "nats://10.0.0.5:4222" })),
                )
            }),
        );
        let master = serve(app).await;

        let registration = register(
            &Client::new(),
            &format!("{master}/"),
            &AgentInfo::new("23fcdd694986", "web-01"),
        )
        .await
        .unwrap();
        assert_eq!(registration.nats_url, "nats://10.0.0.5:4222");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let app = Router::new().route(
            "/api/agents",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
        );
        let master = serve(app).await;

        let err = register(&Client::new(), &master, &AgentInfo::new("abc", "host"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookoutError::Registration { .. }));
        assert!(err.to_string().contains("database down"));
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        let app = Router::new().route("/api/agents", post(|| async { "not json" }));
        let master = serve(app).await;

        let err = register(&Client::new(), &master, &AgentInfo::new("abc", "host"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }

    #[tokio::test]
    async fn test_empty_uid_rejected_before_any_request() {
        let err = register(&Client::new(), "http://127.0.0.1:1", &AgentInfo::new("", "host"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookoutError::InvalidArgument { .. }));
    }
}
