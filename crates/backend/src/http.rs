use std::time::{Duration, Instant};

use async_trait::async_trait;
use kampe_core::config::BackendConfig;
use kampe_core::{UserId, UserIdentity};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::{
    BackendClient, BackendError, BackendOperation, CreatedSession, ModelReply, SessionContext,
    UserLookup, UserRecord,
};
use crate::wire::{
    CreateSessionRequest, CreateSessionResponse, SendMessageRequest, SendMessageResponse,
    UserIdQuery, UserInfoResponse,
};

/// reqwest-backed [`BackendClient`]. One pooled `Client` is shared by every call.
#[derive(Clone, Debug)]
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build().map_err(BackendError::Setup)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn url(&self, operation: BackendOperation) -> String {
        format!("{}{}", self.base_url, operation.path())
    }

    async fn execute(
        &self,
        operation: BackendOperation,
        request: RequestBuilder,
    ) -> Result<Response, BackendError> {
        let started = Instant::now();
        let result = request.send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                debug!(
                    event_name = "backend.call",
                    operation = operation.as_str(),
                    status = response.status().as_u16(),
                    elapsed_ms,
                    "backend call completed"
                );
                Ok(response)
            }
            Err(source) => {
                warn!(
                    event_name = "backend.call",
                    operation = operation.as_str(),
                    elapsed_ms,
                    error = %source,
                    "backend call failed before a response arrived"
                );
                Err(BackendError::Request { operation, source })
            }
        }
    }
}

fn ensure_success(operation: BackendOperation, response: &Response) -> Result<(), BackendError> {
    let status = response.status();
    if status != StatusCode::OK {
        warn!(
            event_name = "backend.call",
            operation = operation.as_str(),
            status = status.as_u16(),
            "backend returned a non-success status"
        );
        return Err(BackendError::Status { operation, status: status.as_u16() });
    }
    Ok(())
}

async fn decode<T>(operation: BackendOperation, response: Response) -> Result<T, BackendError>
where
    T: DeserializeOwned,
{
    response
        .json::<T>()
        .await
        .map_err(|error| BackendError::Decode { operation, message: error.to_string() })
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn create_session(
        &self,
        identity: &UserIdentity,
    ) -> Result<CreatedSession, BackendError> {
        let operation = BackendOperation::CreateSession;
        let request =
            self.client.post(self.url(operation)).json(&CreateSessionRequest::from(identity));
        let response = self.execute(operation, request).await?;
        ensure_success(operation, &response)?;

        let body: CreateSessionResponse = decode(operation, response).await?;
        Ok(body.into())
    }

    async fn send_message(
        &self,
        session: &SessionContext,
        text: &str,
    ) -> Result<ModelReply, BackendError> {
        let operation = BackendOperation::SendMessage;
        let body = SendMessageRequest {
            user_id: session.user_id.to_string(),
            message: text,
            session_id: session.session_id.as_deref(),
        };
        let request = self.client.post(self.url(operation)).json(&body);
        let response = self.execute(operation, request).await?;
        ensure_success(operation, &response)?;

        let body: SendMessageResponse = decode(operation, response).await?;
        Ok(body.into())
    }

    async fn fetch_user_record(&self, user_id: UserId) -> Result<UserLookup, BackendError> {
        let operation = BackendOperation::GetUserInfo;
        let request =
            self.client.get(self.url(operation)).query(&UserIdQuery { user_id: user_id.0 });
        let response = self.execute(operation, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(UserLookup::NotFound);
        }
        ensure_success(operation, &response)?;

        let body: UserInfoResponse = decode(operation, response).await?;
        Ok(match body.user_info {
            Some(row) => UserLookup::Found(UserRecord::from(row)),
            None => UserLookup::NotFound,
        })
    }

    async fn record_policy_acceptance(&self, user_id: UserId) -> Result<(), BackendError> {
        let operation = BackendOperation::AcceptPolicy;
        let request =
            self.client.post(self.url(operation)).query(&UserIdQuery { user_id: user_id.0 });
        let response = self.execute(operation, request).await?;
        ensure_success(operation, &response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use kampe_core::{Threshold, UserId, UserIdentity};
    use serde_json::{json, Value};

    use super::HttpBackendClient;
    use crate::client::{BackendClient, BackendError, BackendOperation, SessionContext, UserLookup};

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<Value>>>,
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    impl Recorded {
        fn bodies(&self) -> Vec<Value> {
            self.bodies.lock().expect("bodies lock").clone()
        }

        fn queries(&self) -> Vec<HashMap<String, String>> {
            self.queries.lock().expect("queries lock").clone()
        }
    }

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("local address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    fn client(base_url: &str) -> HttpBackendClient {
        HttpBackendClient::new(base_url, Duration::from_secs(5)).expect("client builds")
    }

    fn identity() -> UserIdentity {
        UserIdentity::new(UserId(1001), "Ada").with_username("ada_o")
    }

    #[tokio::test]
    async fn create_session_posts_identity_and_decodes_threshold() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/create-session",
                post(|State(recorded): State<Recorded>, Json(body): Json<Value>| async move {
                    recorded.bodies.lock().expect("bodies lock").push(body);
                    Json(json!({ "threshold": 5 }))
                }),
            )
            .with_state(recorded.clone());
        let base_url = spawn_backend(router).await;

        let created = client(&base_url).create_session(&identity()).await.expect("created");

        assert_eq!(created.threshold, Threshold::from(5));
        assert!(!created.policy_accepted);
        let bodies = recorded.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["user_id"], 1001);
        assert_eq!(bodies[0]["username"], "ada_o");
    }

    #[tokio::test]
    async fn create_session_non_ok_status_is_a_failure() {
        let router = Router::new().route(
            "/create-session",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))) }),
        );
        let base_url = spawn_backend(router).await;

        let error = client(&base_url).create_session(&identity()).await.expect_err("failure");

        assert!(matches!(
            error,
            BackendError::Status { operation: BackendOperation::CreateSession, status: 500 }
        ));
    }

    #[tokio::test]
    async fn send_message_posts_user_id_as_text_and_relays_reply() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/send-message",
                post(|State(recorded): State<Recorded>, Json(body): Json<Value>| async move {
                    recorded.bodies.lock().expect("bodies lock").push(body);
                    Json(json!({ "message": "I dey kampe", "threshold": 7 }))
                }),
            )
            .with_state(recorded.clone());
        let base_url = spawn_backend(router).await;

        let reply = client(&base_url)
            .send_message(&SessionContext { user_id: UserId(1001), session_id: None }, "how far")
            .await
            .expect("reply");

        assert_eq!(reply.message, "I dey kampe");
        assert_eq!(reply.threshold, Threshold::from(7));
        assert_eq!(recorded.bodies(), vec![json!({ "user_id": "1001", "message": "how far" })]);
    }

    #[tokio::test]
    async fn send_message_includes_known_session_id() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/send-message",
                post(|State(recorded): State<Recorded>, Json(body): Json<Value>| async move {
                    recorded.bodies.lock().expect("bodies lock").push(body);
                    Json(json!({ "message": "ok", "threshold": 1 }))
                }),
            )
            .with_state(recorded.clone());
        let base_url = spawn_backend(router).await;

        client(&base_url)
            .send_message(
                &SessionContext { user_id: UserId(1001), session_id: Some("s-9".to_owned()) },
                "hello",
            )
            .await
            .expect("reply");

        assert_eq!(recorded.bodies()[0]["session_id"], "s-9");
    }

    #[tokio::test]
    async fn fetch_user_record_decodes_positional_row() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/get-user-info",
                get(
                    |State(recorded): State<Recorded>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        recorded.queries.lock().expect("queries lock").push(query);
                        Json(json!({ "user_info": [1001, 4, [], {}, true] }))
                    },
                ),
            )
            .with_state(recorded.clone());
        let base_url = spawn_backend(router).await;

        let lookup = client(&base_url).fetch_user_record(UserId(1001)).await.expect("lookup");

        let UserLookup::Found(record) = lookup else {
            panic!("expected a record, got {lookup:?}");
        };
        assert_eq!(record.threshold, Threshold::from(4));
        assert!(record.policy_accepted);
        assert_eq!(recorded.queries()[0].get("user_id").map(String::as_str), Some("1001"));
    }

    #[tokio::test]
    async fn fetch_user_record_maps_not_found_to_absent_record() {
        let router = Router::new().route(
            "/get-user-info",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "detail": "no user" }))) }),
        );
        let base_url = spawn_backend(router).await;

        let lookup = client(&base_url).fetch_user_record(UserId(1001)).await.expect("lookup");

        assert_eq!(lookup, UserLookup::NotFound);
    }

    #[tokio::test]
    async fn fetch_user_record_server_error_is_not_mistaken_for_absent_record() {
        let router = Router::new().route(
            "/get-user-info",
            get(|| async { (StatusCode::BAD_GATEWAY, Json(json!({}))) }),
        );
        let base_url = spawn_backend(router).await;

        let error = client(&base_url).fetch_user_record(UserId(1001)).await.expect_err("error");

        assert!(matches!(error, BackendError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn record_policy_acceptance_passes_user_id_query() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/accept-policy",
                post(
                    |State(recorded): State<Recorded>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        recorded.queries.lock().expect("queries lock").push(query);
                        StatusCode::OK
                    },
                ),
            )
            .with_state(recorded.clone());
        let base_url = spawn_backend(router).await;

        client(&base_url).record_policy_acceptance(UserId(1001)).await.expect("accepted");

        assert_eq!(recorded.queries()[0].get("user_id").map(String::as_str), Some("1001"));
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("local address");
        drop(listener);

        let error = client(&format!("http://{address}"))
            .record_policy_acceptance(UserId(1001))
            .await
            .expect_err("connection should be refused");

        assert!(matches!(
            error,
            BackendError::Request { operation: BackendOperation::AcceptPolicy, .. }
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client("http://backend.local/ ");
        assert_eq!(
            client.url(BackendOperation::GetUserInfo),
            "http://backend.local/get-user-info"
        );
    }
}
