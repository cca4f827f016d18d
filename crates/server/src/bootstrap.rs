use std::sync::Arc;

use async_trait::async_trait;
use kampe_agent::{ConversationMachine, ConversationRuntime, ReplyCopy};
use kampe_backend::{BackendError, HttpBackendClient};
use kampe_core::config::{AppConfig, ConfigError};
use kampe_core::{ChatEvent, InMemorySessionCache, Reply, SessionCache};
use kampe_telegram::api::{ApiError, BotApi};
use kampe_telegram::events::{conversation_dispatcher, ConversationService, EventHandlerError};
use kampe_telegram::polling::{BotApiTransport, PollingRunner, ReconnectPolicy};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub cache: Arc<dyn SessionCache>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend client setup failed: {0}")]
    Backend(#[source] BackendError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[source] ApiError),
}

/// Hands transport events to the conversation runtime.
pub struct RuntimeService {
    runtime: ConversationRuntime,
}

impl RuntimeService {
    pub fn new(runtime: ConversationRuntime) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ConversationService for RuntimeService {
    async fn handle_event(&self, event: &ChatEvent) -> Result<Reply, EventHandlerError> {
        Ok(self.runtime.handle_event(event).await)
    }
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        backend_url = %config.backend.base_url,
        "starting application bootstrap"
    );

    let cache: Arc<dyn SessionCache> = Arc::new(InMemorySessionCache::new());
    let backend =
        Arc::new(HttpBackendClient::from_config(&config.backend).map_err(BootstrapError::Backend)?);
    let machine =
        ConversationMachine::new(backend, cache.clone(), ReplyCopy::new(&config.policy.url));
    let service = Arc::new(RuntimeService::new(ConversationRuntime::new(machine)));

    let api = BotApi::from_config(&config.telegram).map_err(BootstrapError::Telegram)?;
    let transport = Arc::new(BotApiTransport::new(api, config.telegram.poll_timeout_secs));
    let runner =
        PollingRunner::new(transport, conversation_dispatcher(service), ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        telegram_api = %config.telegram.api_base_url,
        "application wired"
    );

    Ok(Application { config, cache, runner })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kampe_agent::{ConversationMachine, ConversationRuntime, ReplyCopy};
    use kampe_backend::HttpBackendClient;
    use kampe_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use kampe_core::{ChatEvent, EventKind, InMemorySessionCache, SessionCache, UserId, UserIdentity};
    use kampe_telegram::events::ConversationService;

    use super::{bootstrap_with_config, Application, BootstrapError, RuntimeService};

    fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?)
    }

    fn options(token: Option<&str>) -> LoadOptions {
        LoadOptions {
            config_path: Some("kampe-test-does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                telegram_token: token.map(str::to_owned),
                backend_url: Some("http://127.0.0.1:9".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_a_valid_bot_token() {
        let result = bootstrap(options(Some("not-a-token")));

        let message = result.err().expect("error").to_string();
        assert!(message.contains("telegram.bot_token"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_wires_an_empty_cache() {
        let app = bootstrap(options(Some("123456:test-token"))).expect("bootstrap succeeds");

        assert_eq!(app.cache.len().await, 0);
        assert_eq!(app.config.backend.base_url, "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn runtime_service_turns_backend_outage_into_a_reply() {
        let backend = Arc::new(
            HttpBackendClient::new("http://127.0.0.1:9", std::time::Duration::from_secs(1))
                .expect("client builds"),
        );
        let machine = ConversationMachine::new(
            backend,
            Arc::new(InMemorySessionCache::new()),
            ReplyCopy::new("https://www.google.com"),
        );
        let service = RuntimeService::new(ConversationRuntime::new(machine));
        let event = ChatEvent::new(
            UserIdentity::new(UserId(7), "Ada"),
            7,
            "update-1",
            EventKind::Text("hello".to_owned()),
        );

        let reply = service.handle_event(&event).await.expect("service never fails");

        assert!(reply.choices.is_empty());
        assert!(!reply.text.is_empty());
    }
}
