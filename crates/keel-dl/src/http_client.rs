//! Process-wide HTTP agent shared by every transport.

use std::{
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use ureq::{
    http::{self, HeaderMap, Uri},
    typestate::WithoutBody,
    Agent, Proxy, RequestBuilder,
};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(concat!("keel/", env!("CARGO_PKG_VERSION")).into()),
            proxy: None,
            headers: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an agent from this configuration.
    ///
    /// Non-2xx statuses are returned as responses rather than errors so that
    /// callers can fall through to the next mirror or react to `401`.
    pub fn build(&self) -> Agent {
        let mut config = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

struct SharedClient {
    agent: Agent,
    config: ClientConfig,
}

static SHARED_CLIENT_STATE: LazyLock<RwLock<SharedClient>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    RwLock::new(SharedClient {
        agent: config.build(),
        config,
    })
});

#[derive(Clone, Copy, Default)]
pub struct SharedAgent;

impl SharedAgent {
    /// GET request through the shared agent, with the global headers applied.
    pub fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        let state = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut req = state.agent.get(uri);
        if let Some(headers) = &state.config.headers {
            for (key, value) in headers {
                req = req.header(key, value);
            }
        }
        req
    }
}

pub static SHARED_AGENT: SharedAgent = SharedAgent;

/// Updates the shared configuration and rebuilds the agent.
///
/// ```
/// use std::time::Duration;
/// use keel_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| cfg.timeout = Some(Duration::from_secs(60)));
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut state = SHARED_CLIENT_STATE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut config = state.config.clone();
    updater(&mut config);
    state.agent = config.build();
    state.config = config;
}
