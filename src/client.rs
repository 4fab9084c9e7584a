use std::fmt;
use std::future::{pending, Future};
use std::time::Duration;

use reqwest::{header, redirect, Method, RequestBuilder, Url};
use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::{
    decode::{decode_json, decode_log_stream},
    poller::Poller,
    wire::{DeleteFunctionRequest, ScaleServiceRequest},
    CertifierConfig, CertifierError, ClientOptions, FunctionDeployment, FunctionStatus,
    GatewayAuth, InvocationOutcome, InvocationRequest, LogMessage, Result, RetryPolicy, Secret,
    StatusSet, SystemInfo,
};

/// Builds `{gateway}/{path}` and attaches the raw query string when non-empty.
///
/// Example: `("http://gw:8080", "function/env", "testing=1")` →
/// `"http://gw:8080/function/env?testing=1"`
pub fn resource_url(gateway: &Url, path: &str, query: &str) -> Url {
    let mut url = gateway.clone();
    let base = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
    let query = query.strip_prefix('?').unwrap_or(query);
    url.set_query((!query.is_empty()).then_some(query));
    url
}

#[derive(Clone)]
/// HTTP client for a FaaS gateway's REST API and function endpoints.
pub struct GatewayClient {
    http: reqwest::Client,
    gateway: Url,
    auth: GatewayAuth,
    options: ClientOptions,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("gateway", &self.gateway.as_str())
            .field("auth", &self.auth)
            .field("options", &self.options)
            .finish()
    }
}

impl GatewayClient {
    /// Creates an unauthenticated client for the gateway at `gateway`.
    ///
    /// Redirects are never followed, so `3xx` answers from functions stay
    /// observable to callers.
    pub fn new(gateway: impl AsRef<str>) -> Result<Self> {
        let raw = gateway.as_ref().trim();
        let gateway = Url::parse(raw).map_err(|err| {
            CertifierError::InvalidInput(format!("invalid gateway url '{raw}': {err}"))
        })?;
        if gateway.cannot_be_a_base() {
            return Err(CertifierError::InvalidInput(format!(
                "gateway url '{raw}' cannot be used as a base"
            )));
        }
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(CertifierError::Transport)?;

        Ok(Self {
            http,
            gateway,
            auth: GatewayAuth::None,
            options: ClientOptions::default(),
        })
    }

    /// Creates a client for the configured gateway and credentials.
    pub fn from_config(config: &CertifierConfig) -> Result<Self> {
        Ok(Self::new(&config.gateway)?.with_auth(config.auth.clone()))
    }

    pub fn with_auth(mut self, auth: GatewayAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }

    /// Full URL an invocation of `request` is sent to.
    pub fn function_url(&self, request: &InvocationRequest) -> Result<Url> {
        let segment = request.target.path_segment()?;
        Ok(resource_url(
            &self.gateway,
            &format!("function/{segment}"),
            &request.query,
        ))
    }

    /// Invokes a function with the client's default retry policy.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        expected: &[u16],
    ) -> Result<InvocationOutcome> {
        let policy = self.options.retry.clone();
        self.invoke_until(request, expected, &policy, pending()).await
    }

    pub async fn invoke_with_policy(
        &self,
        request: &InvocationRequest,
        expected: &[u16],
        policy: &RetryPolicy,
    ) -> Result<InvocationOutcome> {
        self.invoke_until(request, expected, policy, pending()).await
    }

    /// Invokes a function until it answers with one of `expected`.
    ///
    /// Returns `Err` only for malformed input, before any request is sent.
    /// Every other ending, including breakout, exhaustion and cancellation,
    /// is an [`InvocationOutcome`]. Resolving `cancel` stops the loop during
    /// an attempt or between attempts.
    pub async fn invoke_until<F>(
        &self,
        request: &InvocationRequest,
        expected: &[u16],
        policy: &RetryPolicy,
        cancel: F,
    ) -> Result<InvocationOutcome>
    where
        F: Future<Output = ()>,
    {
        let expected = StatusSet::new(expected.iter().copied());
        if expected.is_empty() {
            return Err(CertifierError::InvalidInput(
                "expected status set must not be empty".to_owned(),
            ));
        }
        policy.validate()?;
        let url = self.function_url(request)?;

        let poller = Poller {
            http: &self.http,
            auth: &self.auth,
            url,
            request,
            timeout: self.timeout(),
        };
        Ok(poller.run(&expected, policy, cancel).await)
    }

    /// Calls `/healthz` and returns the status code.
    pub async fn health(&self) -> Result<u16> {
        let (status, _) = self.send(Method::GET, "healthz", &[], None::<&()>).await?;
        Ok(status)
    }

    pub async fn system_info(&self) -> Result<SystemInfo> {
        let (status, body) = self.send(Method::GET, "system/info", &[], None::<&()>).await?;
        expect_status(status, body, &[200], None)
            .and_then(|body| decode_json(&body, "system info"))
    }

    /// Deploys a function and returns the gateway's status code.
    pub async fn deploy(&self, deployment: &FunctionDeployment) -> Result<u16> {
        tracing::info!(function = %deployment.service, namespace = ?deployment.namespace, "deploying function");
        let (status, body) = self
            .send(Method::POST, "system/functions", &[], Some(deployment))
            .await?;
        expect_status(status, body, &[200, 201, 202], None)?;
        Ok(status)
    }

    /// Updates an existing function and returns the gateway's status code.
    pub async fn update(&self, deployment: &FunctionDeployment) -> Result<u16> {
        tracing::info!(function = %deployment.service, namespace = ?deployment.namespace, "updating function");
        let (status, body) = self
            .send(Method::PUT, "system/functions", &[], Some(deployment))
            .await?;
        expect_status(status, body, &[200, 201, 202], Some(deployment.service.as_str()))?;
        Ok(status)
    }

    pub async fn list_functions(&self, namespace: &str) -> Result<Vec<FunctionStatus>> {
        let (status, body) = self
            .send(Method::GET, "system/functions", &namespace_query(namespace), None::<&()>)
            .await?;
        expect_status(status, body, &[200], None)
            .and_then(|body| decode_json(&body, "function list"))
    }

    pub async fn get_function(&self, name: &str, namespace: &str) -> Result<FunctionStatus> {
        let path = format!("system/function/{name}");
        let (status, body) = self
            .send(Method::GET, &path, &namespace_query(namespace), None::<&()>)
            .await?;
        expect_status(status, body, &[200], Some(name))
            .and_then(|body| decode_json(&body, "function status"))
    }

    pub async fn delete_function(&self, name: &str, namespace: &str) -> Result<()> {
        tracing::info!(function = %name, namespace = %namespace, "deleting function");
        let payload = DeleteFunctionRequest {
            function_name: name,
            namespace: non_empty(namespace),
        };
        let (status, body) = self
            .send(Method::DELETE, "system/functions", &[], Some(&payload))
            .await?;
        expect_status(status, body, &[200, 202], Some(name))?;
        Ok(())
    }

    /// Sets the replica count of a function.
    pub async fn scale_function(&self, name: &str, namespace: &str, replicas: u64) -> Result<()> {
        tracing::info!(function = %name, namespace = %namespace, replicas, "scaling function");
        let path = format!("system/scale-function/{name}");
        let payload = ScaleServiceRequest {
            service_name: name,
            replicas,
            namespace: non_empty(namespace),
        };
        let (status, body) = self
            .send(Method::POST, &path, &namespace_query(namespace), Some(&payload))
            .await?;
        expect_status(status, body, &[200, 201, 202], Some(name))?;
        Ok(())
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let (status, body) = self
            .send(Method::GET, "system/namespaces", &[], None::<&()>)
            .await?;
        expect_status(status, body, &[200], None)
            .and_then(|body| decode_json(&body, "namespace list"))
    }

    pub async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        let (status, body) = self
            .send(Method::GET, "system/secrets", &namespace_query(namespace), None::<&()>)
            .await?;
        expect_status(status, body, &[200], None)
            .and_then(|body| decode_json(&body, "secret list"))
    }

    /// Creates a secret and returns the gateway's status code.
    pub async fn create_secret(&self, secret: &Secret) -> Result<u16> {
        tracing::info!(secret = %secret.name, "creating secret");
        let (status, body) = self
            .send(Method::POST, "system/secrets", &[], Some(secret))
            .await?;
        expect_status(status, body, &[200, 201, 202], None)?;
        Ok(status)
    }

    /// Replaces a secret's value and returns the gateway's status code.
    pub async fn update_secret(&self, secret: &Secret) -> Result<u16> {
        tracing::info!(secret = %secret.name, "updating secret");
        let (status, body) = self
            .send(Method::PUT, "system/secrets", &[], Some(secret))
            .await?;
        expect_status(status, body, &[200, 202], Some(secret.name.as_str()))?;
        Ok(status)
    }

    pub async fn remove_secret(&self, name: &str, namespace: &str) -> Result<()> {
        tracing::info!(secret = %name, namespace = %namespace, "removing secret");
        let payload = Secret {
            name: name.to_owned(),
            namespace: non_empty(namespace).map(str::to_owned),
            value: None,
        };
        let (status, body) = self
            .send(Method::DELETE, "system/secrets", &[], Some(&payload))
            .await?;
        expect_status(status, body, &[200, 202], Some(name))?;
        Ok(())
    }

    /// Fetches the last `tail` log lines of a function without following.
    pub async fn logs(&self, name: &str, namespace: &str, tail: usize) -> Result<Vec<LogMessage>> {
        let tail = tail.to_string();
        let mut query = vec![("name", name), ("tail", tail.as_str()), ("follow", "false")];
        if let Some(namespace) = non_empty(namespace) {
            query.push(("namespace", namespace));
        }
        let (status, body) = self
            .send(Method::GET, "system/logs", &query, None::<&()>)
            .await?;
        expect_status(status, body, &[200], Some(name)).and_then(|body| decode_log_stream(&body))
    }

    /// Polls a function until its available replica count equals `target`.
    pub async fn wait_for_replicas(
        &self,
        name: &str,
        namespace: &str,
        target: u64,
        interval: Duration,
        timeout: Duration,
    ) -> Result<FunctionStatus> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let function = self.get_function(name, namespace).await?;
            if function.available_replicas == target {
                tracing::info!(
                    function = %name,
                    replicas = target,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "reached desired replicas"
                );
                return Ok(function);
            }
            if Instant::now() + interval > deadline {
                return Err(CertifierError::Timeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                    reason: format!(
                        "{name} has {} available replicas, wanted {target}",
                        function.available_replicas
                    ),
                });
            }
            sleep(interval).await;
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.options.timeout_ms)
    }

    fn request(&self, method: Method, path: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let url = resource_url(&self.gateway, path, "");
        let mut builder = self.http.request(method, url).timeout(self.timeout());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        self.auth.apply(builder)
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        payload: Option<&T>,
    ) -> Result<(u16, String)> {
        let mut builder = self.request(method, path, query);
        if let Some(payload) = payload {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .json(payload);
        }
        let response = builder.send().await.map_err(CertifierError::Transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(CertifierError::Transport)?;
        Ok((status, body))
    }
}

fn expect_status(status: u16, body: String, accepted: &[u16], name: Option<&str>) -> Result<String> {
    if accepted.contains(&status) {
        return Ok(body);
    }
    match (status, name) {
        (401, _) => Err(CertifierError::Unauthorized { body }),
        (404, Some(name)) => Err(CertifierError::NotFound {
            name: name.to_owned(),
        }),
        _ => Err(CertifierError::Http { status, body }),
    }
}

fn namespace_query(namespace: &str) -> Vec<(&'static str, &str)> {
    non_empty(namespace)
        .map(|namespace| ("namespace", namespace))
        .into_iter()
        .collect()
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
