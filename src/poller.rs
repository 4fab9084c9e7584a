use std::future::Future;
use std::time::Duration;

use reqwest::{header, header::HeaderMap, Url};
use tokio::time::sleep;

use crate::{
    GatewayAuth, InvocationOutcome, InvocationRequest, InvocationResult, RetryPolicy, StatusSet,
};

/// A response that was fully read, whatever its status.
struct Observed {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Invokes one function endpoint until it answers with an expected status.
///
/// Attempts run strictly one after another. Each attempt is classified as:
/// - expected status: success, stop;
/// - breakout status: fatal, stop without retrying;
/// - anything else, including transport failures: log, sleep, retry.
pub(crate) struct Poller<'a> {
    pub http: &'a reqwest::Client,
    pub auth: &'a GatewayAuth,
    pub url: Url,
    pub request: &'a InvocationRequest,
    pub timeout: Duration,
}

impl Poller<'_> {
    /// Runs the retry loop. `cancel` preempts an in-flight attempt or sleep.
    ///
    /// The caller validates `expected` and `policy` beforehand.
    pub async fn run<F>(
        &self,
        expected: &StatusSet,
        policy: &RetryPolicy,
        cancel: F,
    ) -> InvocationOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let max_attempts = policy.max_attempts;
        let mut last_status = None;
        let mut last_body = Vec::new();

        for attempt in 1..=max_attempts {
            // An attempt only counts once its request has been started.
            tokio::select! {
                biased;
                _ = &mut cancel => return self.cancelled(attempt - 1),
                _ = std::future::ready(()) => {}
            }

            let observed = tokio::select! {
                biased;
                _ = &mut cancel => return self.cancelled(attempt),
                observed = self.send_once() => observed,
            };

            match observed {
                Ok(observed) if expected.contains(observed.status) => {
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        status = observed.status,
                        url = %self.url,
                        "got correct response"
                    );
                    return InvocationOutcome::Success(InvocationResult {
                        body: observed.body,
                        status: observed.status,
                        attempts: attempt,
                        headers: observed.headers,
                    });
                }
                Ok(observed) if policy.breakout.contains(observed.status) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        status = observed.status,
                        url = %self.url,
                        "received breakout status, not retrying"
                    );
                    return InvocationOutcome::Breakout {
                        status: observed.status,
                        body: observed.body,
                        attempts: attempt,
                    };
                }
                Ok(observed) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wanted = %expected,
                        got = observed.status,
                        url = %self.url,
                        "bad response"
                    );
                    last_status = Some(observed.status);
                    last_body = observed.body;
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wanted = %expected,
                        error = %err,
                        url = %self.url,
                        "request failed"
                    );
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = &mut cancel => return self.cancelled(attempt),
                    _ = sleep(policy.delay()) => {}
                }
            }
        }

        tracing::warn!(
            attempts = max_attempts,
            url = %self.url,
            "invocation failed after all attempts"
        );
        InvocationOutcome::Exhausted {
            last_status,
            last_body,
            attempts: max_attempts,
        }
    }

    async fn send_once(&self) -> Result<Observed, reqwest::Error> {
        let mut builder = self
            .http
            .request(self.request.verb.method(), self.url.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .timeout(self.timeout);
        builder = self.auth.apply(builder);
        if let Some(body) = &self.request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Observed {
            status,
            headers,
            body,
        })
    }

    fn cancelled(&self, attempts: usize) -> InvocationOutcome {
        tracing::warn!(attempts, url = %self.url, "invocation cancelled");
        InvocationOutcome::Cancelled { attempts }
    }
}
