/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum CertifierError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Unexpected HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The gateway rejected the credentials (or none were configured).
    #[error("unauthorized action, please setup authentication for this gateway: {body}")]
    Unauthorized { body: String },
    /// The named function or secret does not exist on the gateway.
    #[error("{name} not found")]
    NotFound { name: String },
    /// Response decoding or shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Caller input rejected before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Configuration could not be resolved from the environment.
    #[error("config error: {0}")]
    Config(String),
    /// A breakout status ended the invocation without further retries.
    #[error("received breakout-status {status} after {attempts} attempt(s), invoke failed with: {body}")]
    Breakout {
        status: u16,
        attempts: usize,
        body: String,
    },
    /// Every attempt was used without observing an expected status.
    #[error("failing after {attempts} attempt(s), last status {}: {body}", display_status(.last_status))]
    Exhausted {
        attempts: usize,
        /// Last status actually received; `None` only when no attempt produced a response.
        last_status: Option<u16>,
        body: String,
    },
    /// The caller's cancellation signal fired before the invocation settled.
    #[error("invocation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: usize },
    /// A polling wait gave up.
    #[error("timed out after {waited_ms} ms: {reason}")]
    Timeout { waited_ms: u64, reason: String },
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "<no response>".to_owned(),
    }
}
