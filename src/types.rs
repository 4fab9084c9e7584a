use std::fmt;

use reqwest::{header::HeaderMap, Method};

use crate::{CertifierError, Result};

/// HTTP methods a function can be invoked with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 5] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Put,
        HttpVerb::Patch,
        HttpVerb::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    pub(crate) fn method(self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Patch => Method::PATCH,
            HttpVerb::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of exact HTTP status codes.
///
/// Membership is exact: `200` does not match `201`. Duplicates are dropped,
/// first occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusSet(Vec<u16>);

impl StatusSet {
    pub fn new<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        let mut set = Vec::new();
        for code in codes {
            if !set.contains(&code) {
                set.push(code);
            }
        }
        Self(set)
    }

    /// The default breakout set: `401 Unauthorized`.
    pub fn unauthorized() -> Self {
        Self(vec![401])
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn codes(&self) -> &[u16] {
        &self.0
    }
}

impl<const N: usize> From<[u16; N]> for StatusSet {
    fn from(codes: [u16; N]) -> Self {
        Self::new(codes)
    }
}

impl From<Vec<u16>> for StatusSet {
    fn from(codes: Vec<u16>) -> Self {
        Self::new(codes)
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, code) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{code}")?;
        }
        f.write_str("]")
    }
}

/// A function on the gateway, optionally qualified by namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionTarget {
    pub name: String,
    pub namespace: Option<String>,
}

impl FunctionTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Qualifies the target with a namespace. An empty namespace means the
    /// gateway default.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.trim().is_empty()).then_some(namespace);
        self
    }

    /// Path segment under `/function/`: `name` or `name.namespace`.
    pub fn path_segment(&self) -> Result<String> {
        validate_segment("function name", &self.name)?;
        match &self.namespace {
            Some(namespace) => {
                validate_segment("namespace", namespace)?;
                Ok(format!("{}.{}", self.name, namespace))
            }
            None => Ok(self.name.clone()),
        }
    }
}

impl From<&str> for FunctionTarget {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FunctionTarget {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CertifierError::InvalidInput(format!("{kind} must not be empty")));
    }
    if value.contains(['/', '?', '#']) || value.chars().any(char::is_whitespace) {
        return Err(CertifierError::InvalidInput(format!(
            "{kind} '{value}' is not a valid path segment"
        )));
    }
    Ok(())
}

/// One logical function invocation. Every retry sends an identical copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    pub target: FunctionTarget,
    pub verb: HttpVerb,
    /// Raw query string, appended verbatim when non-empty.
    pub query: String,
    pub body: Option<Vec<u8>>,
}

impl InvocationRequest {
    /// Creates a `POST` invocation with no query string and no body.
    pub fn new(target: impl Into<FunctionTarget>) -> Self {
        Self {
            target: target.into(),
            verb: HttpVerb::Post,
            query: String::new(),
            body: None,
        }
    }

    pub fn with_verb(mut self, verb: HttpVerb) -> Self {
        self.verb = verb;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Response of the attempt that matched an expected status.
#[derive(Clone, Debug)]
pub struct InvocationResult {
    pub body: Vec<u8>,
    pub status: u16,
    pub attempts: usize,
    pub headers: HeaderMap,
}

impl InvocationResult {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// How an invocation loop ended.
#[derive(Clone, Debug)]
pub enum InvocationOutcome {
    Success(InvocationResult),
    /// A breakout status was observed; no further attempts were made.
    Breakout {
        status: u16,
        body: Vec<u8>,
        attempts: usize,
    },
    /// All attempts were used without a match.
    Exhausted {
        last_status: Option<u16>,
        last_body: Vec<u8>,
        attempts: usize,
    },
    Cancelled {
        attempts: usize,
    },
}

impl InvocationOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            InvocationOutcome::Success(result) => result.attempts,
            InvocationOutcome::Breakout { attempts, .. }
            | InvocationOutcome::Exhausted { attempts, .. }
            | InvocationOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success(_))
    }

    /// Converts every non-success outcome into a fatal [`CertifierError`].
    pub fn into_result(self) -> Result<InvocationResult> {
        match self {
            InvocationOutcome::Success(result) => Ok(result),
            InvocationOutcome::Breakout {
                status,
                body,
                attempts,
            } => Err(CertifierError::Breakout {
                status,
                attempts,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            InvocationOutcome::Exhausted {
                last_status,
                last_body,
                attempts,
            } => Err(CertifierError::Exhausted {
                attempts,
                last_status,
                body: String::from_utf8_lossy(&last_body).into_owned(),
            }),
            InvocationOutcome::Cancelled { attempts } => {
                Err(CertifierError::Cancelled { attempts })
            }
        }
    }
}
