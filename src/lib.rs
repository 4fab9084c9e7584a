//! `faas-certifier` is an async certification harness for FaaS gateways.
//!
//! The crate drives a running gateway over HTTP:
//! - [`GatewayClient::invoke`] polls a function until it answers with an
//!   expected status, breaking out early on fatal codes such as `401`
//! - [`GatewayClient::deploy`], [`GatewayClient::scale_function`],
//!   [`GatewayClient::create_secret`], [`GatewayClient::logs`] and friends
//!   wrap the gateway's `/system` API
//! - [`CertifierConfig::from_env`] resolves gateway, auth and feature flags

mod auth;
mod cases;
mod client;
mod config;
mod decode;
mod error;
mod options;
mod poller;
mod types;
mod wire;

pub use auth::GatewayAuth;
pub use cases::{namespaced_copies, FunctionCase};
pub use client::{resource_url, GatewayClient};
pub use config::{CertifierConfig, DEFAULT_GATEWAY, DEFAULT_NAMESPACE, DEFAULT_REGISTRY_PREFIX};
pub use decode::strip_log_timestamp;
pub use error::CertifierError;
pub use options::{ClientOptions, RetryPolicy};
pub use types::{
    FunctionTarget, HttpVerb, InvocationOutcome, InvocationRequest, InvocationResult, StatusSet,
};
pub use wire::{
    FunctionDeployment, FunctionResources, FunctionStatus, LogMessage, ProviderInfo, Secret,
    SystemInfo, VersionInfo,
};

pub type Result<T> = std::result::Result<T, CertifierError>;
