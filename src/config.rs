use reqwest::Url;

use crate::{CertifierError, GatewayAuth, Result};

pub const DEFAULT_GATEWAY: &str = "http://127.0.0.1:8080";
pub const DEFAULT_NAMESPACE: &str = "openfaas-fn";
pub const DEFAULT_REGISTRY_PREFIX: &str = "docker.io";
const FAASD_PROVIDER: &str = "faasd";

/// Certification settings, resolved once at process entry and passed to
/// every scenario by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertifierConfig {
    /// Gateway base URL without a trailing slash.
    pub gateway: String,
    pub auth: GatewayAuth,
    pub auth_enabled: bool,
    /// Run secret update checks.
    pub secret_update: bool,
    /// Run scaling checks.
    pub enable_scaling: bool,
    /// Extra namespaces to certify besides the default one.
    pub namespaces: Vec<String>,
    pub default_namespace: String,
    pub registry_prefix: String,
    /// Filled in by [`CertifierConfig::apply_provider`].
    pub provider_name: Option<String>,
    pub support_cpu_limits: bool,
}

impl Default for CertifierConfig {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_GATEWAY.to_owned(),
            auth: GatewayAuth::None,
            auth_enabled: false,
            secret_update: true,
            enable_scaling: true,
            namespaces: Vec::new(),
            default_namespace: DEFAULT_NAMESPACE.to_owned(),
            registry_prefix: DEFAULT_REGISTRY_PREFIX.to_owned(),
            provider_name: None,
            support_cpu_limits: true,
        }
    }
}

impl CertifierConfig {
    /// Resolves the configuration from process environment variables.
    ///
    /// Reads:
    /// - `CERTIFIER_GATEWAY`, falling back to `gateway_url`
    /// - `CERTIFIER_TOKEN` or `CERTIFIER_BASIC_AUTH` (`user:password`)
    /// - `CERTIFIER_ENABLE_AUTH`, `CERTIFIER_SECRET_UPDATE`,
    ///   `CERTIFIER_ENABLE_SCALING` (booleans)
    /// - `CERTIFIER_REGISTRY_PREFIX`
    /// - `CERTIFIER_NAMESPACES` (comma separated), `CERTIFIER_DEFAULT_NAMESPACE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CertifierConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        let gateway = var("CERTIFIER_GATEWAY")
            .or_else(|| var("gateway_url"))
            .unwrap_or_else(|| DEFAULT_GATEWAY.to_owned());
        config.gateway = normalize_gateway(&gateway)?;

        config.auth_enabled = parse_flag(&var, "CERTIFIER_ENABLE_AUTH", false)?;
        config.secret_update = parse_flag(&var, "CERTIFIER_SECRET_UPDATE", true)?;
        config.enable_scaling = parse_flag(&var, "CERTIFIER_ENABLE_SCALING", true)?;

        // A user supplied token takes priority over basic credentials.
        if let Some(token) = var("CERTIFIER_TOKEN") {
            config.auth = GatewayAuth::bearer(token);
        } else if let Some(credentials) = var("CERTIFIER_BASIC_AUTH") {
            let (username, password) = credentials.split_once(':').ok_or_else(|| {
                CertifierError::Config("CERTIFIER_BASIC_AUTH must be user:password".to_owned())
            })?;
            config.auth = GatewayAuth::basic(username, password);
        }
        if config.auth.is_enabled() {
            config.auth_enabled = true;
        } else if config.auth_enabled {
            return Err(CertifierError::Config(
                "CERTIFIER_ENABLE_AUTH is set but neither CERTIFIER_TOKEN nor CERTIFIER_BASIC_AUTH is"
                    .to_owned(),
            ));
        }

        if let Some(prefix) = var("CERTIFIER_REGISTRY_PREFIX") {
            config.registry_prefix = prefix.trim().trim_end_matches('/').to_owned();
        }
        if let Some(namespaces) = lookup("CERTIFIER_NAMESPACES") {
            config.namespaces = parse_namespaces(&namespaces);
        }
        if let Some(namespace) = var("CERTIFIER_DEFAULT_NAMESPACE") {
            config.default_namespace = namespace.trim().to_owned();
        }

        Ok(config)
    }

    /// Records the gateway's provider and disables the checks it cannot pass.
    pub fn apply_provider(&mut self, provider_name: &str) {
        self.provider_name = Some(provider_name.to_owned());
        if provider_name == FAASD_PROVIDER {
            self.enable_scaling = false;
            self.secret_update = false;
            self.support_cpu_limits = false;
        } else {
            self.support_cpu_limits = true;
        }
    }

    /// Prefixes an image such as `functions/alpine:latest` with the
    /// configured registry.
    pub fn image(&self, name: &str) -> String {
        format!("{}/{}", self.registry_prefix, name)
    }
}

fn normalize_gateway(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|err| CertifierError::Config(format!("invalid gateway url '{raw}': {err}")))?;
    if url.cannot_be_a_base() {
        return Err(CertifierError::Config(format!(
            "gateway url '{raw}' cannot be used as a base"
        )));
    }
    // Saved CLI credentials are keyed by the gateway without a trailing slash.
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn parse_flag<F>(var: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(CertifierError::Config(format!(
                "{key} must be a boolean, got '{other}'"
            ))),
        },
    }
}

fn parse_namespaces(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|namespace| !namespace.is_empty())
        .map(str::to_owned)
        .collect()
}
