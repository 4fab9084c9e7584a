use faas_certifier::{CertifierConfig, FunctionDeployment, GatewayClient, InvocationRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,faas_certifier=debug")),
        )
        .init();

    let mut config = CertifierConfig::from_env()?;
    let gateway = GatewayClient::from_config(&config)?;

    let info = gateway.system_info().await?;
    if let Some(provider) = &info.provider {
        config.apply_provider(&provider.name);
    }
    println!("{config:#?}");

    let mut deployment =
        FunctionDeployment::new("smoke-env", config.image("functions/alpine:latest"));
    deployment.env_process = Some("env".to_owned());
    gateway.deploy(&deployment).await?;

    let result = gateway
        .invoke(&InvocationRequest::new("smoke-env").with_query("smoke=1"), &[200])
        .await?
        .into_result()?;
    println!("ready after {} attempt(s)", result.attempts);
    println!("{}", result.text());

    gateway.delete_function("smoke-env", "").await?;
    Ok(())
}
