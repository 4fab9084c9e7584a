//! Certification scenarios against a real gateway.
//!
//! Skipped unless `CERTIFIER_GATEWAY` or `gateway_url` is set.

use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use faas_certifier::{
    namespaced_copies, strip_log_timestamp, CertifierConfig, FunctionCase, FunctionDeployment,
    GatewayClient, HttpVerb, InvocationRequest, Secret,
};

struct Live {
    config: CertifierConfig,
    gateway: GatewayClient,
}

async fn live() -> Option<Live> {
    if std::env::var("CERTIFIER_GATEWAY").is_err() && std::env::var("gateway_url").is_err() {
        eprintln!("skipping live test: CERTIFIER_GATEWAY / gateway_url not set");
        return None;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,faas_certifier=debug")
        .with_test_writer()
        .try_init();

    let mut config = CertifierConfig::from_env().expect("certifier config must resolve");
    let gateway = GatewayClient::from_config(&config).expect("gateway client must build");
    let info = gateway.system_info().await.expect("system info must load");
    let provider = info.provider.expect("provider info should be present");
    config.apply_provider(&provider.name);
    tracing::info!(?config, "resolved certifier config");

    Some(Live { config, gateway })
}

fn unique(name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock must be after epoch")
        .as_millis();
    format!("{name}-{}", millis % 100_000)
}

fn alpine(config: &CertifierConfig, name: &str, fprocess: &str) -> FunctionDeployment {
    let mut deployment = FunctionDeployment::new(name, config.image("functions/alpine:latest"));
    deployment.env_process = Some(fprocess.to_owned());
    deployment
}

#[tokio::test]
async fn live_health_and_provider_info() {
    let Some(Live { gateway, .. }) = live().await else {
        return;
    };

    assert_eq!(gateway.health().await.expect("healthz must respond"), 200);

    let info = gateway.system_info().await.expect("system info must load");
    let provider = info.provider.expect("provider info should be present");
    assert!(!provider.orchestration.is_empty(), "provider orchestration name may not be empty");
    assert!(!provider.name.is_empty(), "provider name may not be empty");
    let provider_version = provider.version.expect("provider version cannot be empty");
    assert!(!provider_version.release.is_empty());
    assert!(!provider_version.sha.is_empty());
    let version = info.version.expect("gateway version may not be nil");
    assert!(!version.release.is_empty());
    assert!(!version.sha.is_empty());
}

#[tokio::test]
async fn live_invoke_not_found() {
    let Some(Live { gateway, .. }) = live().await else {
        return;
    };

    gateway
        .invoke(&InvocationRequest::new("notfound"), &[404, 502])
        .await
        .expect("input is valid")
        .into_result()
        .expect("unknown function must answer 404 or 502");
}

#[tokio::test]
async fn live_deploy_and_invoke_cases() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let mut env_vars = HashMap::new();
    env_vars.insert("custom_env".to_owned(), "custom_env_value".to_owned());
    let mut env_test = alpine(&config, &unique("env-test"), "env");
    env_test.env_vars = env_vars;

    let base = vec![FunctionCase::new("custom env vars and query string", env_test)];
    let mut cases = namespaced_copies(&config, &base);
    if cases.is_empty() {
        cases = base;
    }

    for case in &cases {
        let status = gateway.deploy(&case.deployment).await.expect("deploy must succeed");
        assert!(status == 200 || status == 202, "{}: got {status}", case.name);

        let namespace = case.deployment.namespace.clone().unwrap_or_default();
        let functions = gateway
            .list_functions(&namespace)
            .await
            .expect("list must succeed");
        assert!(!functions.is_empty(), "{}: list functions got 0", case.name);

        let empty = gateway
            .invoke(&InvocationRequest::new(case.target()), &[200])
            .await
            .expect("input is valid")
            .into_result()
            .expect("function must become ready");
        assert!(empty.text().contains("custom_env"), "{}", case.name);

        let populated = gateway
            .invoke(&InvocationRequest::new(case.target()).with_query("testing=1"), &[200])
            .await
            .expect("input is valid")
            .into_result()
            .expect("function must answer");
        assert!(populated.text().contains("Http_Query=testing=1"), "{}", case.name);

        for verb in HttpVerb::ALL {
            let result = gateway
                .invoke(&InvocationRequest::new(case.target()).with_verb(verb), &[200])
                .await
                .expect("input is valid")
                .into_result()
                .expect("function must answer every verb");
            assert!(result.text().contains(&format!("Http_Method={verb}")));
        }

        gateway
            .delete_function(&case.deployment.service, &namespace)
            .await
            .expect("delete must succeed");
    }
}

fn assert_contains_all(what: &str, got: Option<&HashMap<String, String>>, wanted: &HashMap<String, String>) {
    // Providers may add their own entries, so only the wanted ones are compared.
    let got = got.unwrap_or_else(|| panic!("{what} missing from function status"));
    for (key, value) in wanted {
        assert_eq!(got.get(key), Some(value), "{what}: key {key}");
    }
}

#[tokio::test]
async fn live_deploy_stronghash() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let deployment = alpine(&config, &unique("stronghash"), "sha512sum");
    let status = gateway.deploy(&deployment).await.expect("deploy must succeed");
    assert!(status == 200 || status == 202, "got {status}");

    let functions = gateway.list_functions("").await.expect("list must succeed");
    assert!(functions.iter().any(|function| function.name == deployment.service));

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_deploy_with_labels() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let wanted = HashMap::from([
        ("upstream_uri".to_owned(), "example.com".to_owned()),
        ("canary_build".to_owned(), "true".to_owned()),
    ]);
    let mut deployment = alpine(&config, &unique("env-test-labels"), "env");
    deployment.labels = Some(wanted.clone());
    gateway.deploy(&deployment).await.expect("deploy must succeed");

    gateway
        .invoke(&InvocationRequest::new(deployment.service.as_str()), &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must become ready");
    let function = gateway
        .get_function(&deployment.service, "")
        .await
        .expect("get must succeed");
    assert_contains_all("labels", function.labels.as_ref(), &wanted);

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_deploy_with_annotations() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let wanted = HashMap::from([
        ("important-date".to_owned(), "Fri Aug 10 08:21:00 BST 2018".to_owned()),
        (
            "some-json".to_owned(),
            r#"{"glossary": {"title": "example glossary", "GlossDiv": {"title": "S", "GlossList": ["GML", "XML"]}}}"#
                .to_owned(),
        ),
    ]);
    let mut deployment = alpine(&config, &unique("env-test-annotations"), "env");
    deployment.annotations = Some(wanted.clone());
    gateway.deploy(&deployment).await.expect("deploy must succeed");

    gateway
        .invoke(&InvocationRequest::new(deployment.service.as_str()), &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must become ready");
    let function = gateway
        .get_function(&deployment.service, "")
        .await
        .expect("get must succeed");
    assert_contains_all("annotations", function.annotations.as_ref(), &wanted);

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_secret_crud() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let secret_name = unique("secret-name");
    let value = "this-is-the-secret-value";
    let status = gateway
        .create_secret(&Secret::new(secret_name.clone(), value))
        .await
        .expect("create secret must succeed");
    assert!(status == 201 || status == 202, "got {status}");

    let mut deployment = alpine(
        &config,
        &unique("test-secret-crud"),
        &format!("cat /var/openfaas/secrets/{secret_name}"),
    );
    deployment.secrets = vec![secret_name.clone()];
    gateway.deploy(&deployment).await.expect("deploy must succeed");

    let request = InvocationRequest::new(deployment.service.as_str());
    let read = gateway
        .invoke(&request, &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must read the secret");
    assert_eq!(read.text(), value);

    let secrets = gateway.list_secrets("").await.expect("list must succeed");
    assert!(secrets.iter().any(|secret| secret.name == secret_name));

    if config.secret_update {
        let status = gateway
            .update_secret(&Secret::new(secret_name.clone(), "this-is-the-edited-secret-value"))
            .await
            .expect("update secret must succeed");
        assert!(status == 200 || status == 202, "got {status}");
    }

    // The function holds the secret; remove it first.
    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
    gateway
        .remove_secret(&secret_name, "")
        .await
        .expect("remove secret must succeed");

    let secrets = gateway.list_secrets("").await.expect("list must succeed");
    assert!(!secrets.iter().any(|secret| secret.name == secret_name));
}

#[tokio::test]
async fn live_scaling() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };
    if !config.enable_scaling {
        eprintln!("skipping scaling test: disabled for this provider");
        return;
    }

    let deployment = alpine(&config, &unique("test-scaling"), "sha512sum");
    gateway.deploy(&deployment).await.expect("deploy must succeed");
    gateway
        .invoke(&InvocationRequest::new(deployment.service.as_str()), &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must become ready");

    gateway
        .scale_function(&deployment.service, "", 2)
        .await
        .expect("scale must succeed");
    let function = gateway
        .wait_for_replicas(
            &deployment.service,
            "",
            2,
            Duration::from_millis(500),
            Duration::from_secs(60),
        )
        .await
        .expect("function must reach 2 replicas");
    assert_eq!(function.available_replicas, 2);

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_scale_minimum() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };
    if !config.enable_scaling {
        eprintln!("skipping scaling test: disabled for this provider");
        return;
    }

    let mut deployment = alpine(&config, &unique("test-min-scale"), "sha512sum");
    deployment.labels = Some(HashMap::from([(
        "com.openfaas.scale.min".to_owned(),
        "2".to_owned(),
    )]));
    let status = gateway.deploy(&deployment).await.expect("deploy must succeed");
    assert!(status == 200 || status == 202, "got {status}");

    let function = gateway
        .get_function(&deployment.service, "")
        .await
        .expect("get must succeed");
    assert_eq!(function.replicas, 2);

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_scale_from_zero_during_invoke() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };
    if !config.enable_scaling {
        eprintln!("skipping scaling test: disabled for this provider");
        return;
    }

    let deployment = alpine(&config, &unique("test-scale-from-zero"), "sha512sum");
    let status = gateway.deploy(&deployment).await.expect("deploy must succeed");
    assert!(status == 200 || status == 202, "got {status}");

    gateway
        .scale_function(&deployment.service, "", 0)
        .await
        .expect("scale must succeed");
    let function = gateway
        .get_function(&deployment.service, "")
        .await
        .expect("get must succeed");
    assert_eq!(function.replicas, 0);

    // The invocation itself has to wait out the cold start.
    gateway
        .invoke(&InvocationRequest::new(deployment.service.as_str()), &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must scale up from zero");

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_function_logs() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };

    let deployment = alpine(&config, &unique("test-logger"), "sha512sum");
    gateway.deploy(&deployment).await.expect("deploy must succeed");

    // Each invocation writes "Forking fprocess" and "Wrote 132 Bytes".
    gateway
        .invoke(&InvocationRequest::new(deployment.service.as_str()), &[200])
        .await
        .expect("input is valid")
        .into_result()
        .expect("function must answer");

    let lines = tokio::time::timeout(
        Duration::from_secs(5),
        gateway.logs(&deployment.service, "", 2),
    )
    .await
    .expect("logs must not hang")
    .expect("logs must decode");

    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line.name, deployment.service);
        let text = strip_log_timestamp(&line.text);
        assert!(
            text.starts_with("Forking fprocess") || text.starts_with("Wrote 132 Bytes"),
            "unexpected log message {text:?}"
        );
    }

    gateway
        .delete_function(&deployment.service, "")
        .await
        .expect("delete must succeed");
}

#[tokio::test]
async fn live_namespaces() {
    let Some(Live { config, gateway }) = live().await else {
        return;
    };
    if config.namespaces.is_empty() {
        eprintln!("skipping namespace test: CERTIFIER_NAMESPACES not set");
        return;
    }

    let namespaces = gateway.list_namespaces().await.expect("list must succeed");
    for wanted in &config.namespaces {
        assert!(namespaces.contains(wanted), "namespace {wanted} missing from {namespaces:?}");
    }
}
