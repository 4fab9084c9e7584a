use crate::{CertifierConfig, FunctionDeployment, FunctionTarget};

/// A named deployment exercised by a certification scenario.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCase {
    pub name: String,
    pub deployment: FunctionDeployment,
}

impl FunctionCase {
    pub fn new(name: impl Into<String>, deployment: FunctionDeployment) -> Self {
        Self {
            name: name.into(),
            deployment,
        }
    }

    /// The invocation target for this case's function.
    pub fn target(&self) -> FunctionTarget {
        let target = FunctionTarget::new(self.deployment.service.clone());
        match &self.deployment.namespace {
            Some(namespace) => target.in_namespace(namespace.clone()),
            None => target,
        }
    }
}

/// Duplicates `cases` into the first extra namespace from the config.
///
/// Returns the originals followed by the retargeted copies, or nothing at
/// all when no extra namespaces are configured.
pub fn namespaced_copies(config: &CertifierConfig, cases: &[FunctionCase]) -> Vec<FunctionCase> {
    let Some(namespace) = config.namespaces.first() else {
        return Vec::new();
    };

    let copies = cases.iter().map(|case| {
        let mut copy = case.clone();
        copy.name = format!("{} to {namespace}", case.name);
        copy.deployment.namespace = Some(namespace.clone());
        copy
    });

    cases.iter().cloned().chain(copies).collect()
}

#[cfg(test)]
mod tests {
    use super::{namespaced_copies, FunctionCase};
    use crate::{CertifierConfig, FunctionDeployment};

    fn cases() -> Vec<FunctionCase> {
        vec![
            FunctionCase::new(
                "deploy env",
                FunctionDeployment::new("env-test", "functions/alpine:latest"),
            ),
            FunctionCase::new(
                "deploy hash",
                FunctionDeployment::new("stronghash", "functions/alpine:latest"),
            ),
        ]
    }

    #[test]
    fn no_extra_namespaces_yields_nothing() {
        let config = CertifierConfig::default();
        assert!(namespaced_copies(&config, &cases()).is_empty());
    }

    #[test]
    fn copies_target_first_namespace() {
        let config = CertifierConfig {
            namespaces: vec!["dev".to_owned(), "staging".to_owned()],
            ..CertifierConfig::default()
        };
        let expanded = namespaced_copies(&config, &cases());

        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0].deployment.namespace, None);
        assert_eq!(expanded[2].name, "deploy env to dev");
        assert_eq!(expanded[3].deployment.namespace.as_deref(), Some("dev"));
        assert_eq!(
            expanded[3].target().path_segment().unwrap(),
            "stronghash.dev"
        );
    }
}
