use crate::config::NetworkInstanceConfig;
use crate::error::{JourneySdkError, Result};
use crate::fhevm::instance::FheInstance;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A loaded relayer SDK module.
#[async_trait]
pub trait RelayerSdk: Send + Sync {
    /// One-time module initialisation (wasm, public key fetch).
    async fn init(&self) -> Result<()>;

    async fn create_instance(&self, config: &NetworkInstanceConfig) -> Result<Arc<dyn FheInstance>>;
}

/// Fetches a relayer SDK module from one source location.
#[async_trait]
pub trait SdkModuleLoader: Send + Sync {
    async fn load_module(&self, source: &str) -> std::result::Result<Arc<dyn RelayerSdk>, String>;
}

/// Module loader for builds with no relayer binding; only mock chains work.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRelayerSdk;

#[async_trait]
impl SdkModuleLoader for NoRelayerSdk {
    async fn load_module(&self, source: &str) -> std::result::Result<Arc<dyn RelayerSdk>, String> {
        Err(format!("No relayer SDK binding available for {}", source))
    }
}

type ModuleCell = Arc<OnceCell<Arc<dyn RelayerSdk>>>;

/// Loads the relayer SDK from an ordered list of sources.
///
/// Each source is fetched at most once at a time; a successful load is kept
/// for the life of the loader, a failed one can be retried.
pub struct RelayerSdkLoader {
    module_loader: Arc<dyn SdkModuleLoader>,
    sources: Vec<String>,
    modules: DashMap<String, ModuleCell>,
    fetches: AtomicUsize,
}

impl RelayerSdkLoader {
    pub fn new(module_loader: Arc<dyn SdkModuleLoader>, sources: Vec<String>) -> Self {
        Self {
            module_loader,
            sources,
            modules: DashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of module fetches actually started
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// First source that loads wins.
    pub async fn load(&self) -> Result<Arc<dyn RelayerSdk>> {
        if self.sources.is_empty() {
            return Err(JourneySdkError::InstanceLoad(
                "No relayer SDK source configured".to_string(),
            ));
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match self.load_source(source).await {
                Ok(sdk) => return Ok(sdk),
                Err(e) => {
                    warn!(source = %source, "Relayer SDK source failed: {}", e);
                    failures.push(format!("{}: {}", source, e));
                },
            }
        }

        Err(JourneySdkError::InstanceLoad(format!(
            "Failed to load relayer SDK ({})",
            failures.join("; ")
        )))
    }

    async fn load_source(&self, source: &str) -> std::result::Result<Arc<dyn RelayerSdk>, String> {
        let cell = self.modules.entry(source.to_string()).or_default().clone();
        cell.get_or_try_init(|| async {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            debug!(source = %source, "Loading relayer SDK");
            let sdk = self.module_loader.load_module(source).await?;
            info!(source = %source, "Relayer SDK loaded");
            Ok::<_, String>(sdk)
        })
        .await
        .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct NoopSdk;

    #[async_trait]
    impl RelayerSdk for NoopSdk {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn create_instance(
            &self,
            _config: &NetworkInstanceConfig,
        ) -> Result<Arc<dyn FheInstance>> {
            Err(JourneySdkError::InstanceLoad("unused".to_string()))
        }
    }

    struct FlakyLoader {
        broken: HashSet<String>,
    }

    #[async_trait]
    impl SdkModuleLoader for FlakyLoader {
        async fn load_module(
            &self,
            source: &str,
        ) -> std::result::Result<Arc<dyn RelayerSdk>, String> {
            if self.broken.contains(source) {
                Err(format!("Failed to load {}", source))
            } else {
                Ok(Arc::new(NoopSdk))
            }
        }
    }

    fn loader(broken: &[&str]) -> RelayerSdkLoader {
        RelayerSdkLoader::new(
            Arc::new(FlakyLoader {
                broken: broken.iter().map(|s| s.to_string()).collect(),
            }),
            vec!["local".to_string(), "cdn".to_string()],
        )
    }

    #[tokio::test]
    async fn test_primary_is_cached() {
        let loader = loader(&[]);
        loader.load().await.unwrap();
        loader.load().await.unwrap();
        assert_eq!(loader.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_source() {
        let loader = loader(&["local"]);
        assert!(loader.load().await.is_ok());
        assert_eq!(loader.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_both_sources_failing_is_a_load_error() {
        let loader = loader(&["local", "cdn"]);
        match loader.load().await {
            Err(JourneySdkError::InstanceLoad(message)) => {
                assert!(message.contains("local"));
                assert!(message.contains("cdn"));
            },
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[tokio::test]
    async fn test_without_binding_every_source_fails() {
        let loader = RelayerSdkLoader::new(Arc::new(NoRelayerSdk), vec!["cdn".to_string()]);
        assert!(matches!(
            loader.load().await,
            Err(JourneySdkError::InstanceLoad(_))
        ));
        // Failures are not cached
        assert!(loader.load().await.is_err());
        assert_eq!(loader.fetch_count(), 2);
    }
}
