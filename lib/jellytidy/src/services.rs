use std::collections::HashMap;
use std::sync::Arc;

use shared::system::SystemHealth;

use crate::error::{CatalogError, Result};
use crate::ssh::PlaylistFileCleaner;
use crate::traits::{CatalogApi, DiscoveryApi, PlaylistApi};

pub struct Services {
    catalog: Arc<dyn CatalogApi>,
    playlists: Arc<dyn PlaylistApi>,
    discovery: HashMap<String, Arc<dyn DiscoveryApi>>,
    default_discovery: Option<String>,
    file_cleaner: Option<PlaylistFileCleaner>,
}

impl Services {
    pub fn catalog(&self) -> &dyn CatalogApi {
        self.catalog.as_ref()
    }

    pub fn playlists(&self) -> &dyn PlaylistApi {
        self.playlists.as_ref()
    }

    pub fn discovery(&self, id: Option<&str>) -> Result<&dyn DiscoveryApi> {
        id.or(self.default_discovery.as_deref())
            .and_then(|key| self.discovery.get(key))
            .map(|d| d.as_ref())
            .ok_or(CatalogError::NotConfigured("discovery service"))
    }

    pub fn file_cleaner(&self) -> Result<&PlaylistFileCleaner> {
        self.file_cleaner
            .as_ref()
            .ok_or(CatalogError::NotConfigured("SSH access"))
    }

    pub fn list_discovery(&self) -> Vec<(&str, &str)> {
        self.discovery
            .values()
            .map(|d| (d.id(), d.name()))
            .collect()
    }

    pub async fn health(&self) -> SystemHealth {
        let discovery_online = match self.discovery(None) {
            Ok(discovery) => discovery.health_check().await,
            Err(_) => false,
        };
        let remote_shell_ready = match &self.file_cleaner {
            Some(cleaner) => cleaner.health_check().await,
            None => false,
        };
        SystemHealth {
            catalog_online: self.catalog.health_check().await,
            discovery_online,
            remote_shell_ready,
        }
    }
}

#[derive(Default)]
pub struct ServicesBuilder {
    catalog: Option<Arc<dyn CatalogApi>>,
    playlists: Option<Arc<dyn PlaylistApi>>,
    discovery: HashMap<String, Arc<dyn DiscoveryApi>>,
    default_discovery: Option<String>,
    file_cleaner: Option<PlaylistFileCleaner>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a catalog that also manages playlists.
    pub fn catalog<C>(mut self, catalog: C) -> Self
    where
        C: CatalogApi + PlaylistApi + 'static,
    {
        let catalog = Arc::new(catalog);
        self.catalog = Some(catalog.clone());
        self.playlists = Some(catalog);
        self
    }

    pub fn add_discovery(mut self, service: impl DiscoveryApi + 'static) -> Self {
        let id = service.id().to_string();
        if self.default_discovery.is_none() {
            self.default_discovery = Some(id.clone());
        }
        self.discovery.insert(id, Arc::new(service));
        self
    }

    pub fn file_cleaner(mut self, cleaner: Option<PlaylistFileCleaner>) -> Self {
        self.file_cleaner = cleaner;
        self
    }

    pub fn build(self) -> Result<Services> {
        let (Some(catalog), Some(playlists)) = (self.catalog, self.playlists) else {
            return Err(CatalogError::NotConfigured("catalog"));
        };
        Ok(Services {
            catalog,
            playlists,
            discovery: self.discovery,
            default_discovery: self.default_discovery,
            file_cleaner: self.file_cleaner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;

    #[test]
    fn catalog_is_required() {
        assert!(matches!(
            ServicesBuilder::new().build(),
            Err(CatalogError::NotConfigured("catalog"))
        ));
    }

    #[tokio::test]
    async fn optional_services_report_not_configured() {
        let services = ServicesBuilder::new()
            .catalog(MemoryCatalog::default())
            .build()
            .unwrap();

        assert_eq!(services.catalog().id(), "memory");
        assert!(services.discovery(None).is_err());
        assert!(services.file_cleaner().is_err());
        assert!(services.list_discovery().is_empty());

        let health = services.health().await;
        assert!(health.catalog_online);
        assert!(!health.discovery_online);
        assert!(!health.remote_shell_ready);
    }
}
