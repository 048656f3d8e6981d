use std::{collections::HashMap, sync::Arc};

use tokio::sync::OnceCell;
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    adapters::{self, swift::SwiftConnector},
    model::{
        config::{SwiftSettings, ValidationPolicy},
        error::BucketResult,
        file::FileRef,
        object::{AuthDescriptor, StorageObject},
    },
    util,
};

/// What `get_file_size` reports for an object without a content length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SizeFallback {
    #[default]
    Zero,
    Absent,
}

/// A container in OpenStack Swift standing in for a local assets folder.
///
/// The session is created on first use and shared by every later call.
/// Concurrent first callers wait on a single authentication attempt and a
/// failed attempt leaves the cell empty for the next caller to retry.
pub struct SwiftBucket {
    pub(crate) connector: Arc<dyn adapters::Connector>,
    pub(crate) settings: SwiftSettings,
    pub(crate) local_root: String,
    pub(crate) size_fallback: SizeFallback,
    container: OnceCell<Arc<dyn adapters::Container>>,
}

impl SwiftBucket {
    pub fn new(
        connector: Arc<dyn adapters::Connector>,
        local_root: &str,
        settings: SwiftSettings,
    ) -> Self {
        Self {
            connector,
            settings,
            local_root: local_root.to_string(),
            size_fallback: SizeFallback::default(),
            container: OnceCell::new(),
        }
    }

    /// Validates `cfg` and wires up the HTTP connector. No network I/O happens
    /// until the first operation.
    pub fn from_config(
        local_root: &str,
        cfg: &HashMap<String, String>,
        policy: ValidationPolicy,
    ) -> BucketResult<Self> {
        let settings = SwiftSettings::from_map(cfg, policy)?;
        Self::from_settings(local_root, settings)
    }

    pub fn from_settings(local_root: &str, settings: SwiftSettings) -> BucketResult<Self> {
        let connector = SwiftConnector::new(&settings.timeouts)?;
        Ok(Self::new(Arc::new(connector), local_root, settings))
    }

    pub fn with_size_fallback(mut self, size_fallback: SizeFallback) -> Self {
        self.size_fallback = size_fallback;
        self
    }

    pub fn container_name(&self) -> &str {
        &self.settings.container
    }

    pub fn settings(&self) -> &SwiftSettings {
        &self.settings
    }

    pub async fn container(&self) -> BucketResult<Arc<dyn adapters::Container>> {
        self.container
            .get_or_try_init(|| {
                let span = span!(
                    Level::INFO,
                    "connect",
                    context = "connect",
                    container = %self.settings.container
                );

                let (settings, connector) = (&self.settings, &self.connector);

                async move {
                    info!("called");
                    let auth = AuthDescriptor::from(settings);

                    connector
                        .connect(&auth, &settings.container)
                        .await
                        .inspect_err(|err| error!(error_message=%err, error_group="connect"))
                }
                .instrument(span)
            })
            .await
            .cloned()
    }

    pub(crate) fn remote_key(&self, file: FileRef<'_>) -> String {
        util::link::relative_link_for(&self.local_root, file.filename())
    }

    /// The mapped key for `file`, or `NotFound` when it cannot name an object.
    pub(crate) fn object_key(&self, file: FileRef<'_>) -> BucketResult<String> {
        let key = self.remote_key(file);
        util::link::validate_key(&key)?;
        Ok(key)
    }

    /// Looks up the object stored under the mapped key for `file`. A key that
    /// cannot name an object is absent without a session being opened.
    pub(crate) async fn object_for(
        &self,
        file: FileRef<'_>,
    ) -> BucketResult<Option<(Arc<dyn adapters::Container>, StorageObject)>> {
        let Ok(key) = self.object_key(file) else {
            debug!(filename = file.filename(), "unaddressable key");
            return Ok(None);
        };

        let container = self.container().await?;
        let object = container.get_object(&key).await?;

        Ok(object.map(|object| (container, object)))
    }
}

#[cfg(test)]
pub(crate) fn fixture(local_root: &str) -> (Arc<adapters::mock::MockConnector>, SwiftBucket) {
    fixture_with(local_root, adapters::mock::MockConnector::new())
}

#[cfg(test)]
pub(crate) fn fixture_with(
    local_root: &str,
    connector: adapters::mock::MockConnector,
) -> (Arc<adapters::mock::MockConnector>, SwiftBucket) {
    use crate::model::config;

    let cfg = [
        (config::CONTAINER, "assets"),
        (config::REGION, "RegionOne"),
        (config::USERNAME, "u"),
        (config::API_KEY, "k"),
        (config::PROJECT_NAME, "p"),
        (config::AUTH_URL, "https://auth.example/v3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect::<HashMap<_, _>>();

    let settings = SwiftSettings::from_map(&cfg, ValidationPolicy::Strict)
        .expect("fixture config must be valid");
    let connector = Arc::new(connector);
    let bucket = SwiftBucket::new(connector.clone(), local_root, settings);

    (connector, bucket)
}
