use std::{io, pin::Pin};

use bytes::Bytes;
use futures::{stream::BoxStream, Stream};
use url::Url;

use crate::model::config::{CredentialScheme, SwiftSettings};

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Upload bodies are also `Sync`, the HTTP client requires it.
pub type UploadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A blob inside the container, as reported by the object store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageObject {
    pub name: String,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
}

impl StorageObject {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Everything needed to authenticate against the identity service.
#[derive(Clone, Debug)]
pub struct AuthDescriptor {
    pub auth_url: Url,
    pub region: String,
    pub credentials: CredentialScheme,
}

impl From<&SwiftSettings> for AuthDescriptor {
    fn from(settings: &SwiftSettings) -> Self {
        Self {
            auth_url: settings.auth_url.clone(),
            region: settings.region.clone(),
            credentials: settings.credentials.clone(),
        }
    }
}
