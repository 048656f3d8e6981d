use std::sync::Arc;

use futures::future::BoxFuture;
use url::Url;

use crate::model::{
    error::BucketResult,
    object::{AuthDescriptor, ByteStream, StorageObject, UploadStream},
};

#[cfg(test)]
pub mod mock;
pub mod swift;

/// Authenticates against the identity service and hands back a container
/// handle scoped to the resulting session.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        auth: &'a AuthDescriptor,
        container: &'a str,
    ) -> BoxFuture<'a, BucketResult<Arc<dyn Container>>>;
}

pub trait Container: Send + Sync {
    fn name(&self) -> &str;

    fn create_object<'a>(
        &'a self,
        name: &'a str,
        body: UploadStream,
    ) -> BoxFuture<'a, BucketResult<StorageObject>>;

    /// Fetches object metadata, `None` when the object does not exist.
    fn get_object<'a>(&'a self, name: &'a str)
        -> BoxFuture<'a, BucketResult<Option<StorageObject>>>;

    fn delete_object<'a>(&'a self, object: &'a StorageObject) -> BoxFuture<'a, BucketResult<()>>;

    /// Server-side copy, `destination` is `container/key`.
    fn copy_object<'a>(
        &'a self,
        object: &'a StorageObject,
        destination: &'a str,
    ) -> BoxFuture<'a, BucketResult<()>>;

    fn download<'a>(
        &'a self,
        object: &'a StorageObject,
    ) -> BoxFuture<'a, BucketResult<Option<ByteStream>>>;

    fn public_uri(&self, object: &StorageObject) -> BucketResult<Url>;
}
