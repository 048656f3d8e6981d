use futures::future::BoxFuture;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, span, warn, Instrument, Level};
use url::Url;

use crate::{
    bucket::{SizeFallback, SwiftBucket},
    model::{
        error::{BucketError, BucketResult},
        file::{FileRecord, FileRef},
        object::{StorageObject, UploadStream},
    },
    util,
};

/// File operations the asset manager performs against a remote bucket.
///
/// Read-style accessors return `Ok(None)` for a missing object so callers
/// probing for optional derived files (thumbnails, resampled images) can skip
/// error handling. Mutating operations report `BucketError::NotFound`.
pub trait CloudBucket: Send + Sync {
    /// Object key for a site-relative filename.
    fn relative_link_for(&self, file: FileRef<'_>) -> String;

    fn put<'a>(&'a self, file: &'a dyn FileRecord) -> BoxFuture<'a, BucketResult<StorageObject>>;

    /// Deletes the object named by the literal filename, without mapping it
    /// through `relative_link_for`. Resampled copies of images are cleaned up
    /// by the names they were cached under.
    fn delete<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<()>>;

    /// `before` and `after` are site-relative filenames.
    fn rename<'a>(
        &'a self,
        file: &'a dyn FileRecord,
        before: &'a str,
        after: &'a str,
    ) -> BoxFuture<'a, BucketResult<()>>;

    fn get_contents<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<Vec<u8>>>>;

    fn get_file_size<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<u64>>>;

    fn get_public_url_for<'a>(&'a self, file: FileRef<'a>)
        -> BoxFuture<'a, BucketResult<Option<Url>>>;

    /// Public link, preferring the configured base URL over the storage URL.
    fn link_for<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<String>>>;
}

impl CloudBucket for SwiftBucket {
    fn relative_link_for(&self, file: FileRef<'_>) -> String {
        self.remote_key(file)
    }

    fn put<'a>(&'a self, file: &'a dyn FileRecord) -> BoxFuture<'a, BucketResult<StorageObject>> {
        let key = self.object_key(FileRef::Record(file));
        let span = span!(
            Level::INFO,
            "put",
            context = "put",
            key = %self.remote_key(FileRef::Record(file))
        );

        Box::pin(
            async move {
                info!(path=%file.full_path().display(), "called");

                let key =
                    key.inspect_err(|err| error!(error_message=%err, error_group="object_key"))?;

                let handle = tokio::fs::File::open(file.full_path())
                    .await
                    .map_err(|source| BucketError::LocalIo {
                        path: file.full_path().to_path_buf(),
                        source,
                    })
                    .inspect_err(|err| error!(error_message=%err, error_group="open_file"))?;
                let body: UploadStream = Box::pin(ReaderStream::new(handle));

                let container = self.container().await?;
                let object = container
                    .create_object(&key, body)
                    .await
                    .inspect_err(|err| error!(error_message=%err, error_group="put_object"))?;

                info!(etag=?object.etag, "stored");
                Ok(object)
            }
            .instrument(span),
        )
    }

    fn delete<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<()>> {
        let name = file.filename();
        let span = span!(Level::INFO, "delete", context = "delete", name = name);

        Box::pin(
            async move {
                info!("called");

                util::link::validate_key(name)
                    .inspect_err(|err| error!(error_message=%err, error_group="object_key"))?;

                let container = self.container().await?;
                let object = container
                    .get_object(name)
                    .await?
                    .ok_or_else(|| BucketError::NotFound(name.to_string()))
                    .inspect_err(|err| error!(error_message=%err, error_group="get_object"))?;

                container
                    .delete_object(&object)
                    .await
                    .inspect_err(|err| error!(error_message=%err, error_group="delete_object"))
            }
            .instrument(span),
        )
    }

    fn rename<'a>(
        &'a self,
        file: &'a dyn FileRecord,
        before: &'a str,
        after: &'a str,
    ) -> BoxFuture<'a, BucketResult<()>> {
        let span = span!(
            Level::INFO,
            "rename",
            context = "rename",
            file = file.filename(),
            source = %self.remote_key(FileRef::Name(before)),
            target = %self.remote_key(FileRef::Name(after))
        );

        Box::pin(
            async move {
                info!("called");

                let (source_key, target_key) = self
                    .object_key(FileRef::Name(before))
                    .and_then(|source| Ok((source, self.object_key(FileRef::Name(after))?)))
                    .inspect_err(|err| error!(error_message=%err, error_group="object_key"))?;

                let container = self.container().await?;
                let object = container
                    .get_object(&source_key)
                    .await?
                    .ok_or_else(|| BucketError::NotFound(source_key.clone()))
                    .inspect_err(|err| error!(error_message=%err, error_group="get_object"))?;

                let destination = format!("{}/{}", container.name(), target_key);
                container
                    .copy_object(&object, &destination)
                    .await
                    .inspect_err(|err| error!(error_message=%err, error_group="copy_object"))?;

                container.delete_object(&object).await.inspect_err(|err| {
                    warn!(destination=%destination, "copied but source remains");
                    error!(error_message=%err, error_group="delete_object");
                })
            }
            .instrument(span),
        )
    }

    fn get_contents<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<Vec<u8>>>> {
        let span = span!(Level::INFO, "get_contents", context = "get_contents");

        Box::pin(
            async move {
                let Some((container, object)) = self.object_for(file).await? else {
                    debug!(filename = file.filename(), "absent");
                    return Ok(None);
                };

                let Some(stream) = container.download(&object).await? else {
                    debug!(key=%object.name, "no content stream");
                    return Ok(None);
                };

                let bytes = util::stream::read_to_end(stream).await.map_err(|err| {
                    error!(error_message=%err, error_group="download_object");
                    BucketError::Remote(format!(
                        "failed to collect body: {}, {}",
                        object.name, err
                    ))
                })?;

                Ok(Some(bytes))
            }
            .instrument(span),
        )
    }

    fn get_file_size<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<u64>>> {
        let span = span!(Level::INFO, "get_file_size", context = "get_file_size");

        Box::pin(
            async move {
                let Some((_, object)) = self.object_for(file).await? else {
                    debug!(filename = file.filename(), "absent");
                    return Ok(None);
                };

                Ok(match (object.content_length, self.size_fallback) {
                    (Some(len), _) => Some(len),
                    (None, SizeFallback::Zero) => Some(0),
                    (None, SizeFallback::Absent) => None,
                })
            }
            .instrument(span),
        )
    }

    fn get_public_url_for<'a>(
        &'a self,
        file: FileRef<'a>,
    ) -> BoxFuture<'a, BucketResult<Option<Url>>> {
        let span = span!(Level::INFO, "get_public_url_for", context = "get_public_url_for");

        Box::pin(
            async move {
                self.object_for(file)
                    .await?
                    .map(|(container, object)| container.public_uri(&object))
                    .transpose()
            }
            .instrument(span),
        )
    }

    fn link_for<'a>(&'a self, file: FileRef<'a>) -> BoxFuture<'a, BucketResult<Option<String>>> {
        if let Some(base_url) = &self.settings.base_url {
            let link = self
                .object_key(file)
                .ok()
                .map(|key| util::link::join_base_url(base_url, &key));
            return Box::pin(std::future::ready(Ok(link)));
        }

        Box::pin(async move {
            let url = self.get_public_url_for(file).await?;
            Ok(url.map(String::from))
        })
    }
}
