use std::{
    collections::HashMap,
    future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use bytes::Bytes;
use futures::{future::BoxFuture, stream, StreamExt};
use url::Url;

use crate::{
    adapters,
    model::{
        error::{BucketError, BucketResult},
        object::{AuthDescriptor, ByteStream, StorageObject, UploadStream},
    },
    util,
};

const MOCK_STORAGE_URL: &str = "https://swift.invalid/v1/AUTH_mock";

#[derive(Clone, Debug)]
struct MockBlob {
    data: Option<Bytes>,
    report_length: bool,
}

type Objects = Arc<Mutex<HashMap<String, MockBlob>>>;

/// Locks `mutex`, recovering the data if a panicking holder poisoned it.
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory object store standing in for Keystone and Swift.
pub struct MockConnector {
    objects: Objects,
    auth_attempts: AtomicUsize,
    rejections: AtomicUsize,
    latency: Duration,
    last_auth: Mutex<Option<AuthDescriptor>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            auth_attempts: AtomicUsize::new(0),
            rejections: AtomicUsize::new(0),
            latency: Duration::ZERO,
            last_auth: Mutex::new(None),
        }
    }

    /// Delays every authentication so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Rejects the next `count` authentication attempts.
    pub fn reject_auth(self, count: usize) -> Self {
        self.rejections.store(count, Ordering::SeqCst);
        self
    }

    pub fn auth_attempts(&self) -> usize {
        self.auth_attempts.load(Ordering::SeqCst)
    }

    pub fn last_auth(&self) -> Option<AuthDescriptor> {
        guard(&self.last_auth).clone()
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.store(key, Some(Bytes::copy_from_slice(data)), true);
    }

    pub fn insert_without_length(&self, key: &str, data: &[u8]) {
        self.store(key, Some(Bytes::copy_from_slice(data)), false);
    }

    /// An object whose metadata exists but whose content cannot be streamed.
    pub fn insert_without_content(&self, key: &str) {
        self.store(key, None, true);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(key)
            .and_then(|blob| blob.data.as_ref().map(|data| data.to_vec()))
    }

    fn store(&self, key: &str, data: Option<Bytes>, report_length: bool) {
        self.lock().insert(
            key.to_string(),
            MockBlob {
                data,
                report_length,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MockBlob>> {
        guard(&self.objects)
    }
}

impl adapters::Connector for MockConnector {
    fn connect<'a>(
        &'a self,
        auth: &'a AuthDescriptor,
        container: &'a str,
    ) -> BoxFuture<'a, BucketResult<Arc<dyn adapters::Container>>> {
        Box::pin(async move {
            self.auth_attempts.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let rejected = self
                .rejections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if rejected {
                return Err(BucketError::RemoteAuth(
                    "the request you have made requires authentication".to_string(),
                ));
            }

            *guard(&self.last_auth) = Some(auth.clone());

            let storage_url = Url::parse(MOCK_STORAGE_URL)
                .map_err(|err| BucketError::Remote(err.to_string()))?;

            let handle: Arc<dyn adapters::Container> = Arc::new(MockContainer {
                name: container.to_string(),
                storage_url,
                objects: self.objects.clone(),
            });
            Ok(handle)
        })
    }
}

pub struct MockContainer {
    name: String,
    storage_url: Url,
    objects: Objects,
}

impl MockContainer {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, MockBlob>> {
        guard(&self.objects)
    }

    fn copy_within(&self, object: &StorageObject, destination: &str) -> BucketResult<()> {
        let prefix = format!("{}/", self.name);
        let key = destination.strip_prefix(&prefix).ok_or_else(|| {
            BucketError::Remote(format!("copy across containers: {}", destination))
        })?;
        util::link::validate_key(key)?;

        let mut objects = self.lock();
        let blob = objects
            .get(&object.name)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(object.name.clone()))?;
        objects.insert(key.to_string(), blob);

        Ok(())
    }
}

impl adapters::Container for MockContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_object<'a>(
        &'a self,
        name: &'a str,
        body: UploadStream,
    ) -> BoxFuture<'a, BucketResult<StorageObject>> {
        Box::pin(async move {
            let data = util::stream::read_to_end(body)
                .await
                .map_err(|err| BucketError::Remote(format!("failed to read body: {}", err)))?;
            let content_length = data.len() as u64;

            self.lock().insert(
                name.to_string(),
                MockBlob {
                    data: Some(Bytes::from(data)),
                    report_length: true,
                },
            );

            Ok(StorageObject {
                content_length: Some(content_length),
                ..StorageObject::named(name)
            })
        })
    }

    fn get_object<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, BucketResult<Option<StorageObject>>> {
        let object = self.lock().get(name).map(|blob| StorageObject {
            content_length: match (&blob.data, blob.report_length) {
                (Some(data), true) => Some(data.len() as u64),
                (None, true) => Some(0),
                (_, false) => None,
            },
            ..StorageObject::named(name)
        });

        Box::pin(future::ready(Ok(object)))
    }

    fn delete_object<'a>(&'a self, object: &'a StorageObject) -> BoxFuture<'a, BucketResult<()>> {
        let res = match self.lock().remove(&object.name) {
            Some(_) => Ok(()),
            None => Err(BucketError::NotFound(object.name.clone())),
        };

        Box::pin(future::ready(res))
    }

    fn copy_object<'a>(
        &'a self,
        object: &'a StorageObject,
        destination: &'a str,
    ) -> BoxFuture<'a, BucketResult<()>> {
        let res = self.copy_within(object, destination);

        Box::pin(future::ready(res))
    }

    fn download<'a>(
        &'a self,
        object: &'a StorageObject,
    ) -> BoxFuture<'a, BucketResult<Option<ByteStream>>> {
        let body: Option<ByteStream> = self
            .lock()
            .get(&object.name)
            .and_then(|blob| blob.data.clone())
            .map(|data| stream::iter(vec![Ok(data)]).boxed());

        Box::pin(future::ready(Ok(body)))
    }

    fn public_uri(&self, object: &StorageObject) -> BucketResult<Url> {
        util::link::object_url(&self.storage_url, &self.name, &object.name)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let connector = MockConnector::new();
        connector.insert("a.txt", b"a");

        let objects = connector.objects.clone();
        let _ = thread::spawn(move || {
            let _held = objects.lock().unwrap();
            panic!("holder panicked");
        })
        .join();
        assert!(connector.objects.is_poisoned());

        assert!(connector.contains("a.txt"));
        connector.insert("b.txt", b"b");
        assert_eq!(connector.object("b.txt"), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_copy_rejects_unaddressable_destination() {
        let connector = MockConnector::new();
        connector.insert("a.txt", b"a");
        let auth = AuthDescriptor {
            auth_url: Url::parse("https://auth.example/v3").unwrap(),
            region: "RegionOne".to_string(),
            credentials: crate::model::config::CredentialScheme::ApplicationCredential {
                id: "id".to_string(),
                secret: "s".to_string(),
            },
        };

        let container = adapters::Connector::connect(&connector, &auth, "assets").await.unwrap();
        let object = StorageObject::named("a.txt");

        assert!(container.copy_object(&object, "assets/../b.txt").await.unwrap_err().is_not_found());
        assert!(container.copy_object(&object, "assets/b.txt").await.is_ok());
        assert!(connector.contains("b.txt"));
    }
}
