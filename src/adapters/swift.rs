use std::{
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{future::BoxFuture, TryStreamExt};
use reqwest::{
    header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED},
    Method, RequestBuilder, StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::{
    adapters,
    model::{
        config::{CredentialScheme, ProjectScope, Timeouts},
        error::{BucketError, BucketResult},
        object::{AuthDescriptor, ByteStream, StorageObject, UploadStream},
    },
    util,
};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const DESTINATION_HEADER: &str = "Destination";
const OBJECT_STORE_TYPE: &str = "object-store";
const PUBLIC_INTERFACE: &str = "public";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

/// Keystone v3 identity plus Swift object storage over HTTP.
///
/// The client itself only bounds connection setup. Token, metadata, delete and
/// copy calls get `timeouts.request` as a whole-call deadline, while uploads
/// and downloads are only cut off after `timeouts.request` without progress.
pub struct SwiftConnector {
    http: reqwest::Client,
    timeouts: Timeouts,
}

impl SwiftConnector {
    pub fn new(timeouts: &Timeouts) -> BucketResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|err| {
                BucketError::InvalidConfig(format!("failed to build http client, {}", err))
            })?;

        Ok(Self {
            http,
            timeouts: *timeouts,
        })
    }
}

impl adapters::Connector for SwiftConnector {
    fn connect<'a>(
        &'a self,
        auth: &'a AuthDescriptor,
        container: &'a str,
    ) -> BoxFuture<'a, BucketResult<Arc<dyn adapters::Container>>> {
        Box::pin(async move {
            let url = util::link::auth_tokens_url(&auth.auth_url)?;
            info!(auth_url=%url, region=%auth.region, "authenticating");

            let res = self
                .http
                .post(url)
                .timeout(self.timeouts.request)
                .json(&token_request(&auth.credentials))
                .send()
                .await
                .map_err(|err| {
                    BucketError::RemoteAuth(format!("failed to reach identity service, {}", err))
                })?;

            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(BucketError::RemoteAuth(format!("{}, {}", status, body)));
            }

            let token = res
                .headers()
                .get(SUBJECT_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    BucketError::RemoteAuth(format!("missing {} header", SUBJECT_TOKEN_HEADER))
                })?;

            let body: TokenResponse = res.json().await.map_err(|err| {
                BucketError::RemoteAuth(format!("invalid token response, {}", err))
            })?;

            let storage_url = select_endpoint(&body.token.catalog, &auth.region)?;
            debug!(storage_url=%storage_url, container=container, "resolved endpoint");

            let handle: Arc<dyn adapters::Container> = Arc::new(SwiftContainer {
                http: self.http.clone(),
                timeouts: self.timeouts,
                token,
                storage_url,
                name: container.to_string(),
            });
            Ok(handle)
        })
    }
}

pub struct SwiftContainer {
    http: reqwest::Client,
    timeouts: Timeouts,
    token: String,
    storage_url: Url,
    name: String,
}

impl SwiftContainer {
    fn request(&self, method: Method, key: &str) -> BucketResult<RequestBuilder> {
        let url = util::link::object_url(&self.storage_url, &self.name, key)?;

        Ok(self
            .http
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, &self.token))
    }

    /// A request that must complete, body included, within the request timeout.
    fn bounded_request(&self, method: Method, key: &str) -> BucketResult<RequestBuilder> {
        Ok(self.request(method, key)?.timeout(self.timeouts.request))
    }
}

impl adapters::Container for SwiftContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_object<'a>(
        &'a self,
        name: &'a str,
        body: UploadStream,
    ) -> BoxFuture<'a, BucketResult<StorageObject>> {
        Box::pin(async move {
            let sent = Arc::new(AtomicU64::new(0));
            let body = {
                let sent = sent.clone();
                body.inspect_ok(move |chunk| {
                    sent.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                })
            };

            let send = self
                .request(Method::PUT, name)?
                .body(reqwest::Body::wrap_stream(body))
                .send();

            let res = util::stream::until_stalled(send, &sent, self.timeouts.request)
                .await
                .ok_or_else(|| stalled_error("put_object", name, &self.timeouts))?
                .map_err(|err| remote_error("put_object", name, err))?;

            check_status(res.status(), "put_object", name)?;

            Ok(StorageObject {
                etag: header_string(res.headers(), ETAG.as_str()),
                last_modified: header_string(res.headers(), LAST_MODIFIED.as_str()),
                ..StorageObject::named(name)
            })
        })
    }

    fn get_object<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, BucketResult<Option<StorageObject>>> {
        Box::pin(async move {
            let res = self
                .bounded_request(Method::HEAD, name)?
                .send()
                .await
                .map_err(|err| remote_error("head_object", name, err))?;

            if res.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            check_status(res.status(), "head_object", name)?;

            Ok(Some(parse_object(name, res.headers())))
        })
    }

    fn delete_object<'a>(&'a self, object: &'a StorageObject) -> BoxFuture<'a, BucketResult<()>> {
        Box::pin(async move {
            let res = self
                .bounded_request(Method::DELETE, &object.name)?
                .send()
                .await
                .map_err(|err| remote_error("delete_object", &object.name, err))?;

            if res.status() == StatusCode::NOT_FOUND {
                return Err(BucketError::NotFound(object.name.clone()));
            }
            check_status(res.status(), "delete_object", &object.name)
        })
    }

    fn copy_object<'a>(
        &'a self,
        object: &'a StorageObject,
        destination: &'a str,
    ) -> BoxFuture<'a, BucketResult<()>> {
        Box::pin(async move {
            let method = Method::from_bytes(b"COPY")
                .map_err(|err| BucketError::Remote(err.to_string()))?;

            let destination = util::link::destination_header(destination)?;

            let res = self
                .bounded_request(method, &object.name)?
                .header(DESTINATION_HEADER, destination)
                .send()
                .await
                .map_err(|err| remote_error("copy_object", &object.name, err))?;

            if res.status() == StatusCode::NOT_FOUND {
                return Err(BucketError::NotFound(object.name.clone()));
            }
            check_status(res.status(), "copy_object", &object.name)
        })
    }

    fn download<'a>(
        &'a self,
        object: &'a StorageObject,
    ) -> BoxFuture<'a, BucketResult<Option<ByteStream>>> {
        Box::pin(async move {
            let send = self.request(Method::GET, &object.name)?.send();

            let res = tokio::time::timeout(self.timeouts.request, send)
                .await
                .map_err(|_| stalled_error("download_object", &object.name, &self.timeouts))?
                .map_err(|err| remote_error("download_object", &object.name, err))?;

            if res.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            check_status(res.status(), "download_object", &object.name)?;

            let body = res
                .bytes_stream()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
            Ok(Some(util::stream::idle_timeout(body, self.timeouts.request)))
        })
    }

    fn public_uri(&self, object: &StorageObject) -> BucketResult<Url> {
        util::link::object_url(&self.storage_url, &self.name, &object.name)
    }
}

fn token_request(credentials: &CredentialScheme) -> serde_json::Value {
    match credentials {
        CredentialScheme::Password {
            username,
            api_key,
            user_domain_id,
            project,
        } => {
            let mut auth = json!({
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": username,
                            "password": api_key,
                            "domain": { "id": user_domain_id },
                        },
                    },
                },
            });

            if let Some(project) = project {
                let project = match project {
                    ProjectScope::Name { name, domain_id } => json!({
                        "name": name,
                        "domain": { "id": domain_id },
                    }),
                    ProjectScope::Id(id) => json!({ "id": id }),
                };
                auth["scope"] = json!({ "project": project });
            }

            json!({ "auth": auth })
        }
        CredentialScheme::ApplicationCredential { id, secret } => json!({
            "auth": {
                "identity": {
                    "methods": ["application_credential"],
                    "application_credential": { "id": id, "secret": secret },
                },
            },
        }),
    }
}

fn select_endpoint(catalog: &[CatalogEntry], region: &str) -> BucketResult<Url> {
    let endpoint = catalog
        .iter()
        .filter(|entry| entry.kind == OBJECT_STORE_TYPE)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| {
            endpoint.interface == PUBLIC_INTERFACE
                && (endpoint.region.as_deref() == Some(region)
                    || endpoint.region_id.as_deref() == Some(region))
        })
        .ok_or_else(|| {
            BucketError::Remote(format!(
                "no {} {} endpoint in region: {}",
                PUBLIC_INTERFACE, OBJECT_STORE_TYPE, region
            ))
        })?;

    Url::parse(&endpoint.url).map_err(|err| {
        BucketError::Remote(format!("invalid endpoint url: {}, {}", endpoint.url, err))
    })
}

fn parse_object(name: &str, headers: &HeaderMap) -> StorageObject {
    StorageObject {
        content_length: header_string(headers, CONTENT_LENGTH.as_str())
            .and_then(|value| value.parse().ok()),
        etag: header_string(headers, ETAG.as_str()),
        content_type: header_string(headers, CONTENT_TYPE.as_str()),
        last_modified: header_string(headers, LAST_MODIFIED.as_str()),
        ..StorageObject::named(name)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_matches('"').to_string())
}

fn check_status(status: StatusCode, op: &str, key: &str) -> BucketResult<()> {
    if status.is_success() {
        return Ok(());
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(BucketError::RemoteAuth(format!(
            "token rejected on {}: {}",
            op, key
        )));
    }

    Err(BucketError::Remote(format!(
        "failed to {}: {}, {}",
        op, key, status
    )))
}

fn remote_error(op: &str, key: &str, err: reqwest::Error) -> BucketError {
    BucketError::Remote(format!("failed to {}: {}, {}", op, key, err))
}

fn stalled_error(op: &str, key: &str, timeouts: &Timeouts) -> BucketError {
    BucketError::Remote(format!(
        "failed to {}: {}, no progress for {:?}",
        op, key, timeouts.request
    ))
}
