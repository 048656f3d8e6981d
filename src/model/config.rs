use std::{collections::HashMap, env, fmt, str::FromStr, time::Duration};

use url::Url;

use crate::model::error::{BucketError, BucketResult};

pub const CONTAINER: &str = "Container";
pub const REGION: &str = "Region";
pub const USERNAME: &str = "Username";
pub const API_KEY: &str = "ApiKey";
pub const PROJECT_NAME: &str = "ProjectName";
pub const PROJECT_ID: &str = "ProjectID";
pub const USER_DOMAIN_ID: &str = "UserDomainId";
pub const PROJECT_DOMAIN_ID: &str = "ProjectDomainId";
pub const AUTH_URL: &str = "AuthURL";
pub const APPLICATION_CREDENTIAL_ID: &str = "ApplicationCredentialId";
pub const APPLICATION_CREDENTIAL_SECRET: &str = "ApplicationCredentialSecret";
pub const BASE_URL: &str = "BaseURL";
pub const CONNECT_TIMEOUT: &str = "ConnectTimeout";
pub const REQUEST_TIMEOUT: &str = "RequestTimeout";

pub const ALL_KEYS: [&str; 14] = [
    CONTAINER,
    REGION,
    USERNAME,
    API_KEY,
    PROJECT_NAME,
    PROJECT_ID,
    USER_DOMAIN_ID,
    PROJECT_DOMAIN_ID,
    AUTH_URL,
    APPLICATION_CREDENTIAL_ID,
    APPLICATION_CREDENTIAL_SECRET,
    BASE_URL,
    CONNECT_TIMEOUT,
    REQUEST_TIMEOUT,
];

pub const DEFAULT_DOMAIN_ID: &str = "default";

const ENV_PREFIX: &str = "SWIFT_";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Which credential rules apply when validating a configuration map.
///
/// `Strict` requires the full password set including a project name and
/// reports the first missing key. `Flexible` accepts either a password pair
/// or an application credential pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    #[default]
    Strict,
    Flexible,
}

impl FromStr for ValidationPolicy {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationPolicy::Strict),
            "flexible" => Ok(ValidationPolicy::Flexible),
            other => Err(BucketError::InvalidConfig(format!(
                "unknown validation policy: {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectScope {
    Name { name: String, domain_id: String },
    Id(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum CredentialScheme {
    Password {
        username: String,
        api_key: String,
        user_domain_id: String,
        project: Option<ProjectScope>,
    },
    ApplicationCredential {
        id: String,
        secret: String,
    },
}

// secrets stay out of logs
impl fmt::Debug for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialScheme::Password {
                username,
                user_domain_id,
                project,
                ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("api_key", &"***")
                .field("user_domain_id", user_domain_id)
                .field("project", project)
                .finish(),
            CredentialScheme::ApplicationCredential { id, .. } => f
                .debug_struct("ApplicationCredential")
                .field("id", id)
                .field("secret", &"***")
                .finish(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    /// Deadline for metadata calls, and the longest a transfer may go without
    /// moving any bytes.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Validated, immutable settings for one container.
#[derive(Clone, Debug)]
pub struct SwiftSettings {
    pub container: String,
    pub region: String,
    pub auth_url: Url,
    pub credentials: CredentialScheme,
    pub base_url: Option<String>,
    pub timeouts: Timeouts,
}

impl SwiftSettings {
    pub fn from_map(cfg: &HashMap<String, String>, policy: ValidationPolicy) -> BucketResult<Self> {
        match policy {
            ValidationPolicy::Strict => Self::from_strict(cfg),
            ValidationPolicy::Flexible => Self::from_flexible(cfg),
        }
    }

    /// Reads every known key from `SWIFT_`-prefixed variables, e.g. `AuthURL`
    /// from `SWIFT_AUTH_URL`.
    pub fn from_env(policy: ValidationPolicy) -> BucketResult<Self> {
        let cfg = ALL_KEYS
            .iter()
            .filter_map(|key| {
                env::var(env_var_name(key))
                    .ok()
                    .map(|value| (key.to_string(), value))
            })
            .collect::<HashMap<_, _>>();

        Self::from_map(&cfg, policy)
    }

    fn from_strict(cfg: &HashMap<String, String>) -> BucketResult<Self> {
        let container = require(cfg, CONTAINER)?;
        let region = require(cfg, REGION)?;
        let username = require(cfg, USERNAME)?;
        let api_key = require(cfg, API_KEY)?;
        let project_name = require(cfg, PROJECT_NAME)?;
        let auth_url = parse_auth_url(&require(cfg, AUTH_URL)?)?;

        Ok(Self {
            container,
            region,
            auth_url,
            credentials: CredentialScheme::Password {
                username,
                api_key,
                user_domain_id: domain_id(cfg, USER_DOMAIN_ID),
                project: Some(ProjectScope::Name {
                    name: project_name,
                    domain_id: domain_id(cfg, PROJECT_DOMAIN_ID),
                }),
            },
            base_url: lookup(cfg, BASE_URL).map(str::to_string),
            timeouts: parse_timeouts(cfg)?,
        })
    }

    fn from_flexible(cfg: &HashMap<String, String>) -> BucketResult<Self> {
        let container = require(cfg, CONTAINER)?;
        let region = require(cfg, REGION)?;
        let auth_url = parse_auth_url(&require(cfg, AUTH_URL)?)?;

        Ok(Self {
            container,
            region,
            auth_url,
            credentials: flexible_credentials(cfg)?,
            base_url: lookup(cfg, BASE_URL).map(str::to_string),
            timeouts: parse_timeouts(cfg)?,
        })
    }
}

// application credentials win when both sets are complete
fn flexible_credentials(cfg: &HashMap<String, String>) -> BucketResult<CredentialScheme> {
    if let (Some(id), Some(secret)) = (
        lookup(cfg, APPLICATION_CREDENTIAL_ID),
        lookup(cfg, APPLICATION_CREDENTIAL_SECRET),
    ) {
        return Ok(CredentialScheme::ApplicationCredential {
            id: id.to_string(),
            secret: secret.to_string(),
        });
    }

    if let (Some(username), Some(api_key)) = (lookup(cfg, USERNAME), lookup(cfg, API_KEY)) {
        let project = match (lookup(cfg, PROJECT_ID), lookup(cfg, PROJECT_NAME)) {
            (Some(id), _) => Some(ProjectScope::Id(id.to_string())),
            (None, Some(name)) => Some(ProjectScope::Name {
                name: name.to_string(),
                domain_id: domain_id(cfg, PROJECT_DOMAIN_ID),
            }),
            (None, None) => None,
        };

        return Ok(CredentialScheme::Password {
            username: username.to_string(),
            api_key: api_key.to_string(),
            user_domain_id: domain_id(cfg, USER_DOMAIN_ID),
            project,
        });
    }

    Err(BucketError::InvalidConfig(format!(
        "no complete credential set, expected {}/{} or {}/{}",
        USERNAME, API_KEY, APPLICATION_CREDENTIAL_ID, APPLICATION_CREDENTIAL_SECRET
    )))
}

fn lookup<'a>(cfg: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    cfg.get(key).map(String::as_str).filter(|value| !value.is_empty())
}

fn require(cfg: &HashMap<String, String>, key: &'static str) -> BucketResult<String> {
    lookup(cfg, key)
        .map(str::to_string)
        .ok_or(BucketError::MissingConfig(key))
}

fn domain_id(cfg: &HashMap<String, String>, key: &str) -> String {
    lookup(cfg, key).unwrap_or(DEFAULT_DOMAIN_ID).to_string()
}

fn parse_auth_url(raw: &str) -> BucketResult<Url> {
    Url::parse(raw)
        .map_err(|err| BucketError::InvalidConfig(format!("{}: {}, {}", AUTH_URL, raw, err)))
}

fn parse_timeouts(cfg: &HashMap<String, String>) -> BucketResult<Timeouts> {
    let defaults = Timeouts::default();

    Ok(Timeouts {
        connect: parse_seconds(cfg, CONNECT_TIMEOUT)?.unwrap_or(defaults.connect),
        request: parse_seconds(cfg, REQUEST_TIMEOUT)?.unwrap_or(defaults.request),
    })
}

fn parse_seconds(cfg: &HashMap<String, String>, key: &str) -> BucketResult<Option<Duration>> {
    let Some(raw) = lookup(cfg, key) else {
        return Ok(None);
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(BucketError::InvalidConfig(format!(
            "{} must be a positive number of seconds, got: {}",
            key, raw
        ))),
    }
}

pub fn env_var_name(key: &str) -> String {
    let mut name = String::from(ENV_PREFIX);
    let mut prev_lower = false;

    for c in key.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            name.push('_');
        }
        prev_lower = c.is_ascii_lowercase();
        name.push(c.to_ascii_uppercase());
    }

    name
}
