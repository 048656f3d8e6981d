use url::Url;

use crate::model::error::{BucketError, BucketResult};

/// Maps a site-relative filename to its object key by dropping the local
/// root component and any surrounding slashes.
pub fn relative_link_for(local_root: &str, filename: &str) -> String {
    let root = local_root.trim_matches('/');
    let name = filename.trim_start_matches('/');

    let stripped = match name.strip_prefix(root) {
        Some(rest) if !root.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => name,
    };

    stripped.trim_matches('/').to_string()
}

pub fn join_base_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Rejects keys that cannot address an object: the empty key and keys with a
/// `.` or `..` segment, which URL parsing folds into a different path even when
/// percent-encoded.
pub fn validate_key(key: &str) -> BucketResult<()> {
    if key.is_empty() || key.split('/').any(|segment| matches!(segment, "." | "..")) {
        return Err(BucketError::NotFound(key.to_string()));
    }

    Ok(())
}

/// `{storage_url}/{container}/{key}` with every path segment percent-encoded.
pub fn object_url(storage_url: &Url, container: &str, key: &str) -> BucketResult<Url> {
    validate_key(key)?;

    let mut url = storage_url.clone();
    url.path_segments_mut()
        .map_err(|_| BucketError::Remote(format!("invalid storage url: {}", storage_url)))?
        .pop_if_empty()
        .push(container)
        .extend(key.split('/'));

    Ok(url)
}

/// Value for the `Destination` header of a server-side copy: `container/key`
/// with each segment encoded the same way as the request path.
pub fn destination_header(destination: &str) -> BucketResult<String> {
    let (container, key) = destination
        .split_once('/')
        .filter(|(container, _)| !container.is_empty())
        .ok_or_else(|| BucketError::NotFound(destination.to_string()))?;
    validate_key(key)?;

    let mut url = Url::parse("http://destination.invalid/")
        .map_err(|err| BucketError::Remote(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| BucketError::Remote(format!("invalid destination: {}", destination)))?
        .clear()
        .push(container)
        .extend(key.split('/'));

    Ok(url.path().trim_start_matches('/').to_string())
}

pub fn auth_tokens_url(auth_url: &Url) -> BucketResult<Url> {
    let mut url = auth_url.clone();
    url.path_segments_mut()
        .map_err(|_| BucketError::InvalidConfig(format!("invalid auth url: {}", auth_url)))?
        .pop_if_empty()
        .push("auth")
        .push("tokens");

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_link_for() {
        let cases = vec![
            ("assets", "assets/a.txt", "a.txt"),
            ("assets", "/assets/images/logo.png", "images/logo.png"),
            ("/assets/", "assets/images/", "images"),
            ("assets", "assetsfolder/a.txt", "assetsfolder/a.txt"),
            ("assets", "other/a.txt", "other/a.txt"),
            ("assets", "assets", ""),
            ("", "/a/b.txt", "a/b.txt"),
        ];

        for (root, filename, expected) in cases {
            let result = relative_link_for(root, filename);
            assert_eq!(result, expected, "failed for case: {}", filename);
        }
    }

    #[test]
    fn test_join_base_url() {
        let cases = vec![
            ("https://cdn.example", "a.txt", "https://cdn.example/a.txt"),
            ("https://cdn.example/", "x/a.txt", "https://cdn.example/x/a.txt"),
        ];

        for (base, key, expected) in cases {
            assert_eq!(join_base_url(base, key), expected, "failed for case: {}", base);
        }
    }

    #[test]
    fn test_object_url() {
        let cases = vec![
            (
                "https://swift.example/v1/AUTH_p",
                "img/logo.png",
                "https://swift.example/v1/AUTH_p/assets/img/logo.png",
            ),
            (
                "https://swift.example/v1/AUTH_p/",
                "a b.txt",
                "https://swift.example/v1/AUTH_p/assets/a%20b.txt",
            ),
        ];

        for (storage_url, key, expected) in cases {
            let base = Url::parse(storage_url).unwrap();
            let result = object_url(&base, "assets", key).unwrap();
            assert_eq!(result.as_str(), expected, "failed for case: {}", key);
        }
    }

    #[test]
    fn test_object_url_rejects_unaddressable_keys() {
        let base = Url::parse("https://swift.example/v1/AUTH_p").unwrap();

        for key in ["", ".", "..", "a/../x", "./a", "img/."] {
            let err = object_url(&base, "assets", key).err().unwrap();
            assert!(err.is_not_found(), "failed for case: {:?}", key);
        }
    }

    #[test]
    fn test_validate_key() {
        let cases = vec![
            ("a.txt", true),
            ("img/..logo.png", true),
            (".hidden", true),
            ("", false),
            ("..", false),
            ("a/./b", false),
        ];

        for (key, ok) in cases {
            assert_eq!(validate_key(key).is_ok(), ok, "failed for case: {:?}", key);
        }
    }

    #[test]
    fn test_destination_header() {
        let cases = vec![
            ("assets/b.txt", "assets/b.txt"),
            ("assets/img/café 100%.png", "assets/img/caf%C3%A9%20100%25.png"),
            ("assets/a?b#c.txt", "assets/a%3Fb%23c.txt"),
        ];

        for (destination, expected) in cases {
            let result = destination_header(destination).unwrap();
            assert_eq!(result, expected, "failed for case: {}", destination);
        }

        for destination in ["assets", "assets/", "/b.txt", "assets/../b.txt"] {
            assert!(destination_header(destination).is_err(), "failed for case: {}", destination);
        }
    }

    #[test]
    fn test_auth_tokens_url() {
        let cases = vec![
            ("https://auth.example/v3", "https://auth.example/v3/auth/tokens"),
            ("https://auth.example/v3/", "https://auth.example/v3/auth/tokens"),
        ];

        for (auth_url, expected) in cases {
            let result = auth_tokens_url(&Url::parse(auth_url).unwrap()).unwrap();
            assert_eq!(result.as_str(), expected, "failed for case: {}", auth_url);
        }
    }
}
