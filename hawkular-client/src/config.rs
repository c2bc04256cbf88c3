use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings of the Hawkular metrics server.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URI of the server. The REST API is expected at `/hawkular/metrics` below this URI.
    ///
    /// Defaults to `http://localhost:8080`.
    pub uri: String,

    /// The tenant all metrics are stored in.
    ///
    /// Defaults to `default`.
    pub tenant: String,

    /// User name for basic authentication. Requires `password`.
    pub username: Option<String>,

    /// Password for basic authentication. Requires `username`.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Bearer token. Takes precedence over basic authentication.
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Additional headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Timeout of a single request in seconds.
    ///
    /// Defaults to `10` seconds.
    pub timeout: u64,
}

impl HttpConfig {
    /// Returns the timeout of a single request.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Returns the value of the `Authorization` header, if credentials are configured.
    pub fn authorization(&self) -> Option<String> {
        if let Some(ref token) = self.token {
            return Some(format!("Bearer {token}"));
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                let credentials =
                    data_encoding::BASE64.encode(format!("{username}:{password}").as_bytes());
                Some(format!("Basic {credentials}"))
            }
            _ => None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:8080".to_owned(),
            tenant: "default".to_owned(),
            username: None,
            password: None,
            token: None,
            headers: BTreeMap::new(),
            timeout: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_no_authorization() {
        let config = HttpConfig {
            username: Some("jdoe".to_owned()),
            ..Default::default()
        };

        assert_eq!(config.authorization(), None);
    }

    #[test]
    fn test_basic_authorization() {
        let config = HttpConfig {
            username: Some("jdoe".to_owned()),
            password: Some("secret".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            config.authorization().as_deref(),
            Some("Basic amRvZTpzZWNyZXQ=")
        );
    }

    #[test]
    fn test_bearer_precedence() {
        let config = HttpConfig {
            username: Some("jdoe".to_owned()),
            password: Some("secret".to_owned()),
            token: Some("abc123".to_owned()),
            ..Default::default()
        };

        assert_eq!(config.authorization().as_deref(), Some("Bearer abc123"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let config = HttpConfig {
            password: Some("secret".to_owned()),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
