use std::collections::BTreeMap;

use hawkular_reporter::{DataValue, MetricKind, Tags, Transport, TransportError};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::HttpConfig;
use crate::payload::data_payload;

/// Name of the header selecting the tenant.
pub const TENANT_HEADER: &str = "Hawkular-Tenant";

/// An error when creating an [`HttpTransport`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configured URI is malformed.
    #[error("invalid metrics server uri {uri:?}")]
    InvalidUri {
        /// The configured URI.
        uri: String,
        /// The parse error.
        #[source]
        source: url::ParseError,
    },
    /// The configured URI cannot have a path, such as `mailto:` URIs.
    #[error("metrics server uri {0:?} cannot be a base")]
    CannotBeABase(String),
    /// A configured header name is invalid.
    #[error("invalid header name {0:?}")]
    HeaderName(String),
    /// A configured header value is invalid.
    #[error("invalid value for header {0:?}")]
    HeaderValue(String),
    /// The HTTP client could not be created.
    #[error("could not create http client")]
    Build(#[from] reqwest::Error),
}

/// A [`Transport`] that sends data and tags to a Hawkular metrics server.
///
/// Requests are blocking and time out after the configured duration. Calls must not be made
/// from within an async context; use a blocking thread instead.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for the configured server.
    pub fn new(config: &HttpConfig) -> Result<Self, ClientError> {
        let base_url = base_url(&config.uri)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Returns the URL of the REST API, such as `http://localhost:8080/hawkular/metrics`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the URL for raw data points of the given kind.
    pub fn data_url(&self, kind: MetricKind) -> Url {
        self.url(&[kind.as_str(), "raw"])
    }

    /// Returns the URL for tags of a series.
    ///
    /// The name is percent-encoded as a single path segment.
    pub fn tags_url(&self, kind: MetricKind, full_name: &str) -> Url {
        self.url(&[kind.as_str(), full_name, "tags"])
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // The base URL is validated to have a path on construction.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }
}

impl Transport for HttpTransport {
    fn write_data(
        &self,
        kind: MetricKind,
        timestamp: u64,
        records: &BTreeMap<String, DataValue>,
    ) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&data_payload(timestamp, records))
            .map_err(|error| TransportError::Payload(Box::new(error)))?;

        let url = self.data_url(kind);
        hawkular_log::trace!(%url, size = records.len(), "sending data points");

        let response = self.client.post(url).body(body).send();
        check_response(response)
    }

    fn write_tags(
        &self,
        kind: MetricKind,
        full_name: &str,
        tags: &Tags,
    ) -> Result<(), TransportError> {
        let body =
            serde_json::to_vec(tags).map_err(|error| TransportError::Payload(Box::new(error)))?;

        let url = self.tags_url(kind, full_name);
        hawkular_log::trace!(%url, "sending tags");

        let response = self.client.put(url).body(body).send();
        check_response(response)
    }
}

fn base_url(uri: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(uri).map_err(|source| ClientError::InvalidUri {
        uri: uri.to_owned(),
        source,
    })?;

    url.path_segments_mut()
        .map_err(|()| ClientError::CannotBeABase(uri.to_owned()))?
        .pop_if_empty()
        .extend(["hawkular", "metrics"]);

    Ok(url)
}

fn default_headers(config: &HttpConfig) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("hawkular-tenant"),
        header_value(TENANT_HEADER, &config.tenant)?,
    );

    if let Some(authorization) = config.authorization() {
        let mut value = header_value(AUTHORIZATION.as_str(), &authorization)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::HeaderName(name.clone()))?;
        let value = header_value(name.as_str(), value)?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|_| ClientError::HeaderValue(name.to_owned()))
}

fn check_response(response: reqwest::Result<Response>) -> Result<(), TransportError> {
    let response = response.map_err(|error| TransportError::Request(Box::new(error)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }

    Ok(())
}
