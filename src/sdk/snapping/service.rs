use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;

use super::error::SnapError;
use crate::sdk::geometry::LatLon;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully built provider call: endpoint plus query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
}

/// What a provider made of one chunk, in `(lat, lon)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedChunk {
    pub coords: Vec<LatLon>,
    /// `None` for providers that don't report a confidence score.
    pub confidence: Option<f64>,
}

/// Wire codec for one map-matching provider.
pub trait MatchService: Send + Sync {
    /// Builds the request for a chunk of `(lat, lon)` coordinates.
    fn build_request(&self, base_url: &str, coords: &[LatLon], api_key: Option<&str>) -> MatchRequest;

    /// Decodes a successful response body.
    fn parse_response(&self, body: &str) -> Result<MatchedChunk, SnapError>;
}

/// Sends a [`MatchRequest`] and returns the body of a successful response.
pub trait Transport: Send + Sync {
    fn get(&self, request: &MatchRequest) -> Result<String, SnapError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, request: &MatchRequest) -> Result<String, SnapError> {
        (**self).get(request)
    }
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, SnapError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &MatchRequest) -> Result<String, SnapError> {
        log::debug!("[PROVIDER] GET {}", request.url);

        let response = match self.client.get(&request.url).query(&request.query).send() {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Failed to send request. URL: {}\nError: {}", request.url, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            return Err(SnapError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }
        Ok(text)
    }
}
