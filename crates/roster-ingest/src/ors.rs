use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, header::AUTHORIZATION};
use route_core::{OracleError, RawPoint, RouteOracle, segment::LegRequest, to_oracle};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::IngestError;

pub const DEFAULT_ORS_URL: &str = "https://api.openrouteservice.org";
const DIRECTIONS: &str = "/v2/directions/driving-car/geojson";

/// Routing oracle backed by the openrouteservice directions API.
#[derive(Clone)]
pub struct OrsOracle {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: LineString,
}

#[derive(Deserialize)]
struct LineString {
    #[serde(default)]
    coordinates: Vec<RawPoint>,
}

impl OrsOracle {
    pub fn new(base: &str, api_key: String, timeout: Duration) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building routing client")?;
        Ok(Self {
            http,
            endpoint: format!("{}{DIRECTIONS}", base.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl RouteOracle for OrsOracle {
    async fn route(&self, request: &LegRequest) -> Result<Vec<RawPoint>, OracleError> {
        let body = DirectionsRequest {
            coordinates: [to_oracle(request.start), to_oracle(request.end)],
        };
        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.api_key)
            .json(&body)
            .send()
            .await
            .context("sending directions request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let collection: FeatureCollection = response
            .json()
            .await
            .context("decoding directions response")?;
        let coordinates = collection
            .features
            .into_iter()
            .next()
            .map(|feature| feature.geometry.coordinates)
            .unwrap_or_default();
        trace!(points = coordinates.len(), "directions received");
        Ok(coordinates)
    }
}
