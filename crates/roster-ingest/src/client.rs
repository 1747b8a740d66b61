use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use route_core::{Hospital, Incident, Roster, Unit};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::IngestError;

const AMBULANCES: &str = "/ambulances";
const INCIDENTS: &str = "/incidents";
const HOSPITALS: &str = "/hospitals";

/// Pulls the unit, incident and hospital lists from the dispatch backend.
#[derive(Clone, Debug)]
pub struct RosterClient {
    http: Client,
    base: String,
}

impl RosterClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building dispatch backend client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// One roster snapshot. The three lists are requested together and the
    /// snapshot fails as a whole if any of them does.
    pub async fn fetch(&self) -> Result<Roster, IngestError> {
        let (units, incidents, hospitals) = tokio::try_join!(
            self.get_list::<Unit>(AMBULANCES),
            self.get_list::<Incident>(INCIDENTS),
            self.get_list::<Hospital>(HOSPITALS),
        )?;
        debug!(
            units = units.len(),
            incidents = incidents.len(),
            hospitals = hospitals.len(),
            "roster fetched"
        );
        Ok(Roster {
            units,
            incidents,
            hospitals,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
    ) -> Result<Vec<T>, IngestError> {
        let response = self
            .http
            .get(format!("{}{endpoint}", self.base))
            .send()
            .await
            .map_err(|source| IngestError::Request { endpoint, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|source| IngestError::Decode { endpoint, source })
    }
}
