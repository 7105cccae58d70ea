//! CLI-side client for the loopback control surface.

use super::state::{ShareStatus, StatusPatch};
use anyhow::{Context, Result};

pub struct ControlClient {
    base: String,
    http: reqwest::Client,
}

impl ControlClient {
    pub fn new(control_port: u16) -> Self {
        Self {
            base: format!("http://127.0.0.1:{control_port}"),
            http: reqwest::Client::new(),
        }
    }

    pub async fn status(&self) -> Result<ShareStatus> {
        let response = self
            .http
            .get(format!("{}/control/status", self.base))
            .send()
            .await
            .context("Control plane not reachable (is `lanshare run` active?)")?;
        Ok(response.json().await?)
    }

    pub async fn set_status(&self, patch: &StatusPatch) -> Result<ShareStatus> {
        let response = self
            .http
            .post(format!("{}/control/status", self.base))
            .json(patch)
            .send()
            .await
            .context("Control plane not reachable (is `lanshare run` active?)")?;
        Ok(response.json().await?)
    }

    pub async fn accept_warning(&self) -> Result<ShareStatus> {
        let response = self
            .http
            .post(format!("{}/control/accept-warning", self.base))
            .send()
            .await
            .context("Control plane not reachable (is `lanshare run` active?)")?;
        Ok(response.json().await?)
    }
}
