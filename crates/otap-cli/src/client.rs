//! Control RPC client for `otapd`.
//!
//! Every call mints a fresh credential proof from the shared secret and
//! posts a named method to the server's `/rpc` endpoint. Error-shaped
//! responses surface as plain errors for the terminal.

use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;
use serde_json::{Value, json};

use otap_crypto::Prover;

/// One registry row as returned by `show` and `find`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRow {
    pub imei: String,
    pub custid: String,
    pub tid: Option<String>,
    pub reported: Option<String>,
    pub deliver: Option<String>,
    pub block: bool,
}

pub struct ControlClient {
    http: reqwest::Client,
    base: String,
    prover: Prover,
}

impl ControlClient {
    pub fn new(url: &str, secret: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: url.trim_end_matches('/').to_string(),
            prover: Prover::new(secret)?,
        })
    }

    async fn call(&self, mut body: Value) -> anyhow::Result<Value> {
        body["auth"] = Value::String(self.prover.proof()?);

        let resp = self
            .http
            .post(format!("{}/rpc", self.base))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("cannot reach otapd at {}", self.base))?;

        let value: Value = resp.json().await.context("malformed server response")?;
        match value["status"].as_str() {
            Some("unauthorized") => bail!("unauthorized: check OTC_KEY"),
            Some("error") => bail!(
                "{}",
                value["message"].as_str().unwrap_or("unknown server error")
            ),
            _ => Ok(value),
        }
    }

    fn devices_from(value: &Value) -> anyhow::Result<Vec<DeviceRow>> {
        serde_json::from_value(value["devices"].clone()).context("malformed device list")
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.call(json!({"method": "ping"})).await.map(|_| ())
    }

    pub async fn jars(&self) -> anyhow::Result<Vec<String>> {
        let value = self.call(json!({"method": "jars"})).await?;
        serde_json::from_value(value["versions"].clone()).context("malformed version list")
    }

    pub async fn show(&self, imei: Option<&str>) -> anyhow::Result<Vec<DeviceRow>> {
        let value = self.call(json!({"method": "show", "imei": imei})).await?;
        Self::devices_from(&value)
    }

    pub async fn find(&self, tid: &str) -> anyhow::Result<Vec<DeviceRow>> {
        let value = self.call(json!({"method": "find", "tid": tid})).await?;
        Self::devices_from(&value)
    }

    pub async fn add(&self, imei: &str, custid: &str, tid: &str) -> anyhow::Result<()> {
        self.call(json!({"method": "add", "imei": imei, "custid": custid, "tid": tid}))
            .await
            .map(|_| ())
    }

    /// Returns the resolved version the server pinned for the device.
    pub async fn deliver(&self, imei: &str, version: &str) -> anyhow::Result<String> {
        let value = self
            .call(json!({"method": "deliver", "imei": imei, "version": version}))
            .await?;
        Ok(value["version"].as_str().unwrap_or(version).to_string())
    }

    /// Returns the number of devices updated.
    pub async fn block(&self, imei: &str, block: bool) -> anyhow::Result<u64> {
        let value = self
            .call(json!({"method": "block", "imei": imei, "block": block}))
            .await?;
        Ok(value["updated"].as_u64().unwrap_or(0))
    }

    pub async fn purge(&self, version: &str) -> anyhow::Result<()> {
        self.call(json!({"method": "purge", "version": version}))
            .await
            .map(|_| ())
    }

    pub async fn config(&self, custid: &str) -> anyhow::Result<Vec<String>> {
        let value = self.call(json!({"method": "config", "custid": custid})).await?;
        serde_json::from_value(value["lines"].clone()).context("malformed config lines")
    }

    /// Upload a firmware JAR through the multipart endpoint.
    pub async fn upload(&self, file: &Path, overwrite: bool) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("cannot read {}", file.display()))?;
        let filename = file
            .file_name()
            .map_or_else(|| "upload.jar".to_string(), |n| n.to_string_lossy().into_owned());

        let form = reqwest::multipart::Form::new()
            .text("auth", self.prover.proof()?)
            .text("overwrite", if overwrite { "1" } else { "0" })
            .part(
                "jar",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        let resp = self
            .http
            .post(format!("{}/up", self.base))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("cannot reach otapd at {}", self.base))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("upload rejected ({status}): {}", text.trim());
        }
        Ok(text.trim().to_string())
    }
}
