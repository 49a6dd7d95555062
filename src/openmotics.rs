use std::future::Future;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{Credentials, OutputId};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway rejected '{action}': {message}")]
    Rejected { action: &'static str, message: String },
    #[error("Gateway login did not return a token")]
    NoToken,
    #[error("No gateway credentials configured")]
    NotConfigured,
}

/// Something that can switch a gateway output on or off.
pub trait OutputController {
    fn set_output(&self, output: OutputId, on: bool) -> impl Future<Output = Result<(), DeviceError>>;
}

/// A missing controller fails every command, which lets dry runs go without credentials.
impl<C: OutputController> OutputController for Option<C> {
    async fn set_output(&self, output: OutputId, on: bool) -> Result<(), DeviceError> {
        match self {
            Some(controller) => controller.set_output(output, on).await,
            None => Err(DeviceError::NotConfigured),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Client for the HTTP API of an OpenMotics gateway.
///
/// The session token is fetched on first use and kept for the lifetime of the client.
#[derive(Debug)]
pub struct OpenMoticsClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl OpenMoticsClient {
    pub fn new(http: reqwest::Client, credentials: &Credentials) -> Self {
        Self {
            http,
            base_url: gateway_url(&credentials.om_host),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            token: Mutex::new(None),
        }
    }

    async fn login(&self) -> Result<String, DeviceError> {
        log::debug!("Logging in to gateway {} as {}", self.base_url, self.username);
        let response = self
            .http
            .post(format!("{}/login", self.base_url))
            .query(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("accept_terms", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<GatewayResponse>()
            .await?;

        check_success("login", &response)?;
        response.token.ok_or(DeviceError::NoToken)
    }

    async fn token(&self) -> Result<String, DeviceError> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        let new_token = self.login().await?;
        *token = Some(new_token.clone());
        Ok(new_token)
    }

    async fn exec_action(&self, action: &'static str, params: &[(&str, String)]) -> Result<(), DeviceError> {
        let mut relogged = false;
        loop {
            let token = self.token().await?;
            let response = self
                .http
                .post(format!("{}/{}", self.base_url, action))
                .query(&[("token", token.as_str())])
                .query(params)
                .send()
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED && !relogged {
                log::debug!("Gateway session expired, logging in again");
                *self.token.lock().await = None;
                relogged = true;
                continue;
            }

            let response = response.error_for_status()?.json::<GatewayResponse>().await?;
            return check_success(action, &response);
        }
    }
}

impl OutputController for OpenMoticsClient {
    async fn set_output(&self, output: OutputId, on: bool) -> Result<(), DeviceError> {
        log::debug!("Setting output [{}] to {}", output, on);
        self.exec_action("set_output", &[("id", output.to_string()), ("is_on", on.to_string())])
            .await
    }
}

fn check_success(action: &'static str, response: &GatewayResponse) -> Result<(), DeviceError> {
    if response.success {
        Ok(())
    } else {
        Err(DeviceError::Rejected {
            action,
            message: response.msg.clone().unwrap_or_else(|| "no reason given".to_string()),
        })
    }
}

fn gateway_url(om_host: &str) -> String {
    let host = om_host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
