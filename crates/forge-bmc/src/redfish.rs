//! Redfish adapter: HTTPS + Basic auth against `/redfish/v1/Systems/{id}`,
//! `/Managers/{id}`, `/UpdateService/...`, with `202 Accepted` + `Location`
//! task polling.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::BmcError;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_DURATION: Duration = Duration::from_secs(30 * 60);

pub struct RedfishConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Disabled in tests run against a mock Redfish server serving a
    /// self-signed certificate.
    pub tls_verify: bool,
}

pub struct RedfishClient {
    http: Client,
    config: RedfishConfig,
}

#[derive(Debug, Deserialize)]
struct TaskResource {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "TaskState")]
    task_state: String,
    #[serde(rename = "TaskStatus")]
    #[serde(default)]
    #[allow(dead_code)]
    task_status: Option<String>,
}

const TERMINAL_TASK_STATES: &[&str] = &["Completed", "Cancelled", "Exception", "Killed"];

impl RedfishClient {
    pub fn new(config: RedfishConfig) -> Result<Self, BmcError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|source| BmcError::RedfishRequest {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, BmcError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|source| BmcError::RedfishRequest { url: url.clone(), source })?;
        response
            .json::<Value>()
            .await
            .map_err(|source| BmcError::RedfishRequest { url, source })
    }

    pub async fn get_system(&self, system_id: &str) -> Result<Value, BmcError> {
        self.get_json(&format!("/redfish/v1/Systems/{system_id}")).await
    }

    pub async fn get_manager(&self, manager_id: &str) -> Result<Value, BmcError> {
        self.get_json(&format!("/redfish/v1/Managers/{manager_id}")).await
    }

    pub async fn firmware_inventory(&self) -> Result<Value, BmcError> {
        self.get_json("/redfish/v1/UpdateService/FirmwareInventory").await
    }

    /// `GET /UpdateService/FirmwareInventory/{component_id}`: one
    /// inventory member's own resource, carrying its current `Version`.
    pub async fn firmware_inventory_member(&self, component_id: &str) -> Result<Value, BmcError> {
        self.get_json(&format!("/redfish/v1/UpdateService/FirmwareInventory/{component_id}")).await
    }

    /// Issues `POST /redfish/v1/UpdateService/Actions/SimpleUpdate` and, on
    /// `202 Accepted`, polls the returned task to completion.
    pub async fn simple_update(&self, image_uri: &str) -> Result<(), BmcError> {
        self.post_and_track_task(
            "/redfish/v1/UpdateService/Actions/SimpleUpdate",
            serde_json::json!({ "ImageURI": image_uri }),
        )
        .await
    }

    /// `PATCH /redfish/v1/Systems/{id}/Bios/Settings`: stages pending BIOS
    /// attribute changes, tracked by a job applied on next reboot.
    pub async fn patch_bios_settings(&self, system_id: &str, body: Value) -> Result<(), BmcError> {
        self.patch_and_track_task(&format!("/redfish/v1/Systems/{system_id}/Bios/Settings"), body)
            .await
    }

    /// `POST /redfish/v1/Systems/{id}/Actions/ComputerSystem.Reset`: a
    /// graceful BMC-mediated reboot, used to apply a staged BIOS settings
    /// job once it has been pushed.
    pub async fn reset_system(&self, system_id: &str) -> Result<(), BmcError> {
        self.post_and_track_task(
            &format!("/redfish/v1/Systems/{system_id}/Actions/ComputerSystem.Reset"),
            serde_json::json!({ "ResetType": "GracefulRestart" }),
        )
        .await
    }

    async fn patch_and_track_task(&self, path: &str, body: Value) -> Result<(), BmcError> {
        let url = self.url(path);
        let response = self
            .http
            .patch(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(|source| BmcError::RedfishRequest { url: url.clone(), source })?;
        self.track_task_response(url, response).await
    }

    async fn post_and_track_task(&self, path: &str, body: Value) -> Result<(), BmcError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(|source| BmcError::RedfishRequest { url: url.clone(), source })?;
        self.track_task_response(url, response).await
    }

    async fn track_task_response(&self, url: String, response: reqwest::Response) -> Result<(), BmcError> {
        if response.status() != StatusCode::ACCEPTED {
            return Ok(());
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body: Value = response
            .json()
            .await
            .map_err(|source| BmcError::RedfishRequest { url: url.clone(), source })?;

        let task_path = location.unwrap_or_else(|| {
            body.get("@odata.id")
                .and_then(Value::as_str)
                .unwrap_or("/redfish/v1/TaskService/Tasks/0")
                .to_string()
        });

        self.poll_task(&task_path).await
    }

    async fn poll_task(&self, task_path: &str) -> Result<(), BmcError> {
        let deadline = tokio::time::Instant::now() + MAX_POLL_DURATION;
        loop {
            let body = self.get_json(task_path).await?;
            let task: TaskResource = serde_json::from_value(body).map_err(|_| BmcError::Parse {
                field: "TaskState".to_string(),
            })?;

            if TERMINAL_TASK_STATES.contains(&task.task_state.as_str()) {
                return if task.task_state == "Completed" {
                    Ok(())
                } else {
                    Err(BmcError::RedfishTaskFailed {
                        task_id: task.id,
                        url: task_path.to_string(),
                        state: task.task_state,
                    })
                };
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(BmcError::RedfishTaskTimeout {
                    task_id: task.id,
                    elapsed: MAX_POLL_DURATION.into(),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_task_states_include_completed_and_exception() {
        assert!(TERMINAL_TASK_STATES.contains(&"Completed"));
        assert!(TERMINAL_TASK_STATES.contains(&"Exception"));
        assert!(!TERMINAL_TASK_STATES.contains(&"Running"));
    }

    #[test]
    fn builds_url_against_trimmed_base() {
        let config = RedfishConfig {
            base_url: "https://10.0.0.1/".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            tls_verify: false,
        };
        let client = RedfishClient::new(config).unwrap();
        assert_eq!(
            client.url("/redfish/v1/Systems/1"),
            "https://10.0.0.1/redfish/v1/Systems/1"
        );
    }
}
