use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy for the REST collaborator. Nothing here is fatal to
/// the console; callers surface these once and keep the local state.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Activity definition as served by `/assigned-activities/{user}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignedActivity {
    pub id: i64,
    pub activity_type: String,
    /// Daily production target. The backend is not strict about the type
    /// here, so anything non-numeric decodes to NaN and degrades to "N/A"
    /// in the cycle-time calculators.
    #[serde(deserialize_with = "lenient_f64", default = "f64_nan")]
    pub target_day: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct UserResponse {
    full_name: String,
}

/// Body of `POST /save-scan`. Field names match the backend contract.
#[derive(Debug, Clone, Serialize)]
pub struct ScanUpload<'a> {
    pub username: &'a str,
    pub login_time: String,
    pub target_day: f64,
    pub barcode: &'a str,
}

pub struct BackendClient {
    agent: ureq::Agent,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `/users/{user_id}`, returning the operator's display name.
    pub fn fetch_user_name(&self, user_id: &str) -> Result<String, BackendError> {
        let url = self.url(&format!("users/{user_id}"));
        let body = self.get(&url)?;
        parse_user_name(&body).map_err(|err| decode_error(&url, &err))
    }

    /// GET `/assigned-activities/{user_name}`, sorted by activity type for
    /// a stable selection list.
    pub fn fetch_assigned_activities(
        &self,
        user_name: &str,
    ) -> Result<Vec<AssignedActivity>, BackendError> {
        let url = self.url(&format!("assigned-activities/{user_name}"));
        let body = self.get(&url)?;
        let mut activities =
            parse_assigned_activities(&body).map_err(|err| decode_error(&url, &err))?;
        activities.sort_by(|a, b| a.activity_type.cmp(&b.activity_type));
        Ok(activities)
    }

    /// POST `/save-scan`. The response body is not consumed.
    pub fn save_scan(&self, upload: &ScanUpload<'_>) -> Result<(), BackendError> {
        let url = self.url("save-scan");
        self.agent
            .post(&url)
            .send_json(upload)
            .map_err(|err| request_error(&url, err))?;
        Ok(())
    }

    /// DELETE `/delete-barcode/{barcode}`. The response body is not
    /// consumed.
    pub fn delete_scan(&self, barcode: &str) -> Result<(), BackendError> {
        let url = self.url(&format!("delete-barcode/{barcode}"));
        self.agent
            .delete(&url)
            .call()
            .map_err(|err| request_error(&url, err))?;
        Ok(())
    }

    /// Reachability check: any HTTP response counts, only transport
    /// failures do not.
    pub fn probe(&self) -> Result<(), BackendError> {
        let url = self.url("");
        match self.agent.get(&url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(_, _)) => Ok(()),
            Err(other) => Err(BackendError::Transport {
                url,
                source: Box::new(other),
            }),
        }
    }

    fn get(&self, url: &str) -> Result<String, BackendError> {
        self.agent
            .get(url)
            .call()
            .map_err(|err| request_error(url, err))?
            .into_string()
            .map_err(|err| BackendError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn request_error(url: &str, err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, _) => BackendError::Status {
            url: url.to_string(),
            status,
        },
        other => BackendError::Transport {
            url: url.to_string(),
            source: Box::new(other),
        },
    }
}

fn decode_error(url: &str, err: &serde_json::Error) -> BackendError {
    BackendError::Decode {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

fn parse_user_name(body: &str) -> Result<String, serde_json::Error> {
    let parsed: UserResponse = serde_json::from_str(body)?;
    Ok(parsed.full_name)
}

fn parse_assigned_activities(body: &str) -> Result<Vec<AssignedActivity>, serde_json::Error> {
    serde_json::from_str(body)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn f64_nan() -> f64 {
    f64::NAN
}
