use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::gateway::{
    GatewayError, MobileMoneyGateway, ProviderCallback, TransferAccepted, TransferRequest,
    ensure_success, read_json, require_signature, transport_error,
};
use crate::domain::value_objects::{
    enums::payment_methods::PaymentMethod,
    payments::{ProviderStatus, ProviderStatusReport},
};

const PROVIDER: PaymentMethod = PaymentMethod::MtnMomo;
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Clone)]
pub struct MtnMomoConfig {
    pub base_url: Url,
    pub subscription_key: String,
    pub api_user: String,
    pub api_key: String,
    /// `sandbox` or the production environment name assigned by MTN (e.g. `mtncameroon`).
    pub target_environment: String,
    pub callback_url: Option<String>,
    pub callback_secret: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Collection API client (request-to-pay).
pub struct MtnMomoClient {
    http: reqwest::Client,
    config: MtnMomoConfig,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestToPayStatus {
    status: Option<String>,
    reason: Option<Value>,
    external_id: Option<String>,
    reference_id: Option<String>,
}

impl MtnMomoClient {
    pub fn new(config: MtnMomoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let resp = self
            .http
            .post(self.endpoint("collection/token/"))
            .basic_auth(&self.config.api_user, Some(&self.config.api_key))
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "create access token").await?;

        let body = read_json(PROVIDER, resp).await?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|err| GatewayError::MalformedPayload(format!("mtn_momo token: {err}")))?;

        // Refresh a minute early so a token never expires mid-request.
        let lifetime = token.expires_in.unwrap_or(3600).saturating_sub(60).max(0);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        });

        debug!(expires_in = lifetime, "payments: mtn_momo access token refreshed");
        Ok(token.access_token)
    }
}

/// MTN reports `SUCCESSFUL`, `FAILED` (with a reason) or `PENDING`.
pub fn map_request_to_pay_status(status: Option<&str>, reason: Option<&Value>) -> ProviderStatus {
    let raw_status = status.unwrap_or_default().trim().to_ascii_uppercase();
    match raw_status.as_str() {
        "SUCCESSFUL" => ProviderStatus::Successful,
        "FAILED" | "REJECTED" | "TIMEOUT" => ProviderStatus::Failed {
            reason: reason.and_then(reason_text),
        },
        "PENDING" | "CREATED" | "ONGOING" => ProviderStatus::Pending,
        _ => ProviderStatus::Unknown { raw_status },
    }
}

fn reason_text(reason: &Value) -> Option<String> {
    match reason {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl MobileMoneyGateway for MtnMomoClient {
    fn provider(&self) -> PaymentMethod {
        PROVIDER
    }

    async fn reserve_reference(&self) -> Result<String, GatewayError> {
        // Request-to-pay references are chosen by the caller as a UUID v4.
        Ok(Uuid::new_v4().to_string())
    }

    async fn request_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferAccepted, GatewayError> {
        let access_token = self.access_token().await?;
        // The reference id doubles as externalId so callbacks can be matched either way.
        let reference_id = request.transaction_reference.clone();

        let body = json!({
            "amount": request.amount_minor.to_string(),
            "currency": request.currency,
            "externalId": reference_id,
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": request.phone_number,
            },
            "payerMessage": request.description,
            "payeeNote": request.external_reference,
        });

        let mut builder = self
            .http
            .post(self.endpoint("collection/v1_0/requesttopay"))
            .bearer_auth(access_token)
            .header("X-Reference-Id", &reference_id)
            .header("X-Target-Environment", &self.config.target_environment)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .json(&body);
        if let Some(callback_url) = self.config.callback_url.as_deref() {
            builder = builder.header("X-Callback-Url", callback_url);
        }

        let resp = builder
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "request to pay").await?;

        info!(
            payment_id = %request.payment_id,
            http_status = %resp.status(),
            "payments: mtn_momo request to pay accepted"
        );

        Ok(TransferAccepted {
            transaction_reference: reference_id.clone(),
            raw: json!({
                "reference_id": reference_id,
                "http_status": resp.status().as_u16(),
            }),
        })
    }

    async fn query_status(
        &self,
        transaction_reference: String,
    ) -> Result<ProviderStatusReport, GatewayError> {
        let access_token = self.access_token().await?;

        let resp = self
            .http
            .get(self.endpoint(&format!(
                "collection/v1_0/requesttopay/{transaction_reference}"
            )))
            .bearer_auth(access_token)
            .header("X-Target-Environment", &self.config.target_environment)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "request to pay status").await?;

        let raw = read_json(PROVIDER, resp).await?;
        let parsed: RequestToPayStatus = serde_json::from_value(raw.clone())
            .map_err(|err| GatewayError::MalformedPayload(format!("mtn_momo status: {err}")))?;

        Ok(ProviderStatusReport {
            status: map_request_to_pay_status(parsed.status.as_deref(), parsed.reason.as_ref()),
            raw,
        })
    }

    fn parse_callback(
        &self,
        payload: &[u8],
        signature: Option<String>,
    ) -> Result<ProviderCallback, GatewayError> {
        require_signature(&self.config.callback_secret, payload, signature)?;

        let raw: Value = serde_json::from_slice(payload)
            .map_err(|err| GatewayError::MalformedPayload(format!("mtn_momo callback: {err}")))?;
        let parsed: RequestToPayStatus = serde_json::from_value(raw.clone())
            .map_err(|err| GatewayError::MalformedPayload(format!("mtn_momo callback: {err}")))?;

        let reference = parsed
            .reference_id
            .or(parsed.external_id)
            .filter(|reference| !reference.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedPayload("mtn_momo callback has no reference".to_string())
            })?;

        Ok(ProviderCallback {
            reference,
            report: ProviderStatusReport {
                status: map_request_to_pay_status(
                    parsed.status.as_deref(),
                    parsed.reason.as_ref(),
                ),
                raw,
            },
        })
    }
}
