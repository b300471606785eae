use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::gateway::{
    GatewayError, MobileMoneyGateway, ProviderCallback, TransferAccepted, TransferRequest,
    ensure_success, read_json, require_signature, transport_error,
};
use crate::domain::value_objects::{
    enums::payment_methods::PaymentMethod,
    payments::{ProviderStatus, ProviderStatusReport},
};

const PROVIDER: PaymentMethod = PaymentMethod::OrangeMoney;
const API_PREFIX: &str = "omcoreapis/1.0.2/mp";

#[derive(Debug, Clone)]
pub struct OrangeMoneyConfig {
    pub base_url: Url,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Value of the `X-AUTH-TOKEN` header issued with the merchant channel account.
    pub auth_token: String,
    pub channel_user_msisdn: String,
    pub channel_pin: String,
    pub notify_url: Option<String>,
    pub callback_secret: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Merchant payment client: `init` reserves a pay token, `pay` pushes the USSD prompt.
pub struct OrangeMoneyClient {
    http: reqwest::Client,
    config: OrangeMoneyConfig,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MerchantPaymentData {
    pay_token: Option<String>,
    status: Option<String>,
    inittxnmessage: Option<String>,
    confirmtxnmessage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<MerchantPaymentData>,
    message: Option<String>,
}

impl OrangeMoneyClient {
    pub fn new(config: OrangeMoneyConfig) -> Result<Self> {
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
            .post(self.endpoint("token"))
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "create access token").await?;

        let body = read_json(PROVIDER, resp).await?;
        let token: TokenResponse = serde_json::from_value(body).map_err(|err| {
            GatewayError::MalformedPayload(format!("orange_money token: {err}"))
        })?;

        let lifetime = token.expires_in.unwrap_or(3600).saturating_sub(60).max(0);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        });

        debug!(expires_in = lifetime, "payments: orange_money access token refreshed");
        Ok(token.access_token)
    }

    async fn init_pay_token(&self, access_token: &str) -> Result<String, GatewayError> {
        let resp = self
            .http
            .post(self.endpoint(&format!("{API_PREFIX}/init")))
            .bearer_auth(access_token)
            .header("X-AUTH-TOKEN", &self.config.auth_token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "init merchant payment").await?;

        let raw = read_json(PROVIDER, resp).await?;
        let envelope: Envelope = serde_json::from_value(raw).map_err(|err| {
            GatewayError::MalformedPayload(format!("orange_money init: {err}"))
        })?;

        envelope
            .data
            .and_then(|data| data.pay_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedPayload(format!(
                    "orange_money init returned no payToken ({})",
                    envelope.message.unwrap_or_default()
                ))
            })
    }
}

/// Orange spells success `SUCCESSFULL` on most channels; both spellings are accepted.
pub fn map_merchant_payment_status(status: Option<&str>, message: Option<&str>) -> ProviderStatus {
    let raw_status = status.unwrap_or_default().trim().to_ascii_uppercase();
    match raw_status.as_str() {
        "SUCCESSFULL" | "SUCCESSFUL" | "SUCCESS" => ProviderStatus::Successful,
        "FAILED" | "CANCELLED" | "EXPIRED" => ProviderStatus::Failed {
            reason: message
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string),
        },
        "PENDING" | "INITIATED" => ProviderStatus::Pending,
        _ => ProviderStatus::Unknown { raw_status },
    }
}

fn report_from(raw: Value, data: MerchantPaymentData) -> ProviderStatusReport {
    let message = data
        .confirmtxnmessage
        .as_deref()
        .or(data.inittxnmessage.as_deref());
    ProviderStatusReport {
        status: map_merchant_payment_status(data.status.as_deref(), message),
        raw,
    }
}

#[async_trait]
impl MobileMoneyGateway for OrangeMoneyClient {
    fn provider(&self) -> PaymentMethod {
        PROVIDER
    }

    async fn reserve_reference(&self) -> Result<String, GatewayError> {
        let access_token = self.access_token().await?;
        self.init_pay_token(&access_token).await
    }

    async fn request_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferAccepted, GatewayError> {
        let access_token = self.access_token().await?;
        let pay_token = request.transaction_reference.clone();

        // Orange expects the subscriber number without the country code.
        let subscriber_msisdn = request
            .phone_number
            .strip_prefix("237")
            .unwrap_or(&request.phone_number)
            .to_string();

        let body = json!({
            "notifUrl": self.config.notify_url.clone().unwrap_or_default(),
            "channelUserMsisdn": self.config.channel_user_msisdn,
            "amount": request.amount_minor.to_string(),
            "subscriberMsisdn": subscriber_msisdn,
            "pin": self.config.channel_pin,
            "orderId": request.payment_id.to_string(),
            "description": request.description,
            "payToken": pay_token,
        });

        let resp = self
            .http
            .post(self.endpoint(&format!("{API_PREFIX}/pay")))
            .bearer_auth(&access_token)
            .header("X-AUTH-TOKEN", &self.config.auth_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "merchant payment").await?;
        let raw = read_json(PROVIDER, resp).await?;

        let status = raw
            .get("data")
            .and_then(|data| data.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let ProviderStatus::Failed { reason } = map_merchant_payment_status(status.as_deref(), None)
        {
            warn!(
                payment_id = %request.payment_id,
                reason = ?reason,
                "payments: orange_money rejected merchant payment"
            );
            return Err(GatewayError::Rejected {
                provider: PROVIDER,
                status: 200,
                raw,
            });
        }

        info!(
            payment_id = %request.payment_id,
            provider_status = ?status,
            "payments: orange_money merchant payment pushed"
        );

        Ok(TransferAccepted {
            transaction_reference: pay_token,
            raw,
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
                "{API_PREFIX}/paymentstatus/{transaction_reference}"
            )))
            .bearer_auth(access_token)
            .header("X-AUTH-TOKEN", &self.config.auth_token)
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        let resp = ensure_success(PROVIDER, resp, "merchant payment status").await?;

        let raw = read_json(PROVIDER, resp).await?;
        let envelope: Envelope = serde_json::from_value(raw.clone()).map_err(|err| {
            GatewayError::MalformedPayload(format!("orange_money status: {err}"))
        })?;

        Ok(report_from(raw, envelope.data.unwrap_or_default()))
    }

    fn parse_callback(
        &self,
        payload: &[u8],
        signature: Option<String>,
    ) -> Result<ProviderCallback, GatewayError> {
        require_signature(&self.config.callback_secret, payload, signature)?;

        let raw: Value = serde_json::from_slice(payload).map_err(|err| {
            GatewayError::MalformedPayload(format!("orange_money callback: {err}"))
        })?;

        // Notifications arrive either flat or wrapped in `data`.
        let body = raw.get("data").cloned().unwrap_or_else(|| raw.clone());
        let data: MerchantPaymentData = serde_json::from_value(body).map_err(|err| {
            GatewayError::MalformedPayload(format!("orange_money callback: {err}"))
        })?;

        let reference = data
            .pay_token
            .clone()
            .filter(|reference| !reference.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedPayload(
                    "orange_money callback has no payToken".to_string(),
                )
            })?;

        Ok(ProviderCallback {
            reference,
            report: report_from(raw, data),
        })
    }
}
