use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::payment_methods::PaymentMethod, payments::ProviderStatusReport,
};

/// Collection request sent to an operator on behalf of a pending payment.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub payment_id: Uuid,
    /// Reference obtained from `reserve_reference` and already stored on the payment.
    pub transaction_reference: String,
    pub external_reference: String,
    pub amount_minor: i64,
    pub currency: String,
    /// International form without `+`, e.g. `237677123456`.
    pub phone_number: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferAccepted {
    pub transaction_reference: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCallback {
    /// Same value as the payment's `transaction_reference`.
    pub reference: String,
    pub report: ProviderStatusReport,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: PaymentMethod,
        message: String,
    },
    #[error("{provider} rejected the request with status {status}")]
    Rejected {
        provider: PaymentMethod,
        status: u16,
        raw: Value,
    },
    #[error("callback signature is missing or invalid")]
    InvalidSignature,
    #[error("malformed provider payload: {0}")]
    MalformedPayload(String),
}

impl GatewayError {
    /// Payload worth persisting on the payment for later investigation.
    pub fn raw_payload(&self) -> Value {
        match self {
            GatewayError::Transport { provider, message } => json!({
                "provider": provider.as_str(),
                "transport_error": message,
            }),
            GatewayError::Rejected {
                provider,
                status,
                raw,
            } => json!({
                "provider": provider.as_str(),
                "http_status": status,
                "body": raw,
            }),
            GatewayError::InvalidSignature => Value::Null,
            GatewayError::MalformedPayload(message) => json!({ "malformed": message }),
        }
    }
}

#[automock]
#[async_trait]
pub trait MobileMoneyGateway {
    fn provider(&self) -> PaymentMethod;

    /// Reference the operator will use for the next transfer. Called before the
    /// payment is persisted so a pending payment always carries it.
    async fn reserve_reference(&self) -> Result<String, GatewayError>;

    async fn request_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferAccepted, GatewayError>;

    async fn query_status(
        &self,
        transaction_reference: String,
    ) -> Result<ProviderStatusReport, GatewayError>;

    /// Verifies `signature` over the raw body before parsing anything.
    fn parse_callback(
        &self,
        payload: &[u8],
        signature: Option<String>,
    ) -> Result<ProviderCallback, GatewayError>;
}

pub type SharedGateway = Arc<dyn MobileMoneyGateway + Send + Sync>;

/// Gateways keyed by the payment method they collect.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    gateways: HashMap<PaymentMethod, SharedGateway>,
}

impl PaymentGateways {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: SharedGateway) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn for_method(&self, method: PaymentMethod) -> Option<SharedGateway> {
        self.gateways.get(&method).cloned()
    }

    pub fn configured_methods(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<PaymentMethod> = self.gateways.keys().copied().collect();
        methods.sort_by_key(|method| method.as_str());
        methods
    }
}

pub(crate) fn transport_error(provider: PaymentMethod, err: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        provider,
        message: err.to_string(),
    }
}

/// Passes 2xx responses through; anything else becomes `Rejected` with the body kept raw.
pub(crate) async fn ensure_success(
    provider: PaymentMethod,
    resp: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, GatewayError> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = match resp.text().await {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => "<empty response body>".to_string(),
        Err(err) => format!("<failed to read response body: {err}>"),
    };
    let raw = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

    error!(
        %provider,
        status = %status,
        response_body = %raw,
        context = %context,
        "payments: provider api request failed"
    );

    Err(GatewayError::Rejected {
        provider,
        status: status.as_u16(),
        raw,
    })
}

pub(crate) async fn read_json(
    provider: PaymentMethod,
    resp: reqwest::Response,
) -> Result<Value, GatewayError> {
    let body = resp
        .bytes()
        .await
        .map_err(|err| transport_error(provider, err))?;
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body)
        .map_err(|err| GatewayError::MalformedPayload(format!("{provider} response: {err}")))
}

pub(crate) fn require_signature(
    secret: &str,
    payload: &[u8],
    signature: Option<String>,
) -> Result<(), GatewayError> {
    let signature = signature.ok_or(GatewayError::InvalidSignature)?;
    if !super::signatures::verify_payload_signature(secret, payload, &signature) {
        return Err(GatewayError::InvalidSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(method: PaymentMethod) -> SharedGateway {
        let mut mock = MockMobileMoneyGateway::new();
        mock.expect_provider().return_const(method);
        Arc::new(mock)
    }

    #[test]
    fn gateways_dispatch_by_method() {
        let gateways = PaymentGateways::new().register(gateway(PaymentMethod::MtnMomo));

        let mtn = gateways.for_method(PaymentMethod::MtnMomo);
        assert!(mtn.is_some());
        assert_eq!(mtn.map(|g| g.provider()), Some(PaymentMethod::MtnMomo));
        assert!(gateways.for_method(PaymentMethod::OrangeMoney).is_none());
        assert_eq!(gateways.configured_methods(), vec![PaymentMethod::MtnMomo]);
    }

    #[test]
    fn rejected_errors_keep_the_provider_body() {
        let err = GatewayError::Rejected {
            provider: PaymentMethod::OrangeMoney,
            status: 400,
            raw: json!({"message": "insufficient funds"}),
        };

        let raw = err.raw_payload();
        assert_eq!(raw["http_status"], json!(400));
        assert_eq!(raw["body"]["message"], json!("insufficient funds"));
        assert_eq!(raw["provider"], json!("orange_money"));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let result = require_signature("secret", b"{}", None);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }
}
