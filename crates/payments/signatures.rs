use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature, optionally prefixed with `sha256=`.
pub fn verify_payload_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_payload_verifies() {
        let payload = br#"{"reference":"abc","status":"SUCCESSFUL"}"#;
        let signature = sign_payload("top-secret", payload).unwrap();

        assert!(verify_payload_signature("top-secret", payload, &signature));
        assert!(verify_payload_signature(
            "top-secret",
            payload,
            &format!("sha256={signature}")
        ));
    }

    #[test]
    fn tampered_payload_or_wrong_secret_is_rejected() {
        let payload = br#"{"reference":"abc","status":"SUCCESSFUL"}"#;
        let signature = sign_payload("top-secret", payload).unwrap();

        assert!(!verify_payload_signature("other", payload, &signature));
        assert!(!verify_payload_signature(
            "top-secret",
            br#"{"reference":"abc","status":"FAILED"}"#,
            &signature
        ));
        assert!(!verify_payload_signature("top-secret", payload, "not-hex"));
        assert!(!verify_payload_signature("", payload, &signature));
    }
}
