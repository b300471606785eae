use anyhow::{Result, bail};

use crate::domain::value_objects::enums::payment_methods::PaymentMethod;

/// Operating region: Cameroon.
pub const COUNTRY_CODE: &str = "237";
pub const NATIONAL_NUMBER_LEN: usize = 9;
const MAX_RAW_PHONE_LEN: usize = 32;

const MTN_PREFIXES: &[&str] = &[
    "650", "651", "652", "653", "654", "670", "671", "672", "673", "674", "675", "676", "677",
    "678", "679", "680", "681", "682", "683", "684",
];

const ORANGE_PREFIXES: &[&str] = &[
    "640", "655", "656", "657", "658", "659", "690", "691", "692", "693", "694", "695", "696",
    "697", "698", "699",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhoneNumber {
    national: String,
}

impl NormalizedPhoneNumber {
    /// Nine-digit national significant number, e.g. `677123456`.
    pub fn national(&self) -> &str {
        &self.national
    }

    /// Canonical international form without `+`, e.g. `237677123456`.
    pub fn international(&self) -> String {
        format!("{}{}", COUNTRY_CODE, self.national)
    }
}

pub fn normalize_phone_number(raw: &str) -> Result<NormalizedPhoneNumber> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Invalid phone number: empty input");
    }
    if trimmed.len() > MAX_RAW_PHONE_LEN {
        bail!("Invalid phone number: too long");
    }

    let mut has_plus = false;
    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if digits.is_empty() && !has_plus => has_plus = true,
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => bail!("Invalid phone number: unexpected character"),
        }
    }

    let national = if has_plus {
        match digits.strip_prefix(COUNTRY_CODE) {
            Some(national) => national,
            None => bail!("Invalid phone number: unsupported country code"),
        }
    } else if let Some(national) = digits.strip_prefix("00237") {
        national
    } else if digits.len() == COUNTRY_CODE.len() + NATIONAL_NUMBER_LEN {
        match digits.strip_prefix(COUNTRY_CODE) {
            Some(national) => national,
            None => bail!("Invalid phone number: unsupported country code"),
        }
    } else {
        digits.as_str()
    };

    if national.len() != NATIONAL_NUMBER_LEN {
        bail!("Invalid phone number: expected {NATIONAL_NUMBER_LEN} national digits");
    }
    if !national.starts_with('6') {
        bail!("Invalid phone number: not a mobile number");
    }

    Ok(NormalizedPhoneNumber {
        national: national.to_string(),
    })
}

/// Picks the operator from the national prefix. Prefix sets are disjoint.
pub fn classify_provider(phone: &NormalizedPhoneNumber) -> Option<PaymentMethod> {
    let prefix = &phone.national()[..3];
    if MTN_PREFIXES.contains(&prefix) {
        Some(PaymentMethod::MtnMomo)
    } else if ORANGE_PREFIXES.contains(&prefix) {
        Some(PaymentMethod::OrangeMoney)
    } else {
        None
    }
}
