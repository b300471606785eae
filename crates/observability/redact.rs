/// Keeps the last three digits of a phone number so log lines can be correlated
/// with support tickets without carrying the full MSISDN.
pub fn mask_phone_number(phone_number: &str) -> String {
    let digits: Vec<char> = phone_number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 3 {
        return "***".to_string();
    }

    let visible: String = digits[digits.len() - 3..].iter().collect();
    format!("{}{visible}", "*".repeat(digits.len() - 3))
}

pub fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    field.contains("secret")
        || field.contains("password")
        || field.contains("token")
        || field.contains("authorization")
        || field.contains("api_key")
        || field.contains("signature")
}

pub fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return "[REDACTED]".to_string();
    }
    value
}
