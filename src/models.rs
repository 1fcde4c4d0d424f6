// Stored Records - read-only views of the payment backend's documents
use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== ORDERS ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: OrderAmount,
}

/// Order amounts were written both as JSON numbers and as strings.
/// `Display` renders the exact text the backend fed into the signature hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderAmount {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for OrderAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAmount::Text(text) => f.write_str(text),
            OrderAmount::Number(number) => {
                if let Some(v) = number.as_i64() {
                    write!(f, "{}", v)
                } else if let Some(v) = number.as_u64() {
                    write!(f, "{}", v)
                } else if let Some(v) = number.as_f64() {
                    f.write_str(&float_text(v))
                } else {
                    write!(f, "{}", number)
                }
            }
        }
    }
}

/// Shortest round-trip text with a trailing ".0" on integral values (100.0).
/// Exponent form is `1e+16` / `1.5e-05`: explicit sign, at least two digits.
fn float_text(v: f64) -> String {
    // Debug switches to exponent form below 1e-4 and from 1e16 up
    let debug = format!("{:?}", v);
    let Some((mantissa, exponent)) = debug.split_once('e') else {
        return debug;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

// ==================== SECURITY LOGS ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogEntry {
    pub order_id: String,
    pub expected_hash: String,
}

// ==================== PROVIDER SETTINGS ====================
/// Shopier credentials, each stored as base64(iv || ciphertext || tag).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_text_forms() {
        let cases = vec![
            (json!(100), "100"),
            (json!(100.0), "100.0"),
            (json!(99.5), "99.5"),
            (json!(0.0001), "0.0001"),
            (json!(0.00001), "1e-05"),
            (json!(1.5e-7), "1.5e-07"),
            (json!(1e16), "1e+16"),
            (json!(2.5e300), "2.5e+300"),
            (json!(-1e-5), "-1e-05"),
            (json!("250"), "250"),
            (json!("12.50"), "12.50"),
        ];

        for (raw, expected) in cases {
            let amount: OrderAmount = serde_json::from_value(raw).unwrap();
            assert_eq!(amount.to_string(), expected);
        }
    }

    #[test]
    fn test_documents_use_camel_case_fields() {
        let log: SecurityLogEntry = serde_json::from_value(json!({
            "_id": "65f0c1",
            "orderId": "abc",
            "expectedHash": "deadbeef",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(log.order_id, "abc");
        assert_eq!(log.expected_hash, "deadbeef");

        let settings: ProviderSettings = serde_json::from_value(json!({
            "apiSecret": "c2VjcmV0",
            "isActive": true
        }))
        .unwrap();
        assert!(settings.is_active);
        assert_eq!(settings.api_secret.as_deref(), Some("c2VjcmV0"));
        assert!(settings.merchant_id.is_none());
    }
}
