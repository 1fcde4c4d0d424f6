// Secret Check - fetch, guess, decrypt, re-verify
use crate::datastore::Datastore;
use crate::decryptor::SecretDecryptor;
use crate::hashing::{compute_digest, digest_matches, verify_candidates};
use crate::models::ProviderSettings;
use anyhow::{Context, Result};
use std::io::Write;

const PREVIEW_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    MissingRecords,
    Completed {
        candidate_match: Option<String>,
        decrypted: DecryptPhase,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptPhase {
    /// No active provider settings.
    Skipped,
    Failed(String),
    Verified { secret: String, matched: bool },
}

impl CheckOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckOutcome::MissingRecords => 1,
            CheckOutcome::Completed { .. } => 0,
        }
    }

    /// One-line summary for the logs. Never includes the decrypted secret.
    pub fn summary(&self) -> String {
        match self {
            CheckOutcome::MissingRecords => "order or security log missing".to_string(),
            CheckOutcome::Completed {
                candidate_match,
                decrypted,
            } => {
                let candidates = if candidate_match.is_some() {
                    "a candidate matched"
                } else {
                    "no candidate matched"
                };
                let decrypted = match decrypted {
                    DecryptPhase::Skipped => "decryption skipped".to_string(),
                    DecryptPhase::Failed(reason) => format!("decryption failed ({})", reason),
                    DecryptPhase::Verified { secret, matched } => format!(
                        "decrypted secret of {} chars {}",
                        secret.chars().count(),
                        if *matched { "matched" } else { "did not match" }
                    ),
                };
                format!("{}, {}", candidates, decrypted)
            }
        }
    }
}

pub async fn run_check<W: Write>(
    store: &dyn Datastore,
    decryptor: &dyn SecretDecryptor,
    order_id: &str,
    candidates: &[String],
    out: &mut W,
) -> Result<CheckOutcome> {
    // ==================== FETCH ====================
    let order = store
        .find_order(order_id)
        .await
        .context("failed to look up order")?;
    let security_log = store
        .find_security_log(order_id)
        .await
        .context("failed to look up security log")?;

    let (order, security_log) = match (order, security_log) {
        (Some(order), Some(log)) => (order, log),
        (order, log) => {
            tracing::warn!(
                "Order present: {}, security log present: {}",
                order.is_some(),
                log.is_some()
            );
            writeln!(out, "Order or security log not found")?;
            return Ok(CheckOutcome::MissingRecords);
        }
    };

    let amount = order.amount.to_string();
    let expected_hash = security_log.expected_hash;

    writeln!(out, "Order ID: {}", order_id)?;
    writeln!(out, "Amount: {}", amount)?;
    writeln!(out, "Expected hash (from backend): {}", expected_hash)?;
    writeln!(out)?;

    // ==================== CANDIDATES ====================
    writeln!(out, "Trying different secrets:")?;
    let results = verify_candidates(order_id, &amount, &expected_hash, candidates);
    for result in &results {
        if result.matched {
            writeln!(out, "  Secret: '{}' -> {} ✅ MATCH!", result.secret, result.digest)?;
        } else {
            writeln!(out, "  Secret: '{}' -> {}", result.secret, result.digest)?;
        }
    }
    writeln!(out)?;

    let candidate_match = results
        .iter()
        .find(|r| r.matched)
        .map(|r| r.secret.clone());
    tracing::info!(
        "Tried {} candidate secrets, match: {}",
        results.len(),
        candidate_match.is_some()
    );

    // ==================== DECRYPT ====================
    let settings = store
        .find_active_settings()
        .await
        .context("failed to look up active provider settings")?;

    let decrypted = match settings {
        Some(settings) => {
            decrypt_and_verify(decryptor, &settings, order_id, &amount, &expected_hash, out)
                .await?
        }
        None => {
            tracing::info!("No active provider settings, skipping decryption");
            DecryptPhase::Skipped
        }
    };

    Ok(CheckOutcome::Completed {
        candidate_match,
        decrypted,
    })
}

async fn decrypt_and_verify<W: Write>(
    decryptor: &dyn SecretDecryptor,
    settings: &ProviderSettings,
    order_id: &str,
    amount: &str,
    expected_hash: &str,
    out: &mut W,
) -> Result<DecryptPhase> {
    writeln!(out, "Encrypted values in database:")?;
    writeln!(out, "  merchantId: {}", preview(settings.merchant_id.as_deref()))?;
    writeln!(out, "  apiKey: {}", preview(settings.api_key.as_deref()))?;
    writeln!(out, "  apiSecret: {}", preview(settings.api_secret.as_deref()))?;
    writeln!(out)?;

    let Some(encrypted_secret) = settings.api_secret.as_deref() else {
        let reason = "apiSecret missing from active settings".to_string();
        writeln!(out, "Decryption failed: {}", reason)?;
        return Ok(DecryptPhase::Failed(reason));
    };

    tracing::info!("Decrypting apiSecret with {} backend", decryptor.name());
    let secret = match decryptor.decrypt(encrypted_secret).await {
        Ok(secret) => secret,
        Err(e) => {
            tracing::warn!("Decryption failed: {}", e);
            writeln!(out, "Decryption failed: {}", e)?;
            return Ok(DecryptPhase::Failed(e.to_string()));
        }
    };

    writeln!(out, "Decrypted API Secret: '{}'", secret)?;

    // ==================== RE-VERIFY ====================
    let digest = compute_digest(order_id, amount, &secret);
    let matched = digest_matches(&digest, expected_hash);
    let verdict = if matched { "✅ MATCH!" } else { "❌ NO MATCH" };
    writeln!(out, "Hash with decrypted secret: {} {}", digest, verdict)?;

    Ok(DecryptPhase::Verified { secret, matched })
}

fn preview(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("{}...", v.chars().take(PREVIEW_CHARS).collect::<String>()),
        None => "<missing>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MasterKey;
    use crate::datastore::{MemoryStore, ORDERS, PROVIDER_SETTINGS, SECURITY_LOGS};
    use crate::decryptor::InProcessDecryptor;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    const ORDER_ID: &str = "orderid";
    const MASTER: &str = "unit-test-master-key";

    fn candidates() -> Vec<String> {
        ["test_secret_abcdef", "", "prod_key", "production"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn store_with_order(signing_secret: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(ORDERS, json!({"id": ORDER_ID, "amount": 100}));
        store.insert(
            SECURITY_LOGS,
            json!({
                "orderId": ORDER_ID,
                "expectedHash": compute_digest(ORDER_ID, "100", signing_secret)
            }),
        );
        store
    }

    fn add_settings(store: &mut MemoryStore, api_secret: &str) {
        let key = MasterKey::derive(MASTER);
        store.insert(
            PROVIDER_SETTINGS,
            json!({
                "merchantId": key.encrypt(b"merchant-1").unwrap(),
                "apiKey": key.encrypt(b"key-1").unwrap(),
                "apiSecret": api_secret,
                "isActive": true
            }),
        );
    }

    async fn run(store: &MemoryStore) -> (CheckOutcome, String) {
        let decryptor = InProcessDecryptor::new(Some(MASTER));
        let mut out = Vec::new();
        let outcome = run_check(store, &decryptor, ORDER_ID, &candidates(), &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_reports_matching_candidate_only() {
        let store = store_with_order("prod_key");
        let (outcome, output) = run(&store).await;

        assert_eq!(
            outcome,
            CheckOutcome::Completed {
                candidate_match: Some("prod_key".to_string()),
                decrypted: DecryptPhase::Skipped,
            }
        );
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(output.matches("✅ MATCH!").count(), 1);
        assert!(output.contains(&format!(
            "  Secret: 'prod_key' -> {} ✅ MATCH!",
            compute_digest(ORDER_ID, "100", "prod_key")
        )));
        assert!(output.contains(&format!(
            "  Secret: '' -> {}\n",
            compute_digest(ORDER_ID, "100", "")
        )));
        assert!(output.starts_with("Order ID: orderid\nAmount: 100\n"));
    }

    #[tokio::test]
    async fn test_no_active_settings_skips_decryption() {
        let mut store = store_with_order("prod_key");
        store.insert(
            PROVIDER_SETTINGS,
            json!({"apiSecret": "whatever", "isActive": false}),
        );
        let (outcome, output) = run(&store).await;

        assert!(matches!(
            outcome,
            CheckOutcome::Completed {
                decrypted: DecryptPhase::Skipped,
                ..
            }
        ));
        assert!(!output.contains("Encrypted values"));
        assert!(!output.contains("Decrypt"));
    }

    #[tokio::test]
    async fn test_decrypted_secret_is_verified() {
        let mut store = store_with_order("shopier_live_secret");
        let sealed = MasterKey::derive(MASTER)
            .encrypt(b"shopier_live_secret")
            .unwrap();
        add_settings(&mut store, &sealed);

        let (outcome, output) = run(&store).await;

        assert_eq!(
            outcome,
            CheckOutcome::Completed {
                candidate_match: None,
                decrypted: DecryptPhase::Verified {
                    secret: "shopier_live_secret".to_string(),
                    matched: true,
                },
            }
        );
        assert!(output.contains(&format!("  apiSecret: {}...", &sealed[..30])));
        assert!(output.contains("Decrypted API Secret: 'shopier_live_secret'"));
        assert!(output.contains("Hash with decrypted secret: "));
        assert!(output.trim_end().ends_with("✅ MATCH!"));
    }

    #[tokio::test]
    async fn test_decrypted_secret_mismatch() {
        let mut store = store_with_order("prod_key");
        let sealed = MasterKey::derive(MASTER).encrypt(b"stale_secret").unwrap();
        add_settings(&mut store, &sealed);

        let (outcome, output) = run(&store).await;

        assert!(matches!(
            outcome,
            CheckOutcome::Completed {
                decrypted: DecryptPhase::Verified { matched: false, .. },
                ..
            }
        ));
        assert!(output.trim_end().ends_with("❌ NO MATCH"));
    }

    #[tokio::test]
    async fn test_corrupted_ciphertext_is_reported_not_fatal() {
        let mut store = store_with_order("shopier_live_secret");
        let sealed = MasterKey::derive(MASTER)
            .encrypt(b"shopier_live_secret")
            .unwrap();
        let mut raw = STANDARD.decode(&sealed).unwrap();
        raw[20] ^= 0xff;
        add_settings(&mut store, &STANDARD.encode(raw));

        let (outcome, output) = run(&store).await;

        assert_eq!(outcome.exit_code(), 0);
        assert!(matches!(
            outcome,
            CheckOutcome::Completed {
                decrypted: DecryptPhase::Failed(_),
                ..
            }
        ));
        assert!(output.contains("Decryption failed: unable to authenticate data"));
        assert!(!output.contains("Hash with decrypted secret"));
    }

    #[tokio::test]
    async fn test_settings_without_api_secret() {
        let mut store = store_with_order("prod_key");
        store.insert(PROVIDER_SETTINGS, json!({"merchantId": "m", "isActive": true}));

        let (outcome, output) = run(&store).await;

        assert!(matches!(
            outcome,
            CheckOutcome::Completed {
                decrypted: DecryptPhase::Failed(_),
                ..
            }
        ));
        assert!(output.contains("  apiKey: <missing>"));
        assert!(output.contains("Decryption failed: apiSecret missing from active settings"));
    }

    #[tokio::test]
    async fn test_missing_order_exits_with_one() {
        let mut store = MemoryStore::new();
        store.insert(SECURITY_LOGS, json!({"orderId": ORDER_ID, "expectedHash": "ab"}));

        let (outcome, output) = run(&store).await;

        assert_eq!(outcome, CheckOutcome::MissingRecords);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(output, "Order or security log not found\n");
    }

    #[tokio::test]
    async fn test_missing_security_log_exits_with_one() {
        let mut store = MemoryStore::new();
        store.insert(ORDERS, json!({"id": ORDER_ID, "amount": 100}));

        let (outcome, output) = run(&store).await;

        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(output, "Order or security log not found\n");
    }

    #[tokio::test]
    async fn test_datastore_errors_propagate() {
        let mut store = MemoryStore::new();
        store.insert(ORDERS, json!({"id": ORDER_ID}));

        let decryptor = InProcessDecryptor::new(Some(MASTER));
        let mut out = Vec::new();
        let err = run_check(&store, &decryptor, ORDER_ID, &candidates(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to look up order"));
    }

    #[test]
    fn test_summary_hides_secret() {
        let outcome = CheckOutcome::Completed {
            candidate_match: None,
            decrypted: DecryptPhase::Verified {
                secret: "shopier_live_secret".to_string(),
                matched: true,
            },
        };
        assert_eq!(
            outcome.summary(),
            "no candidate matched, decrypted secret of 19 chars matched"
        );
        assert_eq!(CheckOutcome::MissingRecords.summary(), "order or security log missing");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview(Some("short")), "short...");
        assert_eq!(preview(Some(&"é".repeat(40))), format!("{}...", "é".repeat(30)));
        assert_eq!(preview(None), "<missing>");
    }
}
