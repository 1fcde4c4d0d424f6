// Hash Verifier Module
// Signature hash used by the payment backend: SHA256(orderId + amount + secret)
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateResult {
    pub secret: String,
    pub digest: String,
    pub matched: bool,
}

pub fn compute_digest(order_id: &str, amount: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update(amount.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact comparison: the backend stores the lowercase hex digest verbatim.
pub fn digest_matches(digest: &str, expected_hash: &str) -> bool {
    digest == expected_hash
}

pub fn verify_candidates(
    order_id: &str,
    amount: &str,
    expected_hash: &str,
    candidates: &[String],
) -> Vec<CandidateResult> {
    candidates
        .iter()
        .map(|secret| {
            let digest = compute_digest(order_id, amount, secret);
            let matched = digest_matches(&digest, expected_hash);
            CandidateResult {
                secret: secret.clone(),
                digest,
                matched,
            }
        })
        .collect()
}
