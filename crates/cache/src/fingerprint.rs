//! Deterministic cache keys (§3, §8 invariant 9): SHA-256 over a
//! canonicalized JSON tuple of the fields that determine whether two
//! requests would produce the same response.

use llm_gateway_core::ChatRequest;
use sha2::{Digest, Sha256};

/// Computes the fingerprint for a chat request. `stop` is sorted before
/// hashing so that reordering the caller's stop sequences does not change
/// the key.
pub fn fingerprint(req: &ChatRequest) -> String {
    let mut stop = req.stop.clone().unwrap_or_default();
    stop.sort();

    let canonical = serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "temperature": req.temperature,
        "top_p": req.top_p,
        "max_tokens": req.max_tokens,
        "stop": stop,
    });
    // serde_json's map serialization is insertion-ordered for the struct
    // fields we built above, but object keys inside `messages` come from
    // `Message`'s derive, which is also field-order-stable — so the same
    // logical request always serializes to the same bytes.
    let bytes = serde_json::to_vec(&canonical).expect("canonical cache key is always valid JSON");

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}
