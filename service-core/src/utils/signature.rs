use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate an HMAC-SHA256 signature for a time-limited file URL.
///
/// Format: HMAC-SHA256(file_name|expires, secret)
pub fn generate_file_signature(
    secret: &str,
    file_name: &str,
    expires: i64,
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    let payload = format!("{}|{}", file_name, expires);

    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a file URL signature using constant-time comparison.
///
/// Expiry itself is the caller's concern; this only checks that the signature
/// matches the given file name and expiry.
pub fn verify_file_signature(
    secret: &str,
    file_name: &str,
    expires: i64,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = generate_file_signature(secret, file_name, expires)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}
