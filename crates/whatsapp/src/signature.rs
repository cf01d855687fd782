//! Twilio webhook signature validation (`X-Twilio-Signature`).

use base64::Engine;
use ring::hmac;

/// Outcome of validating a webhook signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureValidation {
    Valid,
    Invalid,
    Missing,
}

/// String Twilio signs: the full URL followed by each POST parameter's
/// name and value, sorted by name.
fn signed_payload<'a>(url: &str, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut params: Vec<(&str, &str)> = params.into_iter().collect();
    params.sort();
    let mut payload = url.to_string();
    for (name, value) in params {
        payload.push_str(name);
        payload.push_str(value);
    }
    payload
}

/// Compute the base64 signature for a request.
pub fn compute_signature<'a>(
    auth_token: &str,
    url: &str,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes());
    let tag = hmac::sign(&key, signed_payload(url, params).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
}

/// Validate a signature header against the request URL and form parameters.
#[must_use]
pub fn validate_signature<'a>(
    auth_token: &str,
    signature_header: Option<&str>,
    url: &str,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> SignatureValidation {
    let Some(signature) = signature_header else {
        return SignatureValidation::Missing;
    };
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return SignatureValidation::Invalid;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes());
    match hmac::verify(&key, signed_payload(url, params).as_bytes(), &provided) {
        Ok(()) => SignatureValidation::Valid,
        Err(_) => SignatureValidation::Invalid,
    }
}
