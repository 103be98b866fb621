//! # Provider Validators
//!
//! Authentication and event filtering for each supported webhook provider.
//!
//! Every provider reduces to three checks, combined per the provider's
//! wire contract:
//! - an HMAC signature over the raw body (`sha256=<hex>` style headers)
//! - a verbatim token comparison against a header
//! - an allow-list check of the provider's event header
//!
//! All comparisons of secret material are constant-time: HMAC digests go
//! through `Mac::verify_slice` and verbatim tokens through
//! `subtle::ConstantTimeEq`. Header lookup is case-insensitive.

use axum::http::HeaderMap;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::error::Error;
use crate::crd::ReceiverType;

/// Validate an incoming delivery for `receiver_type`.
///
/// `token` is the shared secret from the receiver's secretRef and `events`
/// the allow-list from the receiver spec; an empty list accepts every event.
pub fn validate(
    receiver_type: ReceiverType,
    headers: &HeaderMap,
    body: &[u8],
    token: &[u8],
    events: &[String],
) -> Result<(), Error> {
    match receiver_type {
        ReceiverType::Generic => Ok(()),
        ReceiverType::GenericHmac => verify_hmac_signature(headers, "x-signature", body, token),
        ReceiverType::GitHub => {
            verify_sha256_signature(headers, "x-hub-signature-256", body, token)?;
            check_event(headers, "x-github-event", events)
        }
        ReceiverType::GitLab => {
            verify_token_header(headers, "x-gitlab-token", token)?;
            check_event(headers, "x-gitlab-event", events)
        }
        ReceiverType::Bitbucket => {
            verify_sha256_signature(headers, "x-hub-signature-256", body, token)?;
            check_event(headers, "x-event-key", events)
        }
        ReceiverType::BitbucketServer => {
            verify_sha256_signature(headers, "x-hub-signature", body, token)?;
            check_event(headers, "x-event-key", events)
        }
        ReceiverType::Harbor => verify_token_header(headers, "authorization", token),
        ReceiverType::CdEvents => check_event(headers, "ce-type", events),
        ReceiverType::DockerHub
        | ReceiverType::Quay
        | ReceiverType::Gcr
        | ReceiverType::Acr
        | ReceiverType::Nexus => Ok(()),
    }
}

/// Reject the delivery unless its event header is on the allow-list.
/// An empty allow-list accepts anything, including a missing header.
fn check_event(headers: &HeaderMap, header: &str, events: &[String]) -> Result<(), Error> {
    if events.is_empty() {
        return Ok(());
    }
    let event = required_header(headers, header)?;
    if events.iter().any(|allowed| allowed == event) {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "event '{event}' is not allowed for this receiver"
        )))
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, Error> {
    headers
        .get(name)
        .ok_or_else(|| Error::InvalidRequest(format!("missing required header '{name}'")))?
        .to_str()
        .map_err(|_| Error::InvalidRequest(format!("header '{name}' is not valid UTF-8")))
}

fn verify_token_header(headers: &HeaderMap, header: &str, token: &[u8]) -> Result<(), Error> {
    let presented = required_header(headers, header)?;
    if bool::from(presented.as_bytes().ct_eq(token)) {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "token in header '{header}' does not match"
        )))
    }
}

/// Verify a GitHub-style `sha256=<hex>` HMAC-SHA256 signature header.
fn verify_sha256_signature(
    headers: &HeaderMap,
    header: &str,
    body: &[u8],
    token: &[u8],
) -> Result<(), Error> {
    let signature = required_header(headers, header)?;
    let hex_digest = signature.strip_prefix("sha256=").ok_or_else(|| {
        Error::InvalidRequest(format!("header '{header}' is not a sha256 signature"))
    })?;
    let digest = decode_hex(header, hex_digest)?;
    if hmac_matches::<Hmac<Sha256>>(token, body, &digest) {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "HMAC signature in header '{header}' does not match"
        )))
    }
}

/// Verify a `<digest>=<hex>` signature header, accepting sha1, sha256 and
/// sha512 HMAC digests.
fn verify_hmac_signature(
    headers: &HeaderMap,
    header: &str,
    body: &[u8],
    token: &[u8],
) -> Result<(), Error> {
    let signature = required_header(headers, header)?;
    let (algorithm, hex_digest) = signature.split_once('=').ok_or_else(|| {
        Error::InvalidRequest(format!(
            "header '{header}' must have the form '<digest-type>=<hex>'"
        ))
    })?;
    let digest = decode_hex(header, hex_digest)?;
    let matches = match algorithm {
        "sha1" => hmac_matches::<Hmac<Sha1>>(token, body, &digest),
        "sha256" => hmac_matches::<Hmac<Sha256>>(token, body, &digest),
        "sha512" => hmac_matches::<Hmac<Sha512>>(token, body, &digest),
        other => {
            return Err(Error::InvalidRequest(format!(
                "unsupported signature digest '{other}'"
            )))
        }
    };
    if matches {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "HMAC signature in header '{header}' does not match"
        )))
    }
}

fn decode_hex(header: &str, hex_digest: &str) -> Result<Vec<u8>, Error> {
    hex::decode(hex_digest)
        .map_err(|_| Error::InvalidRequest(format!("signature in header '{header}' is not valid hex")))
}

fn hmac_matches<M: Mac + KeyInit>(token: &[u8], body: &[u8], digest: &[u8]) -> bool {
    let Ok(mut mac) = <M as Mac>::new_from_slice(token) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(digest).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TOKEN: &[u8] = b"token";

    fn headers(entries: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            headers.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::try_from(*value).unwrap(),
            );
        }
        headers
    }

    fn sha256_signature(token: &[u8], body: &[u8]) -> String {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(token).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn sha1_signature(token: &[u8], body: &[u8]) -> String {
        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(token).unwrap();
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_generic_accepts_anything() {
        assert!(validate(ReceiverType::Generic, &HeaderMap::new(), b"{}", TOKEN, &[]).is_ok());
    }

    #[test]
    fn test_registry_providers_need_no_headers() {
        for receiver_type in [
            ReceiverType::DockerHub,
            ReceiverType::Quay,
            ReceiverType::Gcr,
            ReceiverType::Acr,
            ReceiverType::Nexus,
        ] {
            assert!(validate(receiver_type, &HeaderMap::new(), b"{}", TOKEN, &[]).is_ok());
        }
    }

    #[test]
    fn test_github_valid_signature() {
        let body = br#"{"action":"push"}"#;
        let headers = headers(&[("X-Hub-Signature-256", &sha256_signature(TOKEN, body))]);
        assert!(validate(ReceiverType::GitHub, &headers, body, TOKEN, &[]).is_ok());
    }

    #[test]
    fn test_github_rejects_tampered_body() {
        let body = br#"{"action":"push"}"#;
        let headers = headers(&[("X-Hub-Signature-256", &sha256_signature(TOKEN, body))]);
        let err =
            validate(ReceiverType::GitHub, &headers, br#"{"action":"pull"}"#, TOKEN, &[])
                .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_github_rejects_wrong_token() {
        let body = br#"{"action":"push"}"#;
        let headers = headers(&[("X-Hub-Signature-256", &sha256_signature(b"other", body))]);
        assert!(validate(ReceiverType::GitHub, &headers, body, TOKEN, &[]).is_err());
    }

    #[test]
    fn test_github_event_allow_list() {
        let body = br#"{"action":"push"}"#;
        let events = vec!["push".to_string()];

        let push_headers = headers(&[
            ("X-Hub-Signature-256", sha256_signature(TOKEN, body).as_str()),
            ("X-GitHub-Event", "push"),
        ]);
        assert!(validate(ReceiverType::GitHub, &push_headers, body, TOKEN, &events).is_ok());

        let ping_headers = headers(&[
            ("X-Hub-Signature-256", sha256_signature(TOKEN, body).as_str()),
            ("X-GitHub-Event", "ping"),
        ]);
        assert!(validate(ReceiverType::GitHub, &ping_headers, body, TOKEN, &events).is_err());
    }

    #[test]
    fn test_generic_hmac_digest_variants() {
        let body = b"payload";
        let sha256 = headers(&[("X-Signature", &sha256_signature(TOKEN, body))]);
        assert!(validate(ReceiverType::GenericHmac, &sha256, body, TOKEN, &[]).is_ok());

        let sha1 = headers(&[("X-Signature", &sha1_signature(TOKEN, body))]);
        assert!(validate(ReceiverType::GenericHmac, &sha1, body, TOKEN, &[]).is_ok());
    }

    #[test]
    fn test_generic_hmac_rejects_unknown_digest_and_bad_hex() {
        let body = b"payload";
        let md5 = headers(&[("X-Signature", "md5=0123456789abcdef")]);
        assert!(validate(ReceiverType::GenericHmac, &md5, body, TOKEN, &[]).is_err());

        let bad_hex = headers(&[("X-Signature", "sha256=not-hex")]);
        assert!(validate(ReceiverType::GenericHmac, &bad_hex, body, TOKEN, &[]).is_err());

        assert!(validate(ReceiverType::GenericHmac, &HeaderMap::new(), body, TOKEN, &[]).is_err());
    }

    #[test]
    fn test_gitlab_token_comparison() {
        let ok = headers(&[("X-Gitlab-Token", "token")]);
        assert!(validate(ReceiverType::GitLab, &ok, b"", TOKEN, &[]).is_ok());

        let wrong = headers(&[("X-Gitlab-Token", "nope")]);
        assert!(validate(ReceiverType::GitLab, &wrong, b"", TOKEN, &[]).is_err());

        assert!(validate(ReceiverType::GitLab, &HeaderMap::new(), b"", TOKEN, &[]).is_err());
    }

    #[test]
    fn test_harbor_authorization_header() {
        let ok = headers(&[("Authorization", "token")]);
        assert!(validate(ReceiverType::Harbor, &ok, b"", TOKEN, &[]).is_ok());

        let wrong = headers(&[("Authorization", "Bearer token")]);
        assert!(validate(ReceiverType::Harbor, &wrong, b"", TOKEN, &[]).is_err());
    }

    #[test]
    fn test_bitbucket_requires_event_when_list_set() {
        let body = b"{}";
        let events = vec!["push".to_string()];
        let signature = sha256_signature(TOKEN, body);

        let with_event = headers(&[
            ("X-Hub-Signature-256", signature.as_str()),
            ("X-Event-Key", "push"),
        ]);
        assert!(validate(ReceiverType::Bitbucket, &with_event, body, TOKEN, &events).is_ok());

        let without_event = headers(&[("X-Hub-Signature-256", signature.as_str())]);
        assert!(validate(ReceiverType::Bitbucket, &without_event, body, TOKEN, &events).is_err());
    }

    #[test]
    fn test_bitbucket_server_uses_legacy_header() {
        let body = b"{}";
        let signature = sha256_signature(TOKEN, body);
        let ok = headers(&[("X-Hub-Signature", signature.as_str())]);
        assert!(validate(ReceiverType::BitbucketServer, &ok, body, TOKEN, &[]).is_ok());
    }

    #[test]
    fn test_cdevents_event_check() {
        let merged = headers(&[("Ce-Type", "cd.change.merged.v1")]);
        let events = vec!["cd.change.merged.v1".to_string()];
        assert!(validate(ReceiverType::CdEvents, &merged, b"{}", TOKEN, &events).is_ok());

        let other = vec!["cd.environment.modified.v1".to_string()];
        assert!(validate(ReceiverType::CdEvents, &merged, b"{}", TOKEN, &other).is_err());

        // no allow-list accepts any event type
        assert!(validate(ReceiverType::CdEvents, &merged, b"{}", TOKEN, &[]).is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let lower = headers(&[("x-gitlab-token", "token")]);
        assert!(validate(ReceiverType::GitLab, &lower, b"", TOKEN, &[]).is_ok());
    }
}
