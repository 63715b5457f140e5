//! AWS Signature Version 4 request signing.
//!
//! The Converse endpoints authenticate with SigV4 over the access/secret
//! key pair. Only the pieces this client needs are implemented: POST with
//! a JSON body, headers signed explicitly by the caller.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Access/secret key pair from settings.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

/// Everything that goes into one signature. `headers` must hold lowercase
/// names with trimmed values; they are sorted here. `query` must already
/// be in canonical (sorted, encoded) form.
pub struct SigningParams<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Compute the `Authorization` header value for a request.
pub fn authorization_header(credentials: &Credentials, params: &SigningParams) -> String {
    let date = params.timestamp.format("%Y%m%d").to_string();
    let scope = format!(
        "{}/{}/{}/aws4_request",
        date, params.region, params.service
    );

    let mut headers: Vec<&(String, String)> = params.headers.iter().collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical_headers = String::new();
    for (name, value) in &headers {
        let _ = writeln!(canonical_headers, "{}:{}", name, value);
    }
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        params.method,
        params.path,
        params.query,
        canonical_headers,
        signed_headers,
        sha256_hex(params.payload)
    );

    let amz_date = amz_date(params.timestamp);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(credentials, &date, params);
    let signature = hex(&hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key, scope, signed_headers, signature
    )
}

/// Timestamp in the `x-amz-date` wire format.
pub fn amz_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

fn signing_key(credentials: &Credentials, date: &str, params: &SigningParams) -> Vec<u8> {
    let secret = format!("AWS4{}", credentials.secret_key);
    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, params.region.as_bytes());
    let k_service = hmac_sha256(&k_region, params.service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Percent-encode one path segment the way SigV4 canonicalization expects:
/// everything but unreserved characters is encoded. Model ids carry `.`
/// and `:`, so the encoded form must be used in the request URL as well.
pub fn uri_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        }
    }

    // The published AWS example request: GET iam ListUsers, 2015-08-30.
    #[test]
    fn matches_aws_reference_signature() {
        let headers = vec![
            (
                "content-type".to_string(),
                "application/x-www-form-urlencoded; charset=utf-8".to_string(),
            ),
            ("host".to_string(), "iam.amazonaws.com".to_string()),
            ("x-amz-date".to_string(), "20150830T123600Z".to_string()),
        ];
        let params = SigningParams {
            method: "GET",
            path: "/",
            query: "Action=ListUsers&Version=2010-05-08",
            headers: &headers,
            payload: b"",
            region: "us-east-1",
            service: "iam",
            timestamp: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };

        let authorization = authorization_header(&example_credentials(), &params);
        assert_eq!(
            authorization,
            "AWS4-HMAC-SHA256 \
             Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn empty_payload_hash_is_well_known() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn amz_date_format() {
        let ts = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        assert_eq!(amz_date(ts), "20150830T123600Z");
    }

    #[test]
    fn model_ids_are_segment_encoded() {
        assert_eq!(
            uri_encode_segment("anthropic.claude-3-haiku-20240307-v1:0"),
            "anthropic.claude-3-haiku-20240307-v1%3A0"
        );
        assert_eq!(uri_encode_segment("plain-id_0.9~x"), "plain-id_0.9~x");
    }

    #[test]
    fn headers_are_sorted_into_signed_list() {
        let headers = vec![
            ("x-amz-date".to_string(), "20150830T123600Z".to_string()),
            ("host".to_string(), "example.com".to_string()),
        ];
        let params = SigningParams {
            method: "POST",
            path: "/",
            query: "",
            headers: &headers,
            payload: b"{}",
            region: "us-east-1",
            service: "bedrock",
            timestamp: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };
        let authorization = authorization_header(&example_credentials(), &params);
        assert!(authorization.contains("SignedHeaders=host;x-amz-date,"));
    }
}
