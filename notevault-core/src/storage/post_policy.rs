//! Hand-rolled AWS SigV4 POST-policy signing (§4.1). `opendal` only presigns
//! single-method requests (GET/PUT); a presigned POST for a browser `<form>`
//! upload needs a base64 policy document plus the SigV4 derived signing key,
//! which this module builds directly from `hmac`+`sha2`.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Fields a browser must include, verbatim, in the multipart form that
/// uploads directly to the object store (§4.1 "direct-to-store uploads").
#[derive(Debug, Clone, Serialize)]
pub struct PresignedPost {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

pub struct PresignedPostBuilder<'a> {
    endpoint: &'a str,
    bucket: &'a str,
    region: &'a str,
    access_key_id: &'a str,
    secret_access_key: &'a str,
}

impl<'a> PresignedPostBuilder<'a> {
    pub fn new(
        endpoint: &'a str,
        bucket: &'a str,
        region: &'a str,
        access_key_id: &'a str,
        secret_access_key: &'a str,
    ) -> Self {
        Self {
            endpoint,
            bucket,
            region,
            access_key_id,
            secret_access_key,
        }
    }

    pub fn build(&self, object_key: &str, ttl: Duration, max_size_bytes: u64) -> Result<PresignedPost> {
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let expiration = (now + chrono::Duration::from_std(ttl).unwrap_or_default())
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();

        let credential = format!(
            "{}/{date_stamp}/{}/s3/aws4_request",
            self.access_key_id, self.region
        );

        let policy = serde_json::json!({
            "expiration": expiration,
            "conditions": [
                {"bucket": self.bucket},
                ["starts-with", "$key", object_key],
                ["content-length-range", 0, max_size_bytes],
                {"x-amz-credential": credential},
                {"x-amz-algorithm": "AWS4-HMAC-SHA256"},
                {"x-amz-date": amz_date},
            ],
        });

        let policy_base64 = STANDARD.encode(serde_json::to_vec(&policy).map_err(Error::from)?);
        let signature = self.sign(&date_stamp, &policy_base64)?;

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), object_key.to_string());
        fields.insert("policy".to_string(), policy_base64);
        fields.insert("x-amz-algorithm".to_string(), "AWS4-HMAC-SHA256".to_string());
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(PresignedPost {
            url: format!("{}/{}", self.endpoint.trim_end_matches('/'), self.bucket),
            fields,
        })
    }

    fn sign(&self, date_stamp: &str, string_to_sign: &str) -> Result<String> {
        let k_date = hmac_bytes(format!("AWS4{}", self.secret_access_key).as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_bytes(&k_date, self.region.as_bytes())?;
        let k_service = hmac_bytes(&k_region, b"s3")?;
        let k_signing = hmac_bytes(&k_service, b"aws4_request")?;
        let signature = hmac_bytes(&k_signing, string_to_sign.as_bytes())?;
        Ok(hex_encode(&signature))
    }
}

fn hmac_bytes(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Internal(format!("invalid hmac key length: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Content hash used by some S3-compatible stores as `x-amz-content-sha256`
/// when proxying a presigned upload through an intermediary.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex_encode(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_form_fields_with_required_keys() {
        let builder = PresignedPostBuilder::new(
            "https://s3.example.com",
            "notevault-bucket",
            "us-east-1",
            "AKIA_TEST",
            "secret",
        );
        let post = builder
            .build("tenant-a/report.pdf", Duration::from_secs(900), 50 * 1024 * 1024)
            .unwrap();

        assert_eq!(post.url, "https://s3.example.com/notevault-bucket");
        assert_eq!(post.fields.get("key").unwrap(), "tenant-a/report.pdf");
        assert!(post.fields.contains_key("policy"));
        assert!(post.fields.contains_key("x-amz-signature"));
        assert_eq!(post.fields.get("x-amz-algorithm").unwrap(), "AWS4-HMAC-SHA256");
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let builder = PresignedPostBuilder::new("https://s3.example.com", "b", "us-east-1", "ak", "sk");
        let signature = builder.sign("20260101", "policy-doc").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
