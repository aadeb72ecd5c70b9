//! License document model.
//!
//! The JSON form of [`License`] is what gets signed and embedded in packaged
//! publications, so field order and `skip_serializing_if` rules here define
//! the signed bytes.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{LcpError, Result};
use crate::utils::crypto::Crypto;

/// Media type of a license document
pub const CONTENT_TYPE_LCP_JSON: &str = "application/vnd.readium.lcp.license.v1.0+json";

/// Media type of a license status document
pub const CONTENT_TYPE_LSD_JSON: &str = "application/vnd.readium.license.status.v1.0+json";

pub const REL_PUBLICATION: &str = "publication";
pub const REL_STATUS: &str = "status";
pub const REL_HINT: &str = "hint";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKey {
    pub algorithm: String,
    pub encrypted_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    pub algorithm: String,
    pub text_hint: String,
    pub key_check: String,
    /// Passphrase hash supplied with a draft. Used to encrypt, then wiped;
    /// never serialized.
    #[serde(skip)]
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    pub profile: String,
    pub content_key: ContentKey,
    pub user_key: UserKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Names of the fields above that are stored encrypted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encrypted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm: String,
    pub certificate: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub content_id: String,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub encryption: Encryption,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub rights: Rights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl License {
    /// A draft ready for the builder: which content, for whom, and the
    /// user's passphrase hash.
    pub fn draft(
        content_id: impl Into<String>,
        user: UserInfo,
        passphrase_hash: &[u8],
        text_hint: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            user,
            encryption: Encryption {
                user_key: UserKey {
                    text_hint: text_hint.into(),
                    value: Some(passphrase_hash.to_vec()),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    /// The exact bytes covered by the signature: the JSON document without
    /// its `signature` member.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        if self.signature.is_none() {
            return Ok(serde_json::to_vec(self)?);
        }
        let mut unsigned = self.clone();
        unsigned.signature = None;
        Ok(serde_json::to_vec(&unsigned)?)
    }

    /// Replace every field with the incoming values except `id` and
    /// `content_id`. The signature is carried over as sent, not recomputed.
    pub fn update(&mut self, incoming: License) {
        let id = std::mem::take(&mut self.id);
        let content_id = std::mem::take(&mut self.content_id);
        let updated = incoming.updated.unwrap_or_else(Utc::now);

        *self = License {
            id,
            content_id,
            updated: Some(updated),
            ..incoming
        };
    }

    /// Wipe the passphrase hash carried by a draft.
    pub fn clear_user_key_value(&mut self) {
        if let Some(mut value) = self.encryption.user_key.value.take() {
            value.zeroize();
        }
    }

    /// Recover the content key with the user key, as a reading system does.
    pub fn decrypt_content_key(&self, user_key: &[u8]) -> Result<Vec<u8>> {
        let sealed = decode_base64(&self.encryption.content_key.encrypted_value)?;
        Crypto::new(user_key)?.open(&sealed)
    }

    /// Whether `user_key` opens the key check and yields this license's id.
    pub fn check_user_key(&self, user_key: &[u8]) -> bool {
        let Ok(sealed) = decode_base64(&self.encryption.user_key.key_check) else {
            return false;
        };
        match Crypto::new(user_key).and_then(|crypto| crypto.open(&sealed)) {
            Ok(plain) => plain == self.id.as_bytes(),
            Err(_) => false,
        }
    }
}

pub(crate) fn encode_base64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

pub(crate) fn decode_base64(data: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| LcpError::EncryptionError(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn sample() -> License {
        License {
            id: "lic-1".into(),
            content_id: "content-1".into(),
            provider: "http://provider.test".into(),
            links: vec![Link {
                rel: REL_STATUS.into(),
                href: "http://status.test/licenses/lic-1/status".into(),
                media_type: CONTENT_TYPE_LSD_JSON.into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_link_type_field_name() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains(r#""type":"application/vnd.readium.license.status.v1.0+json""#));
        assert!(!json.contains("signature"));
    }

    #[test]
    fn test_user_key_value_never_serialized() {
        let mut license = sample();
        license.encryption.user_key.value = Some(vec![1, 2, 3]);
        let json = serde_json::to_string(&license).unwrap();
        assert!(!json.contains("value\":[1"));
    }

    #[test]
    fn test_signing_bytes_ignore_signature() {
        let unsigned = sample();
        let mut signed = sample();
        signed.signature = Some(Signature {
            algorithm: "alg".into(),
            certificate: "cert".into(),
            value: "sig".into(),
        });

        assert_eq!(unsigned.signing_bytes().unwrap(), signed.signing_bytes().unwrap());
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut stored = sample();
        let mut incoming = sample();
        incoming.id = "other".into();
        incoming.content_id = "other-content".into();
        incoming.provider = "http://new-provider.test".into();
        incoming.rights.print = Some(10);

        stored.update(incoming);

        assert_eq!(stored.id, "lic-1");
        assert_eq!(stored.content_id, "content-1");
        assert_eq!(stored.provider, "http://new-provider.test");
        assert_eq!(stored.rights.print, Some(10));
        assert!(stored.updated.is_some());
    }
}
