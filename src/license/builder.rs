//! License assembly.
//!
//! Turns a draft into a complete, signed license. The steps always run in
//! this order because each one depends on the previous:
//!
//! 1. select the encryption profile
//! 2. look up the content (the content key is needed below)
//! 3. assign identity and write the publication and status links
//! 4. encrypt the content key, the user fields and the key check
//! 5. sign
//!
//! Nothing is persisted here.

use chrono::{SubsecRound, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{
    encode_base64, License, Link, CONTENT_TYPE_LSD_JSON, REL_HINT, REL_PUBLICATION, REL_STATUS,
};
use crate::epub::CONTENT_TYPE_EPUB;
use crate::error::{constants, LcpError, Result};
use crate::service::ServerContext;
use crate::store::Content;
use crate::utils::crypto::{Crypto, ALGORITHM_SHA256, ALGORITHM_XCHACHA20_POLY1305, KEY_LEN};
use crate::utils::Timer;

pub struct LicenseBuilder<'a> {
    ctx: &'a ServerContext,
    encrypt_user_fields: bool,
}

impl<'a> LicenseBuilder<'a> {
    pub fn new(ctx: &'a ServerContext) -> Self {
        Self {
            ctx,
            encrypt_user_fields: true,
        }
    }

    /// Leave user fields as they are, for licenses whose fields were
    /// encrypted by an earlier build.
    pub fn keep_user_fields(mut self) -> Self {
        self.encrypt_user_fields = false;
        self
    }

    /// Complete and sign `license`. The draft must name its content and carry
    /// the user's passphrase hash; the hash is wiped from the result.
    #[instrument(skip(self, license), fields(content_id = %license.content_id))]
    pub fn build(&self, mut license: License) -> Result<License> {
        let _timer = Timer::start("license_build");
        license.encryption.profile = self.ctx.config.profile_uri().to_string();

        let content = self.ctx.contents.get(&license.content_id).map_err(|e| match e {
            LcpError::NotFound(_) => {
                LcpError::NotFound(format!("content {}", license.content_id))
            }
            other => other,
        })?;

        self.prepare(&mut license);
        self.set_links(&mut license, &content);

        let encrypted = encrypt_fields(&mut license, &content, self.encrypt_user_fields);
        license.clear_user_key_value();
        encrypted?;

        license.signature = Some(self.ctx.signer.sign(&license)?);

        self.ctx.metrics.license_issued();
        debug!(license_id = %license.id, profile = %license.encryption.profile, "License built");
        Ok(license)
    }

    fn prepare(&self, license: &mut License) {
        if license.id.is_empty() {
            license.id = Uuid::new_v4().to_string();
        }
        if license.issued.is_none() {
            license.issued = Some(Utc::now().trunc_subsecs(0));
        }
        if license.provider.is_empty() {
            license.provider = self.ctx.config.provider.clone();
        }

        let defaults = &self.ctx.config.license;
        license.rights.print = license.rights.print.or(defaults.print);
        license.rights.copy = license.rights.copy.or(defaults.copy);
    }

    /// Replace any publication/status/hint links the draft carries.
    fn set_links(&self, license: &mut License, content: &Content) {
        license
            .links
            .retain(|link| ![REL_PUBLICATION, REL_STATUS, REL_HINT].contains(&link.rel.as_str()));

        if let Some(hint) = &self.ctx.config.license.hint_link {
            license.links.push(Link {
                rel: REL_HINT.into(),
                href: hint.clone(),
                media_type: "text/html".into(),
                ..Default::default()
            });
        }

        license.links.push(Link {
            rel: REL_PUBLICATION.into(),
            href: self.ctx.storage.url(&content.location),
            media_type: CONTENT_TYPE_EPUB.into(),
            title: (!content.name.is_empty()).then(|| content.name.clone()),
            length: Some(content.length),
            hash: (!content.sha256.is_empty()).then(|| content.sha256.clone()),
            ..Default::default()
        });

        license.links.push(Link {
            rel: REL_STATUS.into(),
            href: format!(
                "{}/licenses/{}/status",
                self.ctx.config.status.public_base_url.trim_end_matches('/'),
                license.id
            ),
            media_type: CONTENT_TYPE_LSD_JSON.into(),
            ..Default::default()
        });
    }
}

/// Content key and key check go under the user key; user fields listed in
/// `user.encrypted` go under the content key.
fn encrypt_fields(license: &mut License, content: &Content, user_fields: bool) -> Result<()> {
    let user_key = license
        .encryption
        .user_key
        .value
        .as_deref()
        .ok_or_else(|| LcpError::EncryptionError(constants::ERR_MISSING_USER_KEY.into()))?;
    if user_key.len() != KEY_LEN || content.encryption_key.len() != KEY_LEN {
        return Err(LcpError::EncryptionError(
            constants::ERR_INVALID_KEY_LENGTH.into(),
        ));
    }

    let user_crypto = Crypto::new(user_key)?;
    let content_crypto = Crypto::new(&content.encryption_key)?;

    let encrypted_value = encode_base64(&user_crypto.seal(&content.encryption_key)?);
    let key_check = encode_base64(&user_crypto.seal(license.id.as_bytes())?);

    let user = &mut license.user;
    let fields = if user_fields { user.encrypted.as_slice() } else { &[] };
    for field in fields {
        let value = match field.as_str() {
            "email" => &mut user.email,
            "name" => &mut user.name,
            _ => continue,
        };
        if !value.is_empty() {
            *value = encode_base64(&content_crypto.seal(value.as_bytes())?);
        }
    }

    let encryption = &mut license.encryption;
    encryption.content_key.algorithm = ALGORITHM_XCHACHA20_POLY1305.into();
    encryption.content_key.encrypted_value = encrypted_value;
    encryption.user_key.algorithm = ALGORITHM_SHA256.into();
    encryption.user_key.key_check = key_check;
    Ok(())
}
