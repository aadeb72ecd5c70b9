use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use zip::ZipArchive;

use super::ServerContext;
use crate::epub;
use crate::error::{constants, LcpError, Result};
use crate::protocol::message::ContentPayload;
use crate::store::Content;
use crate::utils::crypto::KEY_LEN;
use crate::utils::Timer;

/// Registration of encrypted publications.
pub struct ContentService {
    ctx: Arc<ServerContext>,
}

impl ContentService {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// Verify, store and record an encrypted publication. Inline archive
    /// bytes are spooled to a temporary file first; nothing is recorded
    /// unless every check passes.
    #[instrument(skip(self, payload), fields(content_id = %payload.content_id))]
    pub fn add_content(&self, payload: ContentPayload) -> Result<Content> {
        let _timer = Timer::start("add_content");
        if payload.content_id.is_empty() {
            return Err(LcpError::StorageError("content id cannot be empty".into()));
        }
        if payload.content_key.len() != KEY_LEN {
            return Err(LcpError::EncryptionError(
                constants::ERR_INVALID_KEY_LENGTH.into(),
            ));
        }

        let mut file = match &payload.path {
            Some(path) if payload.data.is_empty() => File::open(path)
                .map_err(|e| LcpError::StorageError(format!("{path}: {e}")))?,
            _ => {
                let mut spool = tempfile::tempfile()?;
                spool.write_all(&payload.data)?;
                spool
            }
        };

        file.seek(SeekFrom::Start(0))?;
        let (length, digest) = measure(&mut file)?;

        if payload.size.is_some_and(|size| size != length) {
            return Err(LcpError::StorageError(format!(
                "{} (expected {:?}, got {length})",
                constants::ERR_SIZE_MISMATCH,
                payload.size
            )));
        }
        if let Some(expected) = &payload.sha256 {
            if !expected.eq_ignore_ascii_case(&digest) {
                return Err(LcpError::StorageError(
                    constants::ERR_CHECKSUM_MISMATCH.into(),
                ));
            }
        }

        file.seek(SeekFrom::Start(0))?;
        let mut archive = ZipArchive::new(&mut file)
            .map_err(|e| LcpError::InvalidContainer(format!("unreadable archive: {e}")))?;
        epub::read(&mut archive)?;
        drop(archive);

        file.seek(SeekFrom::Start(0))?;
        let location = payload.content_id.clone();
        self.ctx.storage.put(&location, &mut file)?;

        let name = if payload.name.is_empty() {
            format!("{}.epub", payload.content_id)
        } else {
            payload.name
        };
        let content = Content {
            id: payload.content_id,
            encryption_key: payload.content_key,
            location,
            length,
            sha256: digest,
            name,
        };
        self.ctx.contents.add(content.clone())?;

        info!(length, "Content registered");
        Ok(content)
    }
}

/// Byte length and hex SHA-256 of everything `reader` yields.
fn measure(reader: &mut impl Read) -> Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let length = io::copy(reader, &mut hasher)?;
    Ok((length, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::config::LcpConfig;
    use crate::license::LicenseSigner;
    use crate::utils::crypto::random_key;

    fn service() -> (ContentService, Arc<ServerContext>) {
        let ctx = Arc::new(ServerContext::in_memory(
            LcpConfig::default(),
            LicenseSigner::generate(),
        ));
        (ContentService::new(ctx.clone()), ctx)
    }

    fn payload(data: Vec<u8>) -> ContentPayload {
        ContentPayload {
            content_id: "c1".into(),
            content_key: random_key().to_vec(),
            name: String::new(),
            data,
            path: None,
            size: None,
            sha256: None,
        }
    }

    #[test]
    fn test_rejects_short_key() {
        let (service, _) = service();
        let mut payload = payload(vec![1, 2, 3]);
        payload.content_key = vec![0; 16];
        assert!(matches!(
            service.add_content(payload),
            Err(LcpError::EncryptionError(_))
        ));
    }

    #[test]
    fn test_rejects_non_archive_without_recording() {
        let (service, ctx) = service();
        assert!(matches!(
            service.add_content(payload(b"not a zip".to_vec())),
            Err(LcpError::InvalidContainer(_))
        ));
        assert!(ctx.contents.get("c1").is_err());
    }

    #[test]
    fn test_checksum_mismatch() {
        let (service, _) = service();
        let mut payload = payload(b"whatever".to_vec());
        payload.sha256 = Some("00".into());
        assert!(matches!(
            service.add_content(payload),
            Err(LcpError::StorageError(_))
        ));
    }

    #[test]
    fn test_measure() {
        let (length, digest) = measure(&mut &b"abc"[..]).unwrap();
        assert_eq!(length, 3);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
