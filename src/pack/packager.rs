use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::epub::{self, LICENSE_FILE};
use crate::error::{LcpError, Result};
use crate::license::License;
use crate::storage::Storage;

/// Produces licensed publications from stored encrypted archives.
pub struct Packager {
    storage: Arc<dyn Storage>,
}

impl Packager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Fetch the archive stored under `location` and embed `license` in it.
    /// The whole archive is assembled in memory.
    #[instrument(skip(self, license), fields(license_id = %license.id))]
    pub fn package(&self, license: &License, location: &str) -> Result<Vec<u8>> {
        let source = self.storage.get(location)?;
        let packaged = inject_license(&source, license)?;
        debug!(source_bytes = source.len(), packaged_bytes = packaged.len(), "Publication packaged");
        Ok(packaged)
    }
}

/// The license as embedded in archives: compact JSON, HTML characters left
/// unescaped, no trailing line break.
pub fn serialize_license(license: &License) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec(license)?;
    while matches!(json.last(), Some(b'\n' | b'\r')) {
        json.pop();
    }
    Ok(json)
}

/// Copy every entry of `source` unchanged and add `license` at
/// [`LICENSE_FILE`]. A license already present in `source` is replaced.
pub fn inject_license(source: &[u8], license: &License) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(source))
        .map_err(|e| LcpError::InvalidContainer(format!("unreadable archive: {e}")))?;
    epub::read(&mut archive).map_err(|e| match e {
        LcpError::InvalidContainer(_) => e,
        other => LcpError::InvalidContainer(other.to_string()),
    })?;

    let payload = serialize_license(license)?;
    let capacity = source.len() + payload.len() + 256;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(capacity)));

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        if file.name() == LICENSE_FILE {
            continue;
        }
        writer.raw_copy_file(file)?;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(LICENSE_FILE, options)?;
    writer.write_all(&payload)?;

    Ok(writer.finish()?.into_inner())
}

/// Read back the license embedded in a packaged publication.
pub fn extract_license(packaged: &[u8]) -> Result<License> {
    let mut archive = ZipArchive::new(Cursor::new(packaged))
        .map_err(|e| LcpError::InvalidContainer(format!("unreadable archive: {e}")))?;
    let mut file = archive.by_name(LICENSE_FILE).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            LcpError::InvalidContainer(format!("no {LICENSE_FILE} entry"))
        }
        other => other.into(),
    })?;

    let mut json = Vec::new();
    file.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_serialize_has_no_trailing_newline() {
        let license = License {
            id: "lic-1".into(),
            provider: "http://a.test/?x=<b>&y".into(),
            ..Default::default()
        };

        let json = serialize_license(&license).unwrap();
        assert_ne!(json.last(), Some(&b'\n'));

        let text = String::from_utf8(json).unwrap();
        assert!(text.contains("<b>&y"));
    }

    #[test]
    fn test_inject_rejects_non_archive() {
        assert!(matches!(
            inject_license(b"plain bytes", &License::default()),
            Err(LcpError::InvalidContainer(_))
        ));
    }
}
