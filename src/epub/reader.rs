//! Container reader.
//!
//! Turns a zip archive into an [`Epub`]: the package documents declared by
//! `META-INF/container.xml`, the resource list, the optional encryption
//! descriptor and the set of resources that must stay in cleartext.
//! Any failure aborts the whole read.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument};
use zip::{CompressionMethod, ZipArchive};

use super::opf::{attribute, Package};
use super::xmlenc::Manifest;
use super::{
    parent_dir, Epub, Resource, CONTAINER_FILE, ENCRYPTION_FILE, META_INF_DIR, MIMETYPE_FILE,
};
use crate::error::{constants, LcpError, Result};

/// A `rootfile` declaration from the container descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Scanner states for the container descriptor. The scan stops at the end
/// of the `rootfiles` element, whatever markup follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    Done,
}

/// Collect the root file declarations of a container descriptor.
pub fn find_root_files(xml: &[u8]) -> Result<Vec<RootFile>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut state = ScanState::Seeking;
    let mut buf = Vec::new();

    while state == ScanState::Seeking {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"rootfile" => {
                let full_path = attribute(e, b"full-path")?.unwrap_or_default();
                if full_path.is_empty() {
                    return Err(LcpError::InvalidContainer(
                        "rootfile without full-path".into(),
                    ));
                }
                roots.push(RootFile {
                    full_path,
                    media_type: attribute(e, b"media-type")?.unwrap_or_default(),
                });
            }
            Event::End(ref e) if e.local_name().as_ref() == b"rootfiles" => {
                state = ScanState::Done;
            }
            Event::Eof => state = ScanState::Done,
            _ => {}
        }
        buf.clear();
    }

    Ok(roots)
}

/// Read a container from raw archive bytes.
pub fn read_bytes(data: &[u8]) -> Result<Epub> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| LcpError::InvalidContainer(format!("unreadable archive: {e}")))?;
    read(&mut archive)
}

/// Read a container from an open archive.
#[instrument(skip(archive), fields(entries = archive.len()))]
pub fn read<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Epub> {
    let mut epub = Epub::default();

    let descriptor = read_entry(archive, CONTAINER_FILE)?
        .ok_or_else(|| LcpError::InvalidContainer(constants::ERR_MISSING_CONTAINER.into()))?;
    let root_files = find_root_files(&descriptor)
        .map_err(|e| LcpError::InvalidContainer(format!("{CONTAINER_FILE}: {e}")))?;

    for root_file in &root_files {
        // package documents are never content-encrypted
        epub.add_cleartext_resource(root_file.full_path.clone());

        let document = read_entry(archive, &root_file.full_path)?.ok_or_else(|| {
            LcpError::InvalidContainer(format!("missing package document {}", root_file.full_path))
        })?;
        let mut package = Package::parse(&document)
            .map_err(|e| LcpError::InvalidContainer(format!("{}: {e}", root_file.full_path)))?;
        package.base_path = parent_dir(&root_file.full_path);

        for item in package.manifest.iter().filter(|item| item.is_cleartext()) {
            epub.add_cleartext_resource(package.resolve(&item.href));
        }

        epub.packages.push(package);
    }

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        let name = file.name().to_string();

        if name != ENCRYPTION_FILE && name != MIMETYPE_FILE {
            epub.resources.push(Resource {
                path: name.clone(),
                size: file.size(),
                compressed_size: file.compressed_size(),
                crc32: file.crc32(),
                compressed: file.compression() != CompressionMethod::Stored,
            });
        }

        if name.starts_with(META_INF_DIR) {
            epub.add_cleartext_resource(name);
        }
    }

    // an unencrypted container has no descriptor
    if let Some(descriptor) = read_entry(archive, ENCRYPTION_FILE)? {
        let manifest = Manifest::read(&descriptor)
            .map_err(|e| LcpError::InvalidContainer(format!("{ENCRYPTION_FILE}: {e}")))?;
        epub.encryption = Some(manifest);
    }

    epub.finalize();

    debug!(
        packages = epub.packages.len(),
        resources = epub.resources.len(),
        cleartext = epub.cleartext_resources().len(),
        encrypted = epub.encryption.as_ref().map(Manifest::len).unwrap_or(0),
        "Container read"
    );

    Ok(epub)
}

/// Full contents of the entry `name`, or `None` when the archive has no such entry.
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut contents = Vec::with_capacity(prealloc_len(file.size()));
    file.read_to_end(&mut contents)?;
    Ok(Some(contents))
}

/// Upfront buffer for an entry whose header declares `declared` bytes.
/// Header sizes are untrusted; larger entries grow while reading.
fn prealloc_len(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |len| len.min(MAX_PREALLOC))
}

const MAX_PREALLOC: usize = 1024 * 1024;
