//! # EPUB Containers
//!
//! Reading of zip-based publication containers.
//!
//! ## Components
//! - **reader**: container descriptor scan, package documents, resources, cleartext set
//! - **opf**: package document parser
//! - **xmlenc**: encryption descriptor codec
//!
//! ## Fixed Paths
//! ```text
//! mimetype                  media type marker, never a resource
//! META-INF/container.xml    lists the package documents (root files)
//! META-INF/encryption.xml   optional encryption descriptor
//! META-INF/license.lcpl     reserved license path
//! ```

pub mod opf;
pub mod reader;
pub mod xmlenc;

pub use opf::{ManifestItem, Package};
pub use reader::{read, read_bytes};
pub use xmlenc::Manifest;

/// Media type of a packaged publication
pub const CONTENT_TYPE_EPUB: &str = "application/epub+zip";

pub const MIMETYPE_FILE: &str = "mimetype";
pub const META_INF_DIR: &str = "META-INF";
pub const CONTAINER_FILE: &str = "META-INF/container.xml";
pub const ENCRYPTION_FILE: &str = "META-INF/encryption.xml";
pub const LICENSE_FILE: &str = "META-INF/license.lcpl";

/// One archive entry of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub compressed: bool,
}

/// A parsed container. Built per request and never cached.
#[derive(Debug, Clone, Default)]
pub struct Epub {
    pub packages: Vec<Package>,
    pub resources: Vec<Resource>,
    pub encryption: Option<Manifest>,
    cleartext_resources: Vec<String>,
}

impl Epub {
    /// Sorted, deduplicated paths of the resources left in cleartext.
    pub fn cleartext_resources(&self) -> &[String] {
        &self.cleartext_resources
    }

    pub fn is_cleartext(&self, path: &str) -> bool {
        self.cleartext_resources
            .binary_search_by(|p| p.as_str().cmp(path))
            .is_ok()
    }

    pub fn resource(&self, path: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.path == path)
    }

    pub(crate) fn add_cleartext_resource(&mut self, path: impl Into<String>) {
        self.cleartext_resources.push(path.into());
    }

    pub(crate) fn finalize(&mut self) {
        self.cleartext_resources.sort();
        self.cleartext_resources.dedup();
    }
}

/// Join `href` onto the archive directory `base` and normalize `.`/`..`
/// segments. A base of `.` or `""` means the archive root.
pub fn resolve_path(base: &str, href: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let joined = base.split('/').chain(href.split('/'));

    for segment in joined {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Directory part of an archive path, `.` for top-level entries.
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) if idx > 0 => path[..idx].to_string(),
        _ => String::from("."),
    }
}
