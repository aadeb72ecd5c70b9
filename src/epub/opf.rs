//! Package document (OPF) parser.
//!
//! Only the parts the license server needs: a handful of metadata fields, the
//! manifest and the spine. Unknown elements are skipped.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{constants, LcpError, Result};

/// Media type of the legacy NCX navigation document
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: String,
}

impl ManifestItem {
    /// Whether the whitespace-separated `properties` attribute contains `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.split_whitespace().any(|p| p == property)
    }

    /// Items a reading system must open before it has the content key.
    pub fn is_cleartext(&self) -> bool {
        self.has_property("cover-image")
            || self.has_property("nav")
            || self.media_type == NCX_MEDIA_TYPE
    }
}

/// A parsed package document. `base_path` is the directory of the root file
/// inside the container, `.` when it sits at the archive root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub base_path: String,
    pub version: Option<String>,
    pub metadata: Metadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<String>,
}

#[derive(Clone, Copy)]
enum MetaField {
    Identifier,
    Title,
    Language,
}

impl Package {
    /// Parse a package document from raw bytes.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);

        let mut package = Package::default();
        let mut seen_root = false;
        let mut in_metadata = false;
        let mut field: Option<MetaField> = None;
        let mut text = String::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"package" => {
                        seen_root = true;
                        package.version = attribute(e, b"version")?;
                    }
                    b"metadata" => in_metadata = true,
                    b"identifier" if in_metadata => field = Some(MetaField::Identifier),
                    b"title" if in_metadata => field = Some(MetaField::Title),
                    b"language" if in_metadata => field = Some(MetaField::Language),
                    b"item" => package.manifest.push(manifest_item(e)?),
                    b"itemref" => {
                        if let Some(idref) = attribute(e, b"idref")? {
                            package.spine.push(idref);
                        }
                    }
                    _ => {}
                },
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"item" => package.manifest.push(manifest_item(e)?),
                    b"itemref" => {
                        if let Some(idref) = attribute(e, b"idref")? {
                            package.spine.push(idref);
                        }
                    }
                    _ => {}
                },
                Event::Text(ref t) if field.is_some() => {
                    text.push_str(&String::from_utf8_lossy(t));
                }
                // entity references arrive between text chunks
                Event::GeneralRef(ref r) if field.is_some() => match r.resolve_char_ref()? {
                    Some(ch) => text.push(ch),
                    None => {
                        let name = String::from_utf8_lossy(r);
                        match resolve_predefined_entity(&name) {
                            Some(value) => text.push_str(value),
                            None => {
                                text.push('&');
                                text.push_str(&name);
                                text.push(';');
                            }
                        }
                    }
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"metadata" => in_metadata = false,
                    b"identifier" | b"title" | b"language" => {
                        if let Some(current) = field.take() {
                            let slot = match current {
                                MetaField::Identifier => &mut package.metadata.identifier,
                                MetaField::Title => &mut package.metadata.title,
                                MetaField::Language => &mut package.metadata.language,
                            };
                            // first occurrence wins
                            if slot.is_none() {
                                *slot = Some(text.trim().to_string());
                            }
                        }
                        text.clear();
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(LcpError::InvalidContainer(
                constants::ERR_MISSING_PACKAGE_ROOT.into(),
            ));
        }

        Ok(package)
    }

    pub fn item_by_id(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Archive path of a manifest item, anchored at the package's base path.
    pub fn resolve(&self, href: &str) -> String {
        super::resolve_path(&self.base_path, href)
    }
}

fn manifest_item(e: &BytesStart<'_>) -> Result<ManifestItem> {
    Ok(ManifestItem {
        id: attribute(e, b"id")?.unwrap_or_default(),
        href: attribute(e, b"href")?.unwrap_or_default(),
        media_type: attribute(e, b"media-type")?.unwrap_or_default(),
        properties: attribute(e, b"properties")?.unwrap_or_default(),
    })
}

/// Unescaped value of the attribute whose local name is `name`.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| LcpError::Xml(err.to_string()))?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}
