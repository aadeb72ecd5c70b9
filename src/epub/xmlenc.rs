//! Encryption descriptor (`META-INF/encryption.xml`) codec.
//!
//! The descriptor lists every content-encrypted resource with its algorithm,
//! where to find the key and, optionally, how the plaintext was compressed
//! before encryption.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::opf::attribute;
use crate::error::{LcpError, Result};

const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";
const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const COMPRESSION_NS: &str = "http://www.idpf.org/2016/encryption#compression";

/// Reference to the key that decrypts a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub uri: String,
    pub kind: Option<String>,
}

/// Compression applied before encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub method: u16,
    pub original_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub uri: String,
    pub algorithm: String,
    pub key_info: Option<KeyInfo>,
    pub compression: Option<Compression>,
}

/// Resource path → encryption entry, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, EncryptedData>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an encryption descriptor. Unknown elements are ignored.
    pub fn read(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut manifest = Manifest::new();
        let mut current: Option<EncryptedData> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = e.local_name();
                    if name.as_ref() == b"EncryptedData" {
                        current = Some(EncryptedData {
                            uri: String::new(),
                            algorithm: String::new(),
                            key_info: None,
                            compression: None,
                        });
                    } else if let Some(data) = current.as_mut() {
                        apply_child(data, e)?;
                    }
                }
                Event::End(ref e) if e.local_name().as_ref() == b"EncryptedData" => {
                    if let Some(data) = current.take() {
                        if data.uri.is_empty() {
                            return Err(LcpError::InvalidContainer(
                                "EncryptedData without CipherReference".into(),
                            ));
                        }
                        manifest.insert(data);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(manifest)
    }

    pub fn insert(&mut self, data: EncryptedData) {
        self.entries.insert(data.uri.clone(), data);
    }

    pub fn get(&self, path: &str) -> Option<&EncryptedData> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncryptedData> {
        self.entries.values()
    }

    /// Serialize back to an encryption descriptor document.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("encryption");
        root.push_attribute(("xmlns", CONTAINER_NS));
        root.push_attribute(("xmlns:enc", XMLENC_NS));
        root.push_attribute(("xmlns:ds", XMLDSIG_NS));
        writer.write_event(Event::Start(root))?;

        for data in self.entries.values() {
            writer.write_event(Event::Start(BytesStart::new("enc:EncryptedData")))?;

            let mut method = BytesStart::new("enc:EncryptionMethod");
            method.push_attribute(("Algorithm", data.algorithm.as_str()));
            writer.write_event(Event::Empty(method))?;

            if let Some(key_info) = &data.key_info {
                writer.write_event(Event::Start(BytesStart::new("ds:KeyInfo")))?;
                let mut retrieval = BytesStart::new("ds:RetrievalMethod");
                retrieval.push_attribute(("URI", key_info.uri.as_str()));
                if let Some(kind) = &key_info.kind {
                    retrieval.push_attribute(("Type", kind.as_str()));
                }
                writer.write_event(Event::Empty(retrieval))?;
                writer.write_event(Event::End(BytesEnd::new("ds:KeyInfo")))?;
            }

            writer.write_event(Event::Start(BytesStart::new("enc:CipherData")))?;
            let mut reference = BytesStart::new("enc:CipherReference");
            reference.push_attribute(("URI", data.uri.as_str()));
            writer.write_event(Event::Empty(reference))?;
            writer.write_event(Event::End(BytesEnd::new("enc:CipherData")))?;

            if let Some(compression) = data.compression {
                writer.write_event(Event::Start(BytesStart::new("enc:EncryptionProperties")))?;
                let mut property = BytesStart::new("enc:EncryptionProperty");
                property.push_attribute(("xmlns:ns", COMPRESSION_NS));
                writer.write_event(Event::Start(property))?;

                let method = compression.method.to_string();
                let length = compression.original_length.to_string();
                let mut element = BytesStart::new("ns:Compression");
                element.push_attribute(("Method", method.as_str()));
                element.push_attribute(("OriginalLength", length.as_str()));
                writer.write_event(Event::Empty(element))?;

                writer.write_event(Event::End(BytesEnd::new("enc:EncryptionProperty")))?;
                writer.write_event(Event::End(BytesEnd::new("enc:EncryptionProperties")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("enc:EncryptedData")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("encryption")))?;
        Ok(writer.into_inner().into_inner())
    }
}

fn apply_child(data: &mut EncryptedData, e: &BytesStart<'_>) -> Result<()> {
    match e.local_name().as_ref() {
        b"EncryptionMethod" => {
            data.algorithm = attribute(e, b"Algorithm")?.unwrap_or_default();
        }
        b"RetrievalMethod" => {
            if let Some(uri) = attribute(e, b"URI")? {
                data.key_info = Some(KeyInfo {
                    uri,
                    kind: attribute(e, b"Type")?,
                });
            }
        }
        b"CipherReference" => {
            data.uri = attribute(e, b"URI")?.unwrap_or_default();
        }
        b"Compression" => {
            let method = attribute(e, b"Method")?
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            let original_length = attribute(e, b"OriginalLength")?
                .and_then(|l| l.parse().ok())
                .unwrap_or(0);
            data.compression = Some(Compression {
                method,
                original_length,
            });
        }
        _ => {}
    }
    Ok(())
}
