#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use lcp_core::config::{Credentials, LcpConfig};
use lcp_core::license::{License, LicenseSigner, UserInfo};
use lcp_core::service::ServerContext;
use lcp_core::store::Content;
use lcp_core::utils::crypto::{random_key, sha256, user_key_from_passphrase};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PASSPHRASE: &str = "correct horse battery staple";

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Test Book</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover" href="images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
  </spine>
</package>"#;

pub const ENCRYPTION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container"
    xmlns:enc="http://www.w3.org/2001/04/xmlenc#"
    xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes256-cbc"/>
    <ds:KeyInfo>
      <ds:RetrievalMethod URI="license.lcpl#/encryption/content_key"
          Type="http://readium.org/2014/01/lcp#EncryptedContentKey"/>
    </ds:KeyInfo>
    <enc:CipherData>
      <enc:CipherReference URI="OEBPS/text/chapter1.xhtml"/>
    </enc:CipherData>
  </enc:EncryptedData>
</encryption>"#;

/// A small encrypted-looking publication. `extra` entries are appended as is.
pub fn build_epub(with_encryption: bool, extra: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();

    writer.start_file("META-INF/container.xml", deflated).unwrap();
    writer.write_all(CONTAINER_XML.as_bytes()).unwrap();

    if with_encryption {
        writer.start_file("META-INF/encryption.xml", deflated).unwrap();
        writer.write_all(ENCRYPTION_XML.as_bytes()).unwrap();
    }

    let files: [(&str, &[u8]); 5] = [
        ("OEBPS/content.opf", CONTENT_OPF.as_bytes()),
        ("OEBPS/nav.xhtml", &b"<html><nav/></html>"[..]),
        ("OEBPS/images/cover.jpg", &[0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3][..]),
        ("OEBPS/toc.ncx", &b"<ncx/>"[..]),
        ("OEBPS/text/chapter1.xhtml", &[0x9cu8, 0x11, 0x42, 0x00, 0x7f][..]),
    ];
    for (name, data) in files.iter().chain(extra.iter()) {
        writer.start_file(*name, deflated).unwrap();
        writer.write_all(data).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

pub fn config() -> LcpConfig {
    LcpConfig::default_with_overrides(|c| {
        c.server.auth = Credentials::new("peer", "secret");
        c.public_base_url = "http://files.test".into();
        c.status.public_base_url = "http://status.test".into();
    })
}

pub fn context_with(config: LcpConfig) -> Arc<ServerContext> {
    Arc::new(ServerContext::in_memory(config, LicenseSigner::generate()))
}

/// Register `epub` as content `id` directly in the stores.
pub fn register_content(ctx: &ServerContext, id: &str, epub: &[u8]) -> Vec<u8> {
    let key = random_key().to_vec();
    ctx.storage.put(id, &mut &epub[..]).unwrap();
    ctx.contents
        .add(Content {
            id: id.into(),
            encryption_key: key.clone(),
            location: id.into(),
            length: epub.len() as u64,
            sha256: hex::encode(sha256(epub)),
            name: format!("{id}.epub"),
        })
        .unwrap();
    key
}

pub fn draft(content_id: &str) -> License {
    License::draft(
        content_id,
        UserInfo {
            id: "user-1".into(),
            email: "reader@example.test".into(),
            name: "A. Reader".into(),
            encrypted: vec!["email".into(), "name".into()],
        },
        &user_key_from_passphrase(PASSPHRASE),
        "the usual one",
    )
}
