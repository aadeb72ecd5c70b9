#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::hint::black_box;
use std::io::{Cursor, Write};

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion};
use lcp_core::config::LcpConfig;
use lcp_core::core::codec::{encode_value, CommandCodec, Frame};
use lcp_core::epub;
use lcp_core::license::{License, LicenseBuilder, LicenseSigner, UserInfo};
use lcp_core::pack::inject_license;
use lcp_core::protocol::AuthAndLicense;
use lcp_core::service::ServerContext;
use lcp_core::store::Content;
use lcp_core::utils::crypto::{random_key, user_key_from_passphrase};
use tokio_util::codec::Decoder;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn sample_epub(chapters: usize) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("mimetype", options).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    writer.start_file("META-INF/container.xml", options).unwrap();
    writer
        .write_all(br#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#)
        .unwrap();

    let mut opf = String::from(r#"<package version="3.0"><manifest>"#);
    for i in 0..chapters {
        opf.push_str(&format!(
            r#"<item id="c{i}" href="c{i}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
    }
    opf.push_str("</manifest></package>");
    writer.start_file("content.opf", options).unwrap();
    writer.write_all(opf.as_bytes()).unwrap();

    for i in 0..chapters {
        writer.start_file(format!("c{i}.xhtml"), options).unwrap();
        writer.write_all(&vec![b'x'; 16 * 1024]).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn context() -> ServerContext {
    let ctx = ServerContext::in_memory(LcpConfig::default(), LicenseSigner::generate());
    ctx.contents
        .add(Content {
            id: "book".into(),
            encryption_key: random_key().to_vec(),
            location: "book".into(),
            length: 0,
            sha256: String::new(),
            name: "book.epub".into(),
        })
        .unwrap();
    ctx
}

fn draft() -> License {
    License::draft(
        "book",
        UserInfo {
            id: "user".into(),
            email: "reader@example.test".into(),
            encrypted: vec!["email".into()],
            ..Default::default()
        },
        &user_key_from_passphrase("passphrase"),
        "hint",
    )
}

fn bench_build(c: &mut Criterion) {
    let ctx = context();
    c.bench_function("license_build", |b| {
        b.iter(|| LicenseBuilder::new(&ctx).build(black_box(draft())).unwrap())
    });
}

fn bench_container(c: &mut Criterion) {
    let data = sample_epub(50);
    c.bench_function("container_read_50_chapters", |b| {
        b.iter(|| epub::read_bytes(black_box(&data)).unwrap())
    });

    let ctx = context();
    let license = LicenseBuilder::new(&ctx).build(draft()).unwrap();
    c.bench_function("inject_license_50_chapters", |b| {
        b.iter(|| inject_license(black_box(&data), &license).unwrap())
    });
}

fn bench_codec(c: &mut Criterion) {
    let ctx = context();
    let license = LicenseBuilder::new(&ctx).build(draft()).unwrap();
    let payload = encode_value(&AuthAndLicense::new("peer", "secret", license)).unwrap();
    let mut wire = BytesMut::from(&b"UPDATELICENSE\n"[..]);
    wire.extend_from_slice(&payload);

    c.bench_function("decode_update_license", |b| {
        b.iter(|| {
            let mut codec = CommandCodec::server();
            let mut buf = wire.clone();
            let token = codec.decode(&mut buf).unwrap();
            let value = codec.decode(&mut buf).unwrap();
            assert!(matches!(token, Some(Frame::Token(_))));
            black_box(value)
        })
    });
}

criterion_group!(benches, bench_build, bench_container, bench_codec);
criterion_main!(benches);
