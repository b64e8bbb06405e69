#![allow(dead_code)]

use filetime::FileTime;
use plist::{Dictionary, Uid, Value};
use std::fs;
use std::path::Path;

/// 2025-11-21 14:32:00 UTC
pub const THUMBNAIL_MTIME: i64 = 1_763_735_520;

/// Minimal `NSKeyedArchiver` descriptor shaped like the ones Procreate writes.
pub fn keyed_archive(name: Option<&str>) -> Vec<u8> {
    let mut document = Dictionary::new();
    document.insert("$class".into(), Value::Uid(Uid::new(2)));
    document.insert("orientation".into(), Value::Integer(1i64.into()));
    document.insert("SilicaDocumentArchiveDPIKey".into(), Value::Real(132.0));

    let mut class = Dictionary::new();
    class.insert("$classname".into(), Value::String("SilicaDocument".into()));
    class.insert(
        "$classes".into(),
        Value::Array(vec![
            Value::String("SilicaDocument".into()),
            Value::String("NSObject".into()),
        ]),
    );

    let mut objects = vec![
        Value::String("$null".into()),
        Value::Dictionary(document),
        Value::Dictionary(class),
    ];
    let name_uid = match name {
        Some(name) => {
            objects.push(Value::String(name.into()));
            Uid::new(3)
        }
        None => Uid::new(0),
    };
    if let Some(Value::Dictionary(document)) = objects.get_mut(1) {
        document.insert("name".into(), Value::Uid(name_uid));
    }

    let mut top = Dictionary::new();
    top.insert("root".into(), Value::Uid(Uid::new(1)));

    let mut archive = Dictionary::new();
    archive.insert("$archiver".into(), Value::String("NSKeyedArchiver".into()));
    archive.insert("$version".into(), Value::Integer(100000i64.into()));
    archive.insert("$top".into(), Value::Dictionary(top));
    archive.insert("$objects".into(), Value::Array(objects));

    let mut buf = Vec::new();
    Value::Dictionary(archive).to_writer_binary(&mut buf).unwrap();
    buf
}

/// Lay out a document directory:
///   dir/
///     Document.archive
///     QuickLook/Thumbnail.png   (mtime pinned to THUMBNAIL_MTIME)
///     video/segments/segment-1.mp4
///     3F2A/0~0.chunk
pub fn create_document(dir: &Path, descriptor: &[u8]) {
    fs::create_dir_all(dir.join("QuickLook")).unwrap();
    fs::create_dir_all(dir.join("video/segments")).unwrap();
    fs::create_dir_all(dir.join("3F2A")).unwrap();
    fs::write(dir.join("Document.archive"), descriptor).unwrap();
    fs::write(dir.join("video/segments/segment-1.mp4"), b"mp4 bytes").unwrap();
    fs::write(dir.join("3F2A/0~0.chunk"), vec![0x5Au8; 2048]).unwrap();
    let thumbnail = dir.join("QuickLook/Thumbnail.png");
    fs::write(&thumbnail, b"\x89PNG thumbnail").unwrap();
    filetime::set_file_mtime(&thumbnail, FileTime::from_unix_time(THUMBNAIL_MTIME, 0)).unwrap();
}
