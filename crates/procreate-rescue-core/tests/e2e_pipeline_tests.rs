mod common;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use filetime::FileTime;
use tempfile::tempdir;
use zip::ZipArchive;

use procreate_rescue_core::descriptor::{self, Descriptor};
use procreate_rescue_core::error::Result;
use procreate_rescue_core::naming;
use procreate_rescue_core::platform::TimestampSetter;
use procreate_rescue_core::{AppConfig, DocumentStatus, Error, RecoveryEngine, SilentReporter};

use common::{create_document, keyed_archive, THUMBNAIL_MTIME};

fn config_for(output: &Path) -> AppConfig {
    AppConfig {
        output_dir: Some(output.to_string_lossy().into_owned()),
        ..AppConfig::default()
    }
}

fn entry_names(bundle: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(bundle).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn read_entry(bundle: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(bundle).unwrap()).unwrap();
    let mut buf = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut buf).unwrap();
    buf
}

fn output_files(dir: &Path) -> HashSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Records calls instead of touching the file system.
#[derive(Default)]
struct RecordingTimestamps {
    calls: Mutex<Vec<(PathBuf, SystemTime, SystemTime)>>,
}

impl TimestampSetter for RecordingTimestamps {
    fn set_times(&self, path: &Path, created: SystemTime, modified: SystemTime) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), created, modified));
        Ok(())
    }
}

struct FailingTimestamps;

impl TimestampSetter for FailingTimestamps {
    fn set_times(&self, path: &Path, _created: SystemTime, _modified: SystemTime) -> Result<()> {
        Err(Error::TimestampRestore {
            path: path.to_path_buf(),
            reason: "not supported".to_string(),
        })
    }
}

#[test]
fn test_single_document_is_rebuilt() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("Application Support");
    let doc = root.join("AB12");
    create_document(&doc, &keyed_archive(Some("MyArt")));
    let out = tmp.path().join("out");

    let expected_token = naming::token_for(naming::source_times(&doc).unwrap().created);
    let expected_name = format!("{}-MyArt", expected_token);

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    assert!(result.all_succeeded());
    assert_eq!(result.documents.len(), 1);
    let outcome = &result.documents[0];
    if creation_time_settable() {
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    }
    let bundle = outcome.output().unwrap().to_path_buf();
    assert_eq!(bundle, out.join(format!("{}.procreate", expected_name)));

    assert_eq!(
        entry_names(&bundle),
        vec![
            "3F2A/",
            "3F2A/0~0.chunk",
            "Document.archive",
            "QuickLook/",
            "QuickLook/Thumbnail.png",
            "video/",
            "video/segments/",
            "video/segments/segment-1.mp4",
        ]
    );
    assert_eq!(read_entry(&bundle, "3F2A/0~0.chunk"), vec![0x5Au8; 2048]);

    // The name inside the bundle matches the file name on disk.
    let packed = Descriptor::from_bytes(&read_entry(&bundle, "Document.archive")).unwrap();
    assert_eq!(packed.name().as_deref(), Some(expected_name.as_str()));

    // The input tree is left as it was.
    assert_eq!(descriptor::read_name(&doc.join("Document.archive")).as_deref(), Some("MyArt"));

    // Modification time comes from the thumbnail.
    let metadata = fs::metadata(&bundle).unwrap();
    assert_eq!(
        FileTime::from_last_modification_time(&metadata).unix_seconds(),
        THUMBNAIL_MTIME
    );
}

fn creation_time_settable() -> bool {
    cfg!(any(target_os = "macos", target_os = "windows"))
}

#[test]
fn test_bundle_carries_source_creation_time() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let doc = root.join("AB12");
    create_document(&doc, &keyed_archive(Some("MyArt")));
    let out = tmp.path().join("out");
    let times = naming::source_times(&doc).unwrap();

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    assert!(result.all_succeeded());
    let outcome = &result.documents[0];
    let metadata = fs::metadata(outcome.output().unwrap()).unwrap();
    assert_eq!(metadata.modified().unwrap(), times.modified);

    if creation_time_settable() {
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(metadata.created().unwrap(), times.created);
    } else {
        assert_eq!(result.summary().done_with_warnings, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(
            outcome.warnings[0].contains("creation time cannot be set"),
            "{:?}",
            outcome.warnings
        );
    }
}

#[test]
fn test_directory_without_descriptor_is_not_a_document() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir_all(root.join("XY99/QuickLook")).unwrap();
    fs::write(root.join("XY99/QuickLook/Thumbnail.png"), b"png").unwrap();
    let out = tmp.path().join("out");

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    let summary = result.summary();
    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.failed, 0);
    assert!(result.all_succeeded());
    assert!(output_files(&out).is_empty());
}

#[test]
fn test_same_base_name_gets_numeric_suffix() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let first = root.join("AAAA");
    let second = root.join("BBBB");
    create_document(&first, &keyed_archive(None));
    create_document(&second, &keyed_archive(Some("Untitled Artwork")));
    let out = tmp.path().join("out");

    let first_token = naming::token_for(naming::source_times(&first).unwrap().created);
    let second_token = naming::token_for(naming::source_times(&second).unwrap().created);

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();
    assert!(result.all_succeeded());

    let expected: HashSet<String> = if first_token == second_token {
        [
            format!("{}.procreate", first_token),
            format!("{}-2.procreate", first_token),
        ]
        .into_iter()
        .collect()
    } else {
        // The two directories were created on either side of a minute boundary.
        [
            format!("{}.procreate", first_token),
            format!("{}.procreate", second_token),
        ]
        .into_iter()
        .collect()
    };
    assert_eq!(output_files(&out), expected);

    for outcome in &result.documents {
        let bundle = outcome.output().unwrap();
        let packed = Descriptor::from_bytes(&read_entry(bundle, "Document.archive")).unwrap();
        let stem = bundle.file_stem().unwrap().to_string_lossy().into_owned();
        assert_eq!(packed.name(), Some(stem));
    }
}

#[test]
fn test_existing_output_is_never_overwritten() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let doc = root.join("AB12");
    create_document(&doc, &keyed_archive(Some("MyArt")));
    let out = tmp.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let token = naming::token_for(naming::source_times(&doc).unwrap().created);
    let taken = out.join(format!("{}-MyArt.procreate", token));
    fs::write(&taken, b"earlier run").unwrap();

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    assert_eq!(fs::read(&taken).unwrap(), b"earlier run");
    assert_eq!(
        result.documents[0].output().unwrap(),
        out.join(format!("{}-MyArt-2.procreate", token))
    );
}

#[test]
fn test_invalid_descriptor_falls_back_to_timestamp_name() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let doc = root.join("BAD1");
    create_document(&doc, b"this is not a property list");
    let out = tmp.path().join("out");

    let token = naming::token_for(naming::source_times(&doc).unwrap().created);

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    let summary = result.summary();
    assert_eq!(summary.done, 1);
    assert_eq!(summary.done_with_warnings, 1);
    assert_eq!(summary.failed, 0);

    let outcome = &result.documents[0];
    assert!(outcome.warnings[0].contains("unreadable"));
    let bundle = outcome.output().unwrap();
    assert_eq!(bundle, out.join(format!("{}.procreate", token)));
    // Packed as found.
    assert_eq!(
        read_entry(bundle, "Document.archive"),
        b"this is not a property list"
    );
}

#[test]
fn test_unpatchable_descriptor_fails_only_that_document() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    create_document(&root.join("GOOD"), &keyed_archive(Some("Keeper")));

    // A keyed archive whose document object is missing.
    let mut archive = plist::Dictionary::new();
    archive.insert(
        "$objects".into(),
        plist::Value::Array(vec![plist::Value::String("$null".into())]),
    );
    let mut broken = Vec::new();
    plist::Value::Dictionary(archive)
        .to_writer_binary(&mut broken)
        .unwrap();
    create_document(&root.join("ODD1"), &broken);
    let out = tmp.path().join("out");

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    let summary = result.summary();
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 1);
    assert!(!result.all_succeeded());

    let failed = result.failures().next().unwrap();
    assert!(failed.source.ends_with("ODD1"));
    assert!(matches!(
        &failed.status,
        DocumentStatus::Failed { reason, .. } if reason.contains("cannot be rewritten")
    ));
    // Only the good document produced a file.
    assert_eq!(output_files(&out).len(), 1);
}

#[test]
fn test_timestamp_failure_is_a_warning() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    create_document(&root.join("AB12"), &keyed_archive(Some("MyArt")));
    let out = tmp.path().join("out");

    let result = RecoveryEngine::new(config_for(&out))
        .with_timestamp_setter(Box::new(FailingTimestamps))
        .run(&root, &SilentReporter)
        .unwrap();

    assert!(result.all_succeeded());
    assert_eq!(result.summary().done_with_warnings, 1);
    assert!(result.documents[0].warnings[0].contains("not supported"));
}

#[test]
fn test_restorer_receives_captured_times() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let doc = root.join("AB12");
    create_document(&doc, &keyed_archive(Some("MyArt")));
    let out = tmp.path().join("out");
    let times = naming::source_times(&doc).unwrap();

    let recorder = std::sync::Arc::new(RecordingTimestamps::default());
    struct Shared(std::sync::Arc<RecordingTimestamps>);
    impl TimestampSetter for Shared {
        fn set_times(&self, path: &Path, created: SystemTime, modified: SystemTime) -> Result<()> {
            self.0.set_times(path, created, modified)
        }
    }

    let result = RecoveryEngine::new(config_for(&out))
        .with_timestamp_setter(Box::new(Shared(recorder.clone())))
        .run(&root, &SilentReporter)
        .unwrap();

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, result.documents[0].output().unwrap());
    assert_eq!(calls[0].1, times.created);
    assert_eq!(calls[0].2, times.modified);
}

#[test]
fn test_nested_documents_and_parallel_run() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    for i in 0..12 {
        let doc = root.join(format!("group{}/nested/DOC{:02}", i % 3, i));
        create_document(&doc, &keyed_archive(Some("Same Name")));
    }
    fs::create_dir_all(root.join("group0/empty")).unwrap();
    let out = tmp.path().join("out");

    let config = AppConfig {
        jobs: 4,
        ..config_for(&out)
    };
    let result = RecoveryEngine::new(config)
        .run(&root, &SilentReporter)
        .unwrap();

    assert_eq!(result.summary().done, 12);
    let names: HashSet<PathBuf> = result
        .documents
        .iter()
        .map(|d| d.output().unwrap().to_path_buf())
        .collect();
    assert_eq!(names.len(), 12);
    assert_eq!(output_files(&out).len(), 12);
}

#[test]
fn test_missing_input_root_is_fatal() {
    let tmp = tempdir().unwrap();
    let err = RecoveryEngine::new(config_for(&tmp.path().join("out")))
        .run(&tmp.path().join("does-not-exist"), &SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::InputRoot { .. }));

    let file = tmp.path().join("file.txt");
    fs::write(&file, b"x").unwrap();
    let err = RecoveryEngine::new(config_for(&tmp.path().join("out")))
        .run(&file, &SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::InputRoot { .. }));
}

#[test]
fn test_rerun_keeps_name_stamped_by_previous_run() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    create_document(&root.join("AB12"), &keyed_archive(Some("24.01.05-09.10 Portrait")));
    let out = tmp.path().join("out");

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    assert_eq!(
        result.documents[0].output().unwrap(),
        out.join("24.01.05-09.10 Portrait.procreate")
    );
}

#[test]
fn test_dot_underscore_files_are_bundled_and_ds_store_is_not() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("root");
    let doc = root.join("AB12");
    create_document(&doc, &keyed_archive(Some("MyArt")));
    fs::write(doc.join("._layerdata"), b"layer bytes").unwrap();
    fs::write(doc.join(".DS_Store"), b"finder junk").unwrap();
    let out = tmp.path().join("out");

    let result = RecoveryEngine::new(config_for(&out))
        .run(&root, &SilentReporter)
        .unwrap();

    let bundle = result.documents[0].output().unwrap().to_path_buf();
    let names = entry_names(&bundle);
    assert!(names.contains(&"._layerdata".to_string()), "{:?}", names);
    assert!(!names.contains(&".DS_Store".to_string()), "{:?}", names);
    assert_eq!(read_entry(&bundle, "._layerdata"), b"layer bytes");
}
