use std::fs::File;
use std::io::{Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use sevenz_rust::{SeqReader, SevenZArchiveEntry, SevenZWriter, SourceReader};
use unarc_archive::{
    ArchiveFormat, ArchiveReader, EntryPolicy, EntrySource, Error, Layout, OpenOptions,
};
use zip::write::SimpleFileOptions;

fn write_zip(dir: &Path, name: &str, members: &[(&str, Option<&[u8]>)]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = zip::ZipWriter::new(File::create(&path).expect("create zip"));
    let options = SimpleFileOptions::default();
    for (member, content) in members {
        match content {
            Some(bytes) => {
                writer.start_file(*member, options).expect("start file");
                writer.write_all(bytes).expect("write member");
            }
            None => writer.add_directory(*member, options).expect("add directory"),
        }
    }
    writer.finish().expect("finish zip");
    path
}

/// Directories first, then every file packed into one solid block.
fn write_7z(dir: &Path, name: &str, dirs: &[&str], files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = SevenZWriter::create(&path).expect("create 7z");
    for dir in dirs {
        let mut entry = SevenZArchiveEntry::new();
        entry.name = dir.to_string();
        entry.is_directory = true;
        writer.push_archive_entry::<&[u8]>(entry, None).expect("add directory");
    }

    let mut entries = Vec::new();
    let mut readers = Vec::new();
    for (member, content) in files {
        let mut entry = SevenZArchiveEntry::new();
        entry.name = member.to_string();
        entry.has_stream = !content.is_empty();
        if content.is_empty() {
            writer.push_archive_entry::<&[u8]>(entry, None).expect("add empty file");
        } else {
            entries.push(entry);
            readers.push(SourceReader::from(*content));
        }
    }
    if !entries.is_empty() {
        writer
            .push_archive_entries(entries, SeqReader::new(readers))
            .expect("add solid block");
    }
    writer.finish().expect("finish 7z");
    path
}

fn read_all<S: EntrySource>(source: &mut S) -> Vec<(String, Vec<u8>)> {
    let mut seen = Vec::new();
    source
        .for_each_entry(|entry, content| {
            let mut bytes = Vec::new();
            content.read_to_end(&mut bytes)?;
            seen.push((entry.path.clone(), bytes));
            Ok::<_, Error>(ControlFlow::Continue(()))
        })
        .expect("visit entries");
    seen
}

#[test]
fn zip_entries_and_contents() {
    let temp_dir = tempfile::Builder::new()
        .prefix("unarc-test-zip-")
        .tempdir()
        .expect("Failed to create temp dir");
    let path = write_zip(
        temp_dir.path(),
        "data.zip",
        &[
            ("a.txt", Some(b"0123456789")),
            ("b/", None),
            ("b/c.txt", Some(b"01234567890123456789")),
        ],
    );

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).expect("open zip");
    assert_eq!(reader.format(), ArchiveFormat::Zip);
    assert_eq!(reader.len(), 3);

    let dir = reader.entry(1).unwrap();
    assert!(dir.is_directory());
    assert_eq!(dir.path, "b");

    let largest = reader.largest_file(|_| true).unwrap();
    assert_eq!(largest.path, "b/c.txt");
    assert_eq!(largest.size, 20);

    let mut seen = Vec::new();
    reader
        .for_each_entry(|entry, content| {
            let mut bytes = Vec::new();
            content.read_to_end(&mut bytes)?;
            seen.push((entry.path.clone(), bytes.len() as u64, entry.size));
            Ok::<_, Error>(ControlFlow::Continue(()))
        })
        .expect("visit entries");

    assert_eq!(
        seen,
        vec![
            ("a.txt".to_string(), 10, 10),
            ("b".to_string(), 0, 0),
            ("b/c.txt".to_string(), 20, 20),
        ]
    );
}

#[test]
fn visitor_can_stop_early() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        temp_dir.path(),
        "data.zip",
        &[("one", Some(b"1")), ("two", Some(b"2")), ("three", Some(b"3"))],
    );

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let mut visited = 0;
    reader
        .for_each_entry(|_, _| {
            visited += 1;
            Ok::<_, Error>(if visited == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
    assert_eq!(visited, 2);
}

#[test]
fn legacy_separators_are_normalized() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_zip(temp_dir.path(), "old.zip", &[(r"dir\file.txt", Some(b"x"))]);

    let plain = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    assert_eq!(plain.entry(0).unwrap().path, r"dir\file.txt");

    let options = OpenOptions::default().legacy_separators(true);
    let legacy = ArchiveReader::open(&path, &options).unwrap();
    assert_eq!(legacy.entry(0).unwrap().path, "dir/file.txt");
}

#[test]
fn zip_slip_member_is_rejected_at_open() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_zip(temp_dir.path(), "evil.zip", &[("../escape.txt", Some(b"x"))]);

    let result = ArchiveReader::open(&path, &OpenOptions::default());
    assert!(matches!(result, Err(Error::UnsafePath { .. })));
}

#[test]
fn unsupported_extension_is_rejected_before_reading() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("data.rar");
    std::fs::write(&path, b"not an archive").unwrap();

    let result = ArchiveReader::open(&path, &OpenOptions::default());
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn corrupted_zip_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.zip");
    std::fs::write(&path, [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

    let result = ArchiveReader::open(&path, &OpenOptions::default());
    assert!(matches!(result, Err(Error::Corrupted { .. })));
}

#[test]
fn zip_entry_by_index() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        temp_dir.path(),
        "data.zip",
        &[("a.txt", Some(b"first")), ("b.txt", Some(b"second"))],
    );

    let reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let ArchiveReader::Zip(mut zip) = reader else {
        panic!("expected a zip reader");
    };
    let mut body = String::new();
    zip.open_entry(1).unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "second");
    assert!(matches!(zip.open_entry(2), Err(Error::Corrupted { .. })));
}

#[test]
fn sevenz_entries_and_contents() {
    let temp_dir = tempfile::Builder::new()
        .prefix("unarc-test-7z-")
        .tempdir()
        .expect("Failed to create temp dir");
    let path = write_7z(
        temp_dir.path(),
        "data.7z",
        &["b"],
        &[
            ("a.txt", b"0123456789"),
            ("b/c.txt", b"01234567890123456789"),
            ("empty.txt", b""),
        ],
    );

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).expect("open 7z");
    assert_eq!(reader.format(), ArchiveFormat::SevenZip);
    assert_eq!(reader.len(), 4);

    let dir = reader.entries().iter().find(|e| e.path == "b").unwrap();
    assert!(dir.is_directory());
    let empty = reader.entries().iter().find(|e| e.path == "empty.txt").unwrap();
    assert!(empty.is_file());
    assert_eq!(empty.size, 0);
    assert_eq!(reader.largest_file(|_| true).unwrap().path, "b/c.txt");

    let mut seen = read_all(&mut reader);
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("a.txt".to_string(), b"0123456789".to_vec()),
            ("b".to_string(), Vec::new()),
            ("b/c.txt".to_string(), b"01234567890123456789".to_vec()),
            ("empty.txt".to_string(), Vec::new()),
        ]
    );
}

#[test]
fn sevenz_solid_block_survives_unread_entries() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_7z(
        temp_dir.path(),
        "data.7z",
        &[],
        &[
            (".DS_Store", b"JUNKJUNK"),
            ("a.txt", b"AAAAAAAAAA"),
            ("b.txt", b"BBBBBBBBBBBBBBBBBBBB"),
        ],
    );

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let layout = Layout::plan("data.7z", reader.entries(), &EntryPolicy::default());
    let mut kept = Vec::new();
    reader
        .for_each_entry(|entry, content| {
            if !layout.admits(&entry.path) {
                return Ok::<_, Error>(ControlFlow::Continue(()));
            }
            let mut bytes = Vec::new();
            content.read_to_end(&mut bytes)?;
            kept.push((entry.path.clone(), bytes));
            Ok(ControlFlow::Continue(()))
        })
        .expect("visit entries");

    assert_eq!(
        kept,
        vec![
            ("a.txt".to_string(), b"AAAAAAAAAA".to_vec()),
            ("b.txt".to_string(), b"BBBBBBBBBBBBBBBBBBBB".to_vec()),
        ]
    );
}

#[test]
fn sevenz_visitor_can_stop_early() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_7z(
        temp_dir.path(),
        "data.7z",
        &[],
        &[("one", b"1"), ("two", b"2"), ("three", b"3")],
    );

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let mut visited = 0;
    reader
        .for_each_entry(|_, _| {
            visited += 1;
            Ok::<_, Error>(if visited == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
    assert_eq!(visited, 2);
}

#[test]
fn sevenz_visitor_error_is_returned() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_7z(temp_dir.path(), "data.7z", &[], &[("a.txt", b"a"), ("b.txt", b"b")]);

    let mut reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let mut visited = 0;
    let result = reader.for_each_entry(|entry, _| {
        visited += 1;
        Err(Error::EntryRead {
            entry: entry.path.clone(),
            reason: "refused".to_string(),
        })
    });
    assert!(matches!(result, Err(Error::EntryRead { .. })));
    assert_eq!(visited, 1);
}

#[test]
fn colliding_member_names_are_found() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        temp_dir.path(),
        "data.zip",
        &[("a.txt", Some(b"first")), ("b/", None), ("./a.txt", Some(b"second"))],
    );

    let reader = ArchiveReader::open(&path, &OpenOptions::default()).unwrap();
    let layout = Layout::plan("data.zip", reader.entries(), &EntryPolicy::default());
    let duplicate = layout.find_duplicate(reader.entries()).expect("duplicate path");
    assert_eq!(duplicate.path, "a.txt");
}
