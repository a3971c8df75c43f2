//! Archive validation.
//!
//! Pure inspection of the uploaded byte stream: container well-formedness,
//! path-traversal rejection, and the member-type allow-list. The entire
//! member list is scanned **before** any member content is read, so a
//! rejected archive can never reach the stager partially.
//!
//! Each accepted member's bytes are read exactly once into an owned buffer;
//! length is derived from that buffer, never from re-reading the entry.

use std::io::{Cursor, Read};
use std::path::{Component, Path};

use bytes::Bytes;
use zip::ZipArchive;

use crate::error::IngestError;

/// Upper bound on the total decompressed size across all members. Declared
/// sizes in the archive headers are attacker-controlled, so the bound is
/// enforced on the bytes actually read, not on the header values.
const MAX_DECOMPRESSED_BYTES: u64 = 1024 * 1024 * 1024;

/// Cap on the per-member allocation hint taken from the declared size.
const CAPACITY_HINT_BYTES: u64 = 1024 * 1024;

/// Allow-list of member file extensions.
#[derive(Debug, Clone)]
pub struct AllowList {
    extensions: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(["csv", "json"])
    }
}

impl AllowList {
    /// Builds an allow-list from extensions, normalizing case and leading
    /// dots. Empty entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Returns true when the member path carries an allowed extension.
    #[must_use]
    pub fn allows(&self, member_path: &str) -> bool {
        Path::new(member_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
    }

    /// Client-facing render of the allow-list.
    #[must_use]
    pub fn describe(&self) -> String {
        self.extensions.join(", ")
    }
}

/// One file entry inside the uploaded archive.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Path relative to the archive root. Guaranteed not to escape it.
    pub relative_path: String,
    /// Member content, read exactly once at validation time.
    pub bytes: Bytes,
}

impl ArchiveMember {
    /// Raw content length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when the member is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validates the uploaded bytes as a ZIP archive and extracts its members.
///
/// The scan order is deliberate: every member name is checked against the
/// traversal rule and the allow-list before any content is extracted.
/// Directory entries are skipped.
///
/// # Errors
///
/// - [`IngestError::MalformedArchive`] if the bytes are not a valid ZIP
///   container, a member path would escape the archive root, or the
///   decompressed content exceeds the total size bound
/// - [`IngestError::DisallowedMemberType`] if any member extension is
///   outside the allow-list
pub fn validate(bytes: &[u8], allow_list: &AllowList) -> Result<Vec<ArchiveMember>, IngestError> {
    validate_with_limit(bytes, allow_list, MAX_DECOMPRESSED_BYTES)
}

fn validate_with_limit(
    bytes: &[u8],
    allow_list: &AllowList,
    limit: u64,
) -> Result<Vec<ArchiveMember>, IngestError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| IngestError::MalformedArchive {
            message: e.to_string(),
        })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    for name in names.iter().filter(|n| !n.ends_with('/')) {
        if !is_contained(name) {
            return Err(IngestError::MalformedArchive {
                message: format!("member path escapes archive root: {name}"),
            });
        }
        if !allow_list.allows(name) {
            return Err(IngestError::DisallowedMemberType {
                member: name.clone(),
                allowed: allow_list.describe(),
            });
        }
    }

    let mut members = Vec::new();
    let mut remaining = limit;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| IngestError::MalformedArchive {
                message: e.to_string(),
            })?;
        if entry.is_dir() {
            continue;
        }

        let relative_path = entry.name().to_string();
        let hint = entry.size().min(CAPACITY_HINT_BYTES);
        let mut buffer = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
        (&mut entry)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut buffer)
            .map_err(|e| IngestError::MalformedArchive {
                message: format!("failed to read member {relative_path}: {e}"),
            })?;

        let read = buffer.len() as u64;
        if read > remaining {
            return Err(IngestError::MalformedArchive {
                message: format!("decompressed content exceeds the {limit} byte limit"),
            });
        }
        remaining -= read;

        members.push(ArchiveMember {
            relative_path,
            bytes: Bytes::from(buffer),
        });
    }

    Ok(members)
}

/// Returns true when the member path stays inside the archive root.
///
/// Backslash separators are rejected rather than normalized, so
/// Windows-style names cannot smuggle a parent-directory step past the
/// component check.
fn is_contained(name: &str) -> bool {
    if name.contains('\\') {
        return false;
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return false;
    }
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(content).expect("write content");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn valid_archive_yields_members_with_exact_bytes() {
        let zip = build_zip(&[
            ("train.csv", b"a,b\n1,2\n"),
            ("meta/schema.json", b"{\"cols\":2}"),
        ]);

        let members = validate(&zip, &AllowList::default()).unwrap();
        assert_eq!(members.len(), 2);

        let train = members
            .iter()
            .find(|m| m.relative_path == "train.csv")
            .expect("train.csv present");
        assert_eq!(train.bytes.as_ref(), b"a,b\n1,2\n");
        assert_eq!(train.len(), 8);

        let schema = members
            .iter()
            .find(|m| m.relative_path == "meta/schema.json")
            .expect("schema present");
        assert_eq!(schema.bytes.as_ref(), b"{\"cols\":2}");
    }

    #[test]
    fn non_zip_bytes_are_malformed() {
        let err = validate(b"definitely not a zip", &AllowList::default()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedArchive { .. }));
    }

    #[test]
    fn disallowed_extension_rejects_whole_archive() {
        let zip = build_zip(&[("good.csv", b"x"), ("payload.exe", b"MZ")]);

        let err = validate(&zip, &AllowList::default()).unwrap_err();
        match err {
            IngestError::DisallowedMemberType { member, allowed } => {
                assert_eq!(member, "payload.exe");
                assert!(allowed.contains("csv"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let zip = build_zip(&[("DATA.CSV", b"x")]);
        let members = validate(&zip, &AllowList::default()).unwrap();
        assert_eq!(members[0].relative_path, "DATA.CSV");
    }

    #[test]
    fn member_without_extension_is_disallowed() {
        let zip = build_zip(&[("README", b"hello")]);
        let err = validate(&zip, &AllowList::default()).unwrap_err();
        assert!(matches!(err, IngestError::DisallowedMemberType { .. }));
    }

    #[test]
    fn traversal_path_is_malformed() {
        let zip = build_zip(&[("../evil.csv", b"x")]);
        let err = validate(&zip, &AllowList::default()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedArchive { .. }));
    }

    #[test]
    fn backslash_member_path_is_malformed() {
        let zip = build_zip(&[("..\\evil.csv", b"x")]);
        let err = validate(&zip, &AllowList::default()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedArchive { .. }));
        assert!(!is_contained("sub\\data.csv"));
    }

    #[test]
    fn forged_member_size_is_not_trusted() {
        // A zip64 member whose declared sizes are rewritten to 2^61. The
        // member content is 0x1234 bytes of 'a'; every 8-byte little-endian
        // size field carrying that length gets the forged value.
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("data.csv", options).expect("start file");
        let content = vec![b'a'; 0x1234];
        writer.write_all(&content).expect("write content");
        let mut zip = writer.finish().expect("finish zip").into_inner();

        let declared = 0x1234_u64.to_le_bytes();
        let forged = (1_u64 << 61).to_le_bytes();
        let mut i = 0;
        while i + 8 <= zip.len() {
            if zip[i..i + 8] == declared {
                zip[i..i + 8].copy_from_slice(&forged);
                i += 8;
            } else {
                i += 1;
            }
        }

        // Must come back as a clean rejection, not an allocator abort.
        let err = validate(&zip, &AllowList::default()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedArchive { .. }));
    }

    #[test]
    fn decompressed_bytes_beyond_the_limit_are_malformed() {
        let content = vec![b'x'; 100];
        let zip = build_zip(&[("big.csv", content.as_slice())]);

        let err = validate_with_limit(&zip, &AllowList::default(), 50).unwrap_err();
        match err {
            IngestError::MalformedArchive { message } => {
                assert!(message.contains("exceeds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let members = validate_with_limit(&zip, &AllowList::default(), 100).unwrap();
        assert_eq!(members[0].len(), 100);
    }

    #[test]
    fn limit_applies_across_members() {
        let a = vec![b'a'; 60];
        let b = vec![b'b'; 60];
        let zip = build_zip(&[("a.csv", a.as_slice()), ("b.csv", b.as_slice())]);

        let err = validate_with_limit(&zip, &AllowList::default(), 100).unwrap_err();
        assert!(matches!(err, IngestError::MalformedArchive { .. }));

        let members = validate_with_limit(&zip, &AllowList::default(), 120).unwrap();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn empty_archive_yields_no_members() {
        let zip = build_zip(&[]);
        let members = validate(&zip, &AllowList::default()).unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn directory_entries_are_skipped() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.add_directory("sub/", options).expect("add dir");
        writer.start_file("sub/data.csv", options).expect("start");
        writer.write_all(b"1,2\n").expect("write");
        let zip = writer.finish().expect("finish").into_inner();

        let members = validate(&zip, &AllowList::default()).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].relative_path, "sub/data.csv");
    }

    #[test]
    fn allow_list_normalizes_dots_and_case() {
        let list = AllowList::new([".CSV", "Json", ""]);
        assert!(list.allows("a.csv"));
        assert!(list.allows("b.JSON"));
        assert!(!list.allows("c.parquet"));
        assert_eq!(list.describe(), "csv, json");
    }
}
