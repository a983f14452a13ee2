//! GTFS zip extraction

use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::error::Result;

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOC_BYTES: usize = 64 << 20;

/// One extracted flat file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFile {
    /// File name with any directory components removed
    pub name: String,
    pub contents: Vec<u8>,
}

/// Extract every `.txt` entry of a GTFS zip, in archive order.
///
/// Directories and other file types are ignored. File names are unique in the
/// result: when two entries share a name in different folders, the later entry
/// replaces the earlier one and a warning is logged.
pub fn extract_flat_files(data: &[u8]) -> Result<Vec<FeedFile>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut files: Vec<FeedFile> = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        if entry.is_dir() {
            continue;
        }

        let name = entry
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        if !name.ends_with(".txt") {
            debug!("Ignoring archive entry {}", entry.name());
            continue;
        }

        let declared = usize::try_from(entry.size()).unwrap_or(0);
        let mut contents = Vec::with_capacity(declared.min(MAX_PREALLOC_BYTES));
        entry.read_to_end(&mut contents)?;
        debug!("Extracted {} ({} bytes)", name, contents.len());

        match files.iter_mut().find(|f| f.name == name) {
            Some(existing) => {
                warn!("Duplicate archive entry {}, keeping {}", name, entry.name());
                existing.contents = contents;
            },
            None => files.push(FeedFile { name, contents }),
        }
    }

    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a zip in memory from (path, contents) pairs
    pub(crate) fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, contents) in entries {
            if path.ends_with('/') {
                writer.add_directory(*path, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*path, SimpleFileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_only_txt_entries() {
        let data = build_zip(&[
            ("stops.txt", "stop_id\nPA1\n"),
            ("README.md", "hello"),
            ("routes.txt", "route_id\n506\n"),
        ]);

        let files = extract_flat_files(&data).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, vec!["stops.txt", "routes.txt"]);
        assert_eq!(files[0].contents, b"stop_id\nPA1\n");
    }

    #[test]
    fn test_strips_directories() {
        let data = build_zip(&[("gtfs/", ""), ("gtfs/agency.txt", "agency_id\n")]);

        let files = extract_flat_files(&data).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "agency.txt");
    }

    #[test]
    fn test_duplicate_names_keep_last_entry() {
        let data = build_zip(&[
            ("v1/stops.txt", "stop_id\nOLD\n"),
            ("v2/stops.txt", "stop_id\nNEW\n"),
        ]);

        let files = extract_flat_files(&data).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].contents, b"stop_id\nNEW\n");
    }

    #[test]
    fn test_rejects_non_zip() {
        assert!(extract_flat_files(b"not a zip").is_err());
    }
}
