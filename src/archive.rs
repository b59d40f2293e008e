//! Zip packaging of batch results
//!
//! Members are stored flat, in input order, with names re-suffixed to `.png`.
//! Colliding names get a `_1`, `_2`, ... suffix so no entry is dropped.

use crate::error::{BgCanvasError, Result};
use crate::types::{output_file_name, OUTPUT_EXTENSION};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Normalize names to the output extension and disambiguate duplicates
///
/// A suffixed name never collides with a name that appears elsewhere in the
/// input, whether earlier or later.
///
/// ```rust
/// use imgly_bgcanvas::archive::unique_names;
///
/// let names = unique_names(["cat.jpg", "cat.webp", "dog.png", "cat.png"]);
/// assert_eq!(names, vec!["cat.png", "cat_1.png", "dog.png", "cat_2.png"]);
/// ```
pub fn unique_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized: Vec<String> = names.into_iter().map(output_file_name).collect();
    let reserved: HashSet<&str> = normalized.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(normalized.len());
    let mut result = Vec::with_capacity(normalized.len());

    for name in &normalized {
        if used.insert(name.clone()) {
            result.push(name.clone());
            continue;
        }

        let stem = name
            .strip_suffix(&format!(".{}", OUTPUT_EXTENSION))
            .unwrap_or(name);
        let mut counter = 1usize;
        let candidate = loop {
            let candidate = format!("{}_{}.{}", stem, counter, OUTPUT_EXTENSION);
            if !reserved.contains(candidate.as_str()) && !used.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };

        log::debug!("Renamed duplicate archive entry {} to {}", name, candidate);
        used.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

/// Serialize `(name, bytes)` pairs into a deflate-compressed zip archive
///
/// Entry timestamps are fixed, so equal input yields byte-identical archives.
///
/// # Errors
/// - Zip serialization failures (reported as `Packaging`)
pub fn pack(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let names = unique_names(entries.iter().map(|(name, _)| *name));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, (_, bytes)) in names.iter().zip(entries) {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| BgCanvasError::packaging(format!("Failed to add {}: {}", name, e)))?;
        writer
            .write_all(bytes)
            .map_err(|e| BgCanvasError::packaging(format!("Failed to write {}: {}", name, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| BgCanvasError::packaging(format!("Failed to finalize archive: {}", e)))?;

    log::debug!("Packed {} entries into archive", names.len());
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_archive(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_pack_preserves_order_and_content() {
        let entries: Vec<(&str, &[u8])> = vec![
            ("zebra.jpg", b"zz".as_slice()),
            ("apple.webp", b"aaaa".as_slice()),
            ("mango.png", b"".as_slice()),
        ];
        let files = read_archive(pack(&entries).unwrap());

        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zebra.png", "apple.png", "mango.png"]);
        assert_eq!(files.first().unwrap().1, b"zz".as_slice());
        assert_eq!(files.get(1).unwrap().1, b"aaaa".as_slice());
        assert!(files.get(2).unwrap().1.is_empty());
    }

    #[test]
    fn test_pack_keeps_colliding_entries() {
        let entries: Vec<(&str, &[u8])> = vec![
            ("shot.jpg", b"1".as_slice()),
            ("shot.png", b"2".as_slice()),
            ("shot.webp", b"3".as_slice()),
        ];
        let files = read_archive(pack(&entries).unwrap());

        assert_eq!(files.len(), 3);
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["shot.png", "shot_1.png", "shot_2.png"]);
        assert_eq!(files.get(2).unwrap().1, b"3".as_slice());
    }

    #[test]
    fn test_archive_is_flat() {
        let entries: Vec<(&str, &[u8])> = vec![("deep/nested/dir/pic.jpeg", b"x".as_slice())];
        let files = read_archive(pack(&entries).unwrap());
        assert_eq!(files.first().unwrap().0, "pic.png");
    }

    #[test]
    fn test_suffix_skips_names_used_later() {
        let names = unique_names(["a.jpg", "a.png", "a_1.png"]);
        assert_eq!(names, vec!["a.png", "a_2.png", "a_1.png"]);
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let files = read_archive(pack(&[]).unwrap());
        assert!(files.is_empty());
    }

    #[test]
    fn test_pack_is_deterministic() {
        let entries: Vec<(&str, &[u8])> =
            vec![("a.jpg", b"abc".as_slice()), ("b.jpg", b"def".as_slice())];
        assert_eq!(pack(&entries).unwrap(), pack(&entries).unwrap());
    }
}
