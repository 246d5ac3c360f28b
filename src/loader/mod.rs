// src/loader/mod.rs
use crate::cfdi::RawDocument;
use crate::utils::error::LoadError;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expands files and directories into documents. `.xml` files are read as-is,
/// `.zip` archives contribute each `.xml` entry. Anything unreadable is logged
/// and skipped; only when no input path can be accessed at all is the first
/// failure returned.
pub async fn collect_documents(inputs: &[PathBuf], recursive: bool) -> Result<Vec<RawDocument>, LoadError> {
    let mut documents = Vec::new();
    let mut accessible = 0;
    let mut first_failure = None;
    for input in inputs {
        match tokio::fs::metadata(input).await {
            Ok(meta) if meta.is_dir() => {
                accessible += 1;
                for path in walk_directory(input, recursive).await {
                    load_path(&path, &mut documents).await;
                }
            }
            Ok(_) => {
                accessible += 1;
                load_explicit_file(input, &mut documents).await;
            }
            Err(source) => {
                tracing::error!("Cannot access input {}: {}", input.display(), source);
                if first_failure.is_none() {
                    first_failure = Some(LoadError::Io {
                        path: input.display().to_string(),
                        source,
                    });
                }
            }
        }
    }
    if accessible == 0 {
        if let Some(failure) = first_failure {
            return Err(failure);
        }
    }
    tracing::info!("Collected {} documents from {} inputs", documents.len(), inputs.len());
    Ok(documents)
}

/// Lists `.xml` and `.zip` files below `root`, sorted for a stable batch order.
async fn walk_directory(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Cannot read directory {}: {}", dir.display(), e);
                continue;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    match entry.file_type().await {
                        Ok(ft) if ft.is_dir() => {
                            if recursive {
                                pending.push(path);
                            }
                        }
                        Ok(_) if has_extension(&path, "xml") || has_extension(&path, "zip") => found.push(path),
                        Ok(_) => tracing::trace!("Ignoring {}", path.display()),
                        Err(e) => tracing::warn!("Cannot stat {}: {}", path.display(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error listing {}: {}", dir.display(), e);
                    break;
                }
            }
        }
    }
    found.sort();
    found
}

async fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

async fn load_path(path: &Path, documents: &mut Vec<RawDocument>) {
    let content = match read_file(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("{}", e);
            return;
        }
    };
    if has_extension(path, "zip") {
        push_archive(path, &content, documents);
    } else {
        documents.push(RawDocument::new(display_name(path), content));
    }
}

/// Files named on the command line: zip archives are recognised by content as
/// well as by extension.
async fn load_explicit_file(path: &Path, documents: &mut Vec<RawDocument>) {
    let content = match read_file(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("{}", e);
            return;
        }
    };
    if has_extension(path, "zip") || content.starts_with(ZIP_MAGIC) {
        push_archive(path, &content, documents);
    } else {
        documents.push(RawDocument::new(display_name(path), content));
    }
}

fn push_archive(path: &Path, content: &[u8], documents: &mut Vec<RawDocument>) {
    match read_archive(&path.display().to_string(), content) {
        Ok(entries) => {
            tracing::info!("Read {} XML entries from {}", entries.len(), path.display());
            documents.extend(entries);
        }
        Err(e) => tracing::error!("{}", e),
    }
}

/// Reads every `.xml` entry of an in-memory zip archive. Entries are named by
/// their base name. Unreadable entries are logged and skipped.
pub fn read_archive(archive_name: &str, content: &[u8]) -> Result<Vec<RawDocument>, LoadError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content)).map_err(|source| LoadError::Archive {
        path: archive_name.to_string(),
        source,
    })?;

    let mut documents = Vec::new();
    for i in 0..archive.len() {
        let mut file = match archive.by_index(i) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Skipping entry {} of {}: {}", i, archive_name, e);
                continue;
            }
        };
        let entry_name = file.name().to_string();
        if file.is_dir() || !has_extension(Path::new(&entry_name), "xml") {
            continue;
        }

        let mut bytes = Vec::new();
        if let Err(e) = file.read_to_end(&mut bytes) {
            tracing::warn!("Could not read {} in {}: {}", entry_name, archive_name, e);
            continue;
        }
        documents.push(RawDocument::new(display_name(Path::new(&entry_name)), bytes));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_archive_keeps_xml_entries_by_base_name() {
        let bytes = build_zip(&[
            ("enero/recibo1.xml", "<a/>"),
            ("enero/LEEME.txt", "hola"),
            ("RECIBO2.XML", "<b/>"),
        ]);
        let docs = read_archive("lote.zip", &bytes).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["recibo1.xml", "RECIBO2.XML"]);
        assert_eq!(docs[0].content, b"<a/>");
    }

    #[test]
    fn test_read_archive_rejects_non_zip() {
        let result = read_archive("fake.zip", b"not a zip");
        assert!(matches!(result, Err(LoadError::Archive { .. })));
    }

    #[test]
    fn test_collect_documents_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("a.xml"), "<a/>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        std::fs::write(nested.join("b.xml"), "<b/>").unwrap();
        std::fs::write(nested.join("lote.zip"), build_zip(&[("c.xml", "<c/>")])).unwrap();

        let inputs = vec![dir.path().to_path_buf()];
        let mut names: Vec<_> = tokio_test::block_on(collect_documents(&inputs, true))
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.xml", "b.xml", "c.xml"]);

        let shallow = tokio_test::block_on(collect_documents(&inputs, false)).unwrap();
        assert_eq!(shallow.len(), 1);
    }

    #[test]
    fn test_explicit_zip_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descarga.bin");
        std::fs::write(&path, build_zip(&[("x.xml", "<x/>")])).unwrap();
        let missing = dir.path().join("missing.xml");

        let docs = tokio_test::block_on(collect_documents(&[path, missing], true)).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "x.xml");
    }

    #[test]
    fn test_no_accessible_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![dir.path().join("enero.xml"), dir.path().join("febrero")];
        let result = tokio_test::block_on(collect_documents(&inputs, true));
        match result {
            Err(LoadError::Io { path, .. }) => assert!(path.ends_with("enero.xml"), "{path}"),
            other => panic!("expected an I/O error, got {:?}", other.map(|d| d.len())),
        }

        let empty_dir = vec![dir.path().to_path_buf()];
        assert!(tokio_test::block_on(collect_documents(&empty_dir, true)).unwrap().is_empty());
    }
}
