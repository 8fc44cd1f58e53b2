use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dir,
    File,
    Other
}

/// The entries of directory `path` with their kind, sorted by name so
/// that callers see the same order on every file system.
pub fn easy_filenames_in_dir<P: AsRef<Path>>(
    path: P
) -> io::Result<Vec<(OsString, FileKind)>>
{
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let ft = entry.file_type()?;
        entries.push((
            entry.file_name(),
            if ft.is_dir() {
                FileKind::Dir
            } else if ft.is_file() {
                FileKind::File
            } else {
                FileKind::Other
            }));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_easy_filenames_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        let entries = easy_filenames_in_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![(OsString::from("a"), FileKind::Dir),
                                 (OsString::from("b"), FileKind::File)]);
        assert!(easy_filenames_in_dir(dir.path().join("missing")).is_err());
    }
}
