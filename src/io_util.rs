use std::{path::Path, fs::{read_to_string, create_dir_all, rename, remove_file}, io::Write};
use std::fmt::Write as _;

use anyhow::{Result, anyhow, Context};


pub fn my_read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
    read_to_string(&path).with_context(
        || anyhow!("opening path for reading: {:?}", path.as_ref()))
}

/// A 12 character (6 entropy bytes) long hex string, for unique
/// temporary file names.
pub fn randomidstring() -> Result<String, getrandom::Error> {
    let mut buf = [0u8; 6];
    getrandom::getrandom(&mut buf)?;
    let mut s = String::new();
    for byte in buf {
        let _ = write!(&mut s, "{:02X}", byte);
    }
    Ok(s)
}

/// Write `contents` to `path` so that readers see either the old or
/// the new file, never a partial one: the data goes to a uniquely named
/// file in the same directory first, which is then renamed over
/// `path`. Missing parent directories are created.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(dir).with_context(
        || anyhow!("creating directory {:?}", dir))?;
    let filename = path.file_name().ok_or_else(
        || anyhow!("path has no file name: {:?}", path))?;
    let id = randomidstring().map_err(
        |e| anyhow!("getting random bytes: {e}"))?;
    let mut tmpname = filename.to_os_string();
    tmpname.push(format!(".{id}.tmp"));
    let tmppath = dir.join(tmpname);
    let result = (|| -> Result<()> {
        let mut out = std::fs::File::create(&tmppath).with_context(
            || anyhow!("creating file {:?}", tmppath))?;
        out.write_all(contents).with_context(
            || anyhow!("writing file {:?}", tmppath))?;
        out.sync_all().with_context(
            || anyhow!("syncing file {:?}", tmppath))?;
        rename(&tmppath, path).with_context(
            || anyhow!("renaming {:?} to {:?}", tmppath, path))
    })();
    if result.is_err() {
        let _ = remove_file(&tmppath);
    }
    result
}
