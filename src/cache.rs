//! Where compiled artifacts live, and when they are stale.

use std::fs::metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

use crate::config::CacheMode;
use crate::util::flatten_path;

pub use crate::io_util::write_atomic;

/// The compiled view of template `source`.
pub fn artifact_path(cache_dir: &Path, source: &str) -> PathBuf {
    cache_dir.join("templates").join(format!("{}.json", flatten_path(source)))
}

/// The validator definition of form `form_id` in template `source`.
pub fn form_artifact_path(cache_dir: &Path, source: &str, form_id: &str) -> PathBuf {
    cache_dir.join("forms").join(format!("{}_{}.json", flatten_path(source), form_id))
}

/// None if there is no file at `path`.
fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    match metadata(path) {
        Ok(m) => Ok(Some(m.modified().with_context(
            || anyhow!("getting modification time of {:?}", path))?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| anyhow!("stat of {:?}", path)),
    }
}

/// Whether the artifact at `artifact`, compiled from the template at
/// `source`, has to be (re)generated.
pub fn needs_compile(mode: CacheMode, source: &Path, artifact: &Path) -> Result<bool> {
    if mode == CacheMode::Force {
        return Ok(true);
    }
    let artifact_time = match modified_time(artifact)? {
        Some(t) => t,
        None => return Ok(true),
    };
    match mode {
        CacheMode::Check => {
            let source_time = modified_time(source)?.ok_or_else(
                || anyhow!("template {:?} does not exist", source))?;
            Ok(source_time > artifact_time)
        }
        _ => Ok(false),
    }
}


#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::time::Duration;

    use super::*;

    #[test]
    fn t_paths() {
        let dir = Path::new("/var/cache/rl");
        assert_eq!(artifact_path(dir, "shop/order/form.tpl"),
                   PathBuf::from("/var/cache/rl/templates/shop_order_form.tpl.json"));
        assert_eq!(form_artifact_path(dir, "./shop/form.tpl", "order"),
                   PathBuf::from("/var/cache/rl/forms/shop_form.tpl_order.json"));
    }

    fn set_mtime(path: &Path, t: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(t).unwrap();
    }

    #[test]
    fn t_needs_compile() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.tpl");
        let artifact = dir.path().join("a.json");
        fs::write(&source, "x").unwrap();

        for mode in [CacheMode::Imply, CacheMode::Check, CacheMode::Force] {
            assert!(needs_compile(mode, &source, &artifact).unwrap());
        }

        fs::write(&artifact, "{}").unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&source, t);
        set_mtime(&artifact, t);
        assert!(!needs_compile(CacheMode::Check, &source, &artifact).unwrap());
        assert!(!needs_compile(CacheMode::Imply, &source, &artifact).unwrap());
        assert!(needs_compile(CacheMode::Force, &source, &artifact).unwrap());

        set_mtime(&source, t + Duration::from_secs(1));
        assert!(needs_compile(CacheMode::Check, &source, &artifact).unwrap());
        assert!(!needs_compile(CacheMode::Imply, &source, &artifact).unwrap());

        fs::remove_file(&source).unwrap();
        assert!(needs_compile(CacheMode::Check, &source, &artifact).is_err());
    }
}
