//! Compiler configuration, from the environment and an optional JSON
//! file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::io_util::my_read_to_string;
use crate::util::{getenv, getenv_or, xgetenv};

/// When a cached view is recompiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Only if there is no artifact yet.
    Imply,
    /// If there is no artifact or the source is newer.
    Check,
    /// Always.
    Force,
}

impl FromStr for CacheMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "imply" => Ok(CacheMode::Imply),
            "check" => Ok(CacheMode::Check),
            "force" => Ok(CacheMode::Force),
            _ => bail!("invalid cache mode {s:?}, expecting one of imply|check|force"),
        }
    }
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Check
    }
}

/// Default texts of generated error messages and select captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub input_invalid: String,
    pub input_required: String,
    pub select_invalid: String,
    pub select_required: String,
    pub file_required: String,
    pub file_invalid: String,
    /// First option of a required select.
    pub select_choose: String,
    /// First option of an optional select.
    pub select_any: String,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            input_invalid: "Invalid value".into(),
            input_required: "Required".into(),
            select_invalid: "Invalid selection".into(),
            select_required: "Please make a selection".into(),
            file_required: "Please choose a file".into(),
            file_invalid: "The file could not be uploaded".into(),
            select_choose: "-- Choose --".into(),
            select_any: "-- Any --".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Tag definition directory; `None` recognises all built-in tags.
    pub tag_dir: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub cache_mode: CacheMode,
    /// `{NAME}` substitutions.
    pub constants: BTreeMap<String, String>,
    /// Variables visible to `{$…}` substitutions.
    pub variables: serde_json::Map<String, Value>,
    /// The names `x:extend` may refer to.
    pub base_models: BTreeSet<String>,
    pub messages: Messages,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            tag_dir: None,
            cache_dir: PathBuf::from("cache"),
            cache_mode: CacheMode::default(),
            constants: BTreeMap::new(),
            variables: serde_json::Map::new(),
            base_models: BTreeSet::new(),
            messages: Messages::default(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let s = my_read_to_string(path)?;
        CompilerConfig::from_json(&s).with_context(
            || anyhow!("parsing config file {:?}", path))
    }

    /// `REDLINE_CONFIG` (a JSON file, optional) gives the base;
    /// `REDLINE_CACHE_DIR` (required), `REDLINE_TAG_DIR` and
    /// `REDLINE_CACHE_MODE` (default `check`) override it.
    pub fn from_env() -> Result<Self> {
        let mut config = match getenv("REDLINE_CONFIG")? {
            Some(path) => CompilerConfig::from_file(&PathBuf::from(path))?,
            None => CompilerConfig::default(),
        };
        config.cache_dir = xgetenv("REDLINE_CACHE_DIR")?.into();
        if let Some(dir) = getenv("REDLINE_TAG_DIR")? {
            config.tag_dir = Some(dir.into());
        }
        config.cache_mode = getenv_or("REDLINE_CACHE_MODE", Some("check"))?.parse()
            .with_context(|| anyhow!("REDLINE_CACHE_MODE"))?;
        Ok(config)
    }
}
