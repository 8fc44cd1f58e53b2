//! The slice of an HTTP request that compiled views and form models
//! read. Building it from a real request is the host's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Outcome codes of a file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Ok,
    /// Exceeds the server-side size limit.
    IniSize,
    /// Exceeds the size limit given by the form.
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub status: UploadStatus,
    pub size: u64,
    pub client_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: Method,
    /// Submitted parameters; strings, or arrays of strings for
    /// `name[]` style fields.
    pub params: BTreeMap<String, Value>,
    /// Request attributes set by the application (template variables,
    /// dynamic option lists for `x:bind`).
    pub attribs: BTreeMap<String, Value>,
    pub files: BTreeMap<String, UploadedFile>,
}

impl RequestContext {
    pub fn get() -> Self {
        RequestContext::default()
    }

    pub fn post<'t>(params: impl IntoIterator<Item = (&'t str, Value)>) -> Self {
        RequestContext {
            method: Method::Post,
            params: params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ..RequestContext::default()
        }
    }

    pub fn with_attrib(mut self, key: &str, value: Value) -> Self {
        self.attribs.insert(key.to_string(), value);
        self
    }

    pub fn with_file(mut self, key: &str, file: UploadedFile) -> Self {
        self.files.insert(key.to_string(), file);
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}
