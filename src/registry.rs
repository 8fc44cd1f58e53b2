//! Which tags exist, by namespace, and how to make them.

use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use kstring::KString;
use regex::Regex;

use crate::easy_fs::{easy_filenames_in_dir, FileKind};
use crate::error::{CompileError, CompileErrorKind, CompileResult};
use crate::fields::{ButtonKind, ButtonTag, CheckboxField, ErrorsTag, FileField, GroupTag,
                    RadioField, SelectField, TextField, TextKind};
use crate::form::FormTag;
use crate::statics::{IfTag, SetTag};
use crate::tags::TagKind;

pub type Constructor = fn() -> TagKind;

const BUILTIN: &[(&str, &str, Constructor)] = &[
    ("form", "form", || TagKind::Form(FormTag::default())),
    ("form", "text", || TagKind::Text(TextField::new(TextKind::Text))),
    ("form", "password", || TagKind::Text(TextField::new(TextKind::Password))),
    ("form", "textarea", || TagKind::Text(TextField::new(TextKind::Textarea))),
    ("form", "hidden", || TagKind::Text(TextField::new(TextKind::Hidden))),
    ("form", "email", || TagKind::Text(TextField::new(TextKind::Email))),
    ("form", "url", || TagKind::Text(TextField::new(TextKind::Url))),
    ("form", "checkbox", || TagKind::Checkbox(CheckboxField)),
    ("form", "select", || TagKind::Select(SelectField::new(false))),
    ("form", "multiselect", || TagKind::Select(SelectField::new(true))),
    ("form", "radio", || TagKind::Radio(RadioField::default())),
    ("form", "file", || TagKind::File(FileField)),
    ("form", "group", || TagKind::Group(GroupTag::default())),
    ("form", "button", || TagKind::Button(ButtonTag { kind: ButtonKind::Button })),
    ("form", "submit", || TagKind::Button(ButtonTag { kind: ButtonKind::Submit })),
    ("form", "reset", || TagKind::Button(ButtonTag { kind: ButtonKind::Reset })),
    ("form", "errors", || TagKind::Errors(ErrorsTag)),
    ("static", "if", || TagKind::StaticIf(IfTag::default())),
    ("static", "set", || TagKind::StaticSet(SetTag)),
];

fn builtin_constructor(namespace: &str, name: &str) -> Option<Constructor> {
    BUILTIN.iter()
        .find(|(ns, n, _)| *ns == namespace && *n == name)
        .map(|(_, _, constructor)| *constructor)
}

#[derive(Clone)]
pub struct TagRegistry {
    tags: BTreeMap<KString, BTreeMap<KString, Constructor>>,
}

impl TagRegistry {
    /// All built-in tags.
    pub fn builtin() -> Self {
        let mut tags: BTreeMap<KString, BTreeMap<KString, Constructor>> = BTreeMap::new();
        for (ns, name, constructor) in BUILTIN {
            tags.entry(KString::from_static(*ns)).or_default()
                .insert(KString::from_static(*name), *constructor);
        }
        TagRegistry { tags }
    }

    /// The tags defined in `dir`: one subdirectory per namespace, one
    /// `<namespace><Name>Tag.<ext>` file per tag. Dot files are ignored.
    pub fn discover(dir: &Path) -> CompileResult<Self> {
        let read_dir = |path: &Path| easy_filenames_in_dir(path).map_err(
            |e| CompileError::io(format!("reading tag directory {:?}", path), e));
        let mut tags: BTreeMap<KString, BTreeMap<KString, Constructor>> = BTreeMap::new();
        for (dirname, kind) in read_dir(dir)? {
            let nsname = dirname.to_string_lossy().to_lowercase();
            if kind != FileKind::Dir || nsname.starts_with('.') {
                continue;
            }
            let convention = Regex::new(&format!(r"(?i)^{}([a-z][a-z0-9]*)tag\.[a-z0-9.]+$",
                                                 regex::escape(&nsname)))
                .map_err(|e| CompileErrorKind::NamingConvention(format!("{nsname}: {e}")))?;
            let nsdir = dir.join(&dirname);
            let entries = tags.entry(KString::from_string(nsname.clone())).or_default();
            for (filename, kind) in read_dir(&nsdir)? {
                let filename = filename.to_string_lossy();
                if kind != FileKind::File || filename.starts_with('.') {
                    continue;
                }
                let path = nsdir.join(&*filename).to_string_lossy().into_owned();
                let name = match convention.captures(&filename).and_then(|c| c.get(1)) {
                    Some(m) => m.as_str().to_lowercase(),
                    None => return Err(CompileErrorKind::NamingConvention(path).into()),
                };
                let constructor = builtin_constructor(&nsname, &name).ok_or_else(
                    || CompileErrorKind::MissingImplementation(path, format!("{nsname}:{name}")))?;
                entries.insert(KString::from_string(name), constructor);
            }
        }
        Ok(TagRegistry { tags })
    }

    /// Sorted.
    pub fn namespaces(&self) -> Vec<KString> {
        self.tags.keys().cloned().collect()
    }

    /// `ns1|ns2|…` of the sorted namespaces.
    pub fn namespace_pattern(&self) -> String {
        self.tags.keys().join("|")
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.tags.get(namespace).map_or(false, |names| names.contains_key(name))
    }

    /// A fresh tag of the given kind, if it is registered.
    pub fn construct(&self, namespace: &str, name: &str) -> Option<TagKind> {
        self.tags.get(namespace)?.get(name).map(|constructor| constructor())
    }
}


#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn t_builtin() {
        let registry = TagRegistry::builtin();
        assert_eq!(registry.namespace_pattern(), "form|static");
        assert!(matches!(registry.construct("form", "multiselect"),
                         Some(TagKind::Select(s)) if s.multiple));
        assert!(registry.construct("form", "nope").is_none());
        assert!(registry.construct("nope", "text").is_none());
    }

    fn tagdir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn t_discover() {
        let dir = tagdir(&["form/FormTextTag.tag.json", "form/FormMultiSelectTag.json",
                           "form/.hidden", "static/StaticIfTag.rs", ".git/config"]);
        let registry = TagRegistry::discover(dir.path()).unwrap();
        assert_eq!(registry.namespaces(), vec![KString::from_static("form"),
                                               KString::from_static("static")]);
        assert!(registry.contains("form", "text"));
        assert!(registry.contains("form", "multiselect"));
        assert!(!registry.contains("form", "select"));
        assert!(registry.contains("static", "if"));
    }

    #[test]
    fn t_discover_errors() {
        let dir = tagdir(&["form/TextField.json"]);
        let e = TagRegistry::discover(dir.path()).err().unwrap();
        assert!(matches!(e.kind(), CompileErrorKind::NamingConvention(_)));

        let dir = tagdir(&["form/FormSliderTag.json"]);
        let e = TagRegistry::discover(dir.path()).err().unwrap();
        assert!(matches!(e.kind(), CompileErrorKind::MissingImplementation(_, t) if t == "form:slider"));

        let e = TagRegistry::discover(&dir.path().join("missing")).err().unwrap();
        assert!(matches!(e.kind(), CompileErrorKind::Io { .. }));
    }
}
