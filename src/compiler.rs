//! Compiling templates through the artifact cache.

use std::collections::BTreeSet;
use std::fs::remove_file;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::cache::{artifact_path, form_artifact_path, needs_compile, write_atomic};
use crate::config::CompilerConfig;
use crate::easy_fs::{easy_filenames_in_dir, FileKind};
use crate::error::CompileResult;
use crate::io_util::my_read_to_string;
use crate::model::FormModelDef;
use crate::registry::TagRegistry;
use crate::template::{compile_template, CompileOutput};
use crate::util::flatten_path;
use crate::view::View;
use crate::warn;

pub struct Compiler {
    config: CompilerConfig,
    registry: TagRegistry,
}

fn source_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn remove_stale(path: &Path) {
    match remove_file(path) {
        Ok(()) => warn!("removed stale artifact {:?}", path),
        Err(err) if err.kind() == ErrorKind::NotFound => (),
        Err(err) => warn!("could not remove stale artifact {:?}: {}", path, err),
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig, registry: TagRegistry) -> Self {
        Compiler { config, registry }
    }

    /// With the tags found in `config.tag_dir`, or all built-in tags if
    /// that is not set.
    pub fn from_config(config: CompilerConfig) -> CompileResult<Self> {
        let registry = match &config.tag_dir {
            Some(dir) => TagRegistry::discover(dir)?,
            None => TagRegistry::builtin(),
        };
        Ok(Compiler::new(config, registry))
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `text` as template `source`, without touching the cache.
    pub fn compile_str(&self, source: &str, text: &str) -> CompileResult<CompileOutput> {
        compile_template(&self.registry, &self.config, source, text)
    }

    /// Compile the template at `path` and write its artifacts. Form
    /// artifacts of forms the template no longer has are removed. If
    /// the template does not compile, all of its artifacts from an
    /// earlier compile are removed, so that they can't be served any
    /// more.
    pub fn compile_file(&self, path: &Path) -> Result<CompileOutput> {
        let source = source_name(path);
        let view_path = artifact_path(&self.config.cache_dir, &source);
        let text = my_read_to_string(path)?;
        let output = match self.compile_str(&source, &text) {
            Ok(output) => output,
            Err(e) => {
                remove_stale(&view_path);
                self.remove_form_artifacts(&source, &BTreeSet::new())?;
                return Err(e).with_context(|| anyhow!("compiling template {:?}", source));
            }
        };
        let keep = output.forms.iter().map(|form| form.form_id.as_str()).collect();
        self.remove_form_artifacts(&source, &keep)?;
        for form in &output.forms {
            let form_path = form_artifact_path(&self.config.cache_dir, &source, &form.form_id);
            let json = serde_json::to_string(form)?;
            write_atomic(&form_path, json.as_bytes())?;
        }
        write_atomic(&view_path, output.view.to_json()?.as_bytes())?;
        Ok(output)
    }

    /// Remove the form artifacts of template `source` whose form id is
    /// not in `keep`.
    fn remove_form_artifacts(&self, source: &str, keep: &BTreeSet<&str>) -> Result<()> {
        let forms_dir = self.config.cache_dir.join("forms");
        let entries = match easy_filenames_in_dir(&forms_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| anyhow!("listing {:?}", forms_dir)),
        };
        let prefix = format!("{}_", flatten_path(source));
        for (name, kind) in entries {
            if kind != FileKind::File {
                continue;
            }
            let name = name.to_string_lossy();
            let form_id = match name.strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json")) {
                    Some(form_id) => form_id,
                    None => continue,
                };
            if !keep.contains(form_id) {
                remove_stale(&form_artifact_path(&self.config.cache_dir, source, form_id));
            }
        }
        Ok(())
    }

    /// Compile the template at `path` unless the cache mode says its
    /// artifact is still good. Returns whether it was compiled.
    pub fn ensure_compiled(&self, path: &Path) -> Result<bool> {
        let view_path = artifact_path(&self.config.cache_dir, &source_name(path));
        if needs_compile(self.config.cache_mode, path, &view_path)? {
            warn!("compiling {:?} to {:?}", path, view_path);
            self.compile_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The compiled view of the template at `path`.
    pub fn load_view(&self, path: &Path) -> Result<View> {
        self.ensure_compiled(path)?;
        let view_path = artifact_path(&self.config.cache_dir, &source_name(path));
        View::from_json(&my_read_to_string(&view_path)?).with_context(
            || anyhow!("reading view artifact {:?}", view_path))
    }

    /// The validator definition of form `form_id` in the template at
    /// `path`.
    pub fn load_form(&self, path: &Path, form_id: &str) -> Result<FormModelDef> {
        self.ensure_compiled(path)?;
        let form_path = form_artifact_path(&self.config.cache_dir, &source_name(path), form_id);
        let json = my_read_to_string(&form_path).with_context(
            || anyhow!("template {:?} has no form {:?}", path, form_id))?;
        serde_json::from_str(&json).with_context(
            || anyhow!("reading form artifact {:?}", form_path))
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    use serde_json::json;

    use crate::config::CacheMode;
    use crate::error::{CompileError, CompileErrorKind};
    use crate::model::FormModel;
    use crate::request::RequestContext;

    use super::*;

    const TEMPLATE: &str = "<form:form id=\"order\">\
                            <form:select id=\"size\">[S,s][M,m]</form:select>\
                            </form:form>";

    fn setup(mode: CacheMode) -> (tempfile::TempDir, Compiler, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig {
            cache_dir: dir.path().join("cache"),
            cache_mode: mode,
            ..CompilerConfig::default()
        };
        let template = dir.path().join("order.tpl");
        fs::write(&template, TEMPLATE).unwrap();
        (dir, Compiler::from_config(config).unwrap(), template)
    }

    fn set_mtime(path: &Path, t: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(t).unwrap();
    }

    #[test]
    fn t_load_view_and_form() {
        let (_dir, compiler, template) = setup(CacheMode::Check);
        let view = compiler.load_view(&template).unwrap();
        let html = view.render(&RequestContext::post([("size", json!("m"))]), &BTreeMap::new())
            .unwrap();
        assert!(html.contains("<option value=\"m\" selected=\"selected\">M</option>"));
        assert!(html.contains("<option value=\"s\">S</option>"));

        let def = compiler.load_form(&template, "order").unwrap();
        assert_eq!(def.fields, vec!["size".to_string()]);
        let request = RequestContext::post([("size", json!("xl"))]);
        let mut model = FormModel::new(&def, &request, BTreeMap::new());
        assert!(!model.validate());

        assert!(compiler.load_form(&template, "nope").is_err());
    }

    #[test]
    fn t_check_mode_keeps_fresh_artifact() {
        let (_dir, compiler, template) = setup(CacheMode::Check);
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&template, t);
        assert!(compiler.ensure_compiled(&template).unwrap());
        let view_path = artifact_path(&compiler.config().cache_dir, &source_name(&template));
        set_mtime(&view_path, t);
        let before = fs::read(&view_path).unwrap();

        fs::write(&template, "changed").unwrap();
        set_mtime(&template, t);
        assert!(!compiler.ensure_compiled(&template).unwrap());
        assert_eq!(fs::read(&view_path).unwrap(), before);

        set_mtime(&template, t + Duration::from_secs(1));
        assert!(compiler.ensure_compiled(&template).unwrap());
        assert_eq!(compiler.load_view(&template).unwrap().body.plain_text(), "changed");
    }

    #[test]
    fn t_failed_recompile_removes_artifact() {
        let (_dir, compiler, template) = setup(CacheMode::Force);
        compiler.load_view(&template).unwrap();
        let view_path = artifact_path(&compiler.config().cache_dir, &source_name(&template));
        assert!(view_path.exists());

        fs::write(&template, "<form:form id=\"order\">").unwrap();
        let e = compiler.load_view(&template).unwrap_err();
        assert!(matches!(e.downcast_ref::<CompileError>().map(|e| e.kind()),
                         Some(CompileErrorKind::UnterminatedTag(_))));
        assert!(!view_path.exists());
        let form_path = form_artifact_path(&compiler.config().cache_dir, &source_name(&template),
                                           "order");
        assert!(!form_path.exists());
    }

    #[test]
    fn t_renamed_form_loses_old_artifact() {
        let (_dir, compiler, template) = setup(CacheMode::Check);
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&template, t);
        assert!(compiler.load_form(&template, "order").is_ok());
        set_mtime(&artifact_path(&compiler.config().cache_dir, &source_name(&template)), t);

        fs::write(&template, TEMPLATE.replace("\"order\"", "\"cart\"")).unwrap();
        set_mtime(&template, t + Duration::from_secs(10));
        compiler.load_view(&template).unwrap();
        assert!(compiler.load_form(&template, "cart").is_ok());
        assert!(compiler.load_form(&template, "order").is_err());
        let old = form_artifact_path(&compiler.config().cache_dir, &source_name(&template),
                                     "order");
        assert!(!old.exists());
    }

    #[test]
    fn t_other_templates_keep_their_forms() {
        let (dir, compiler, template) = setup(CacheMode::Force);
        let other = dir.path().join("order.tpl.bak");
        fs::write(&other, TEMPLATE).unwrap();
        compiler.load_view(&other).unwrap();
        compiler.load_view(&template).unwrap();
        fs::write(&template, "no forms").unwrap();
        compiler.load_view(&template).unwrap();
        assert!(compiler.load_form(&template, "order").is_err());
        let kept = form_artifact_path(&compiler.config().cache_dir, &source_name(&other), "order");
        assert!(kept.exists());
    }

    #[test]
    fn t_compile_str_is_pure() {
        let (dir, compiler, _template) = setup(CacheMode::Check);
        let output = compiler.compile_str("inline", TEMPLATE).unwrap();
        assert_eq!(output.forms.len(), 1);
        assert!(!dir.path().join("cache").exists());
    }
}
