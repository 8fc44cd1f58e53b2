//! `form:form`: renders the form element and compiles the validator of
//! the fields inside it.

use kstring::KString;

use crate::config::Messages;
use crate::error::{CompileErrorKind, CompileResult};
use crate::model::{type_name_for, FormModelDef};
use crate::node::{Arena, TagHead, TagNode};
use crate::tags::{InitCx, RenderCx, Renderable, TagKind};
use crate::view::Fragment;

#[derive(Debug, Clone, Default)]
pub struct FormTag {
    field_ids: Vec<String>,
}

impl FormTag {
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        if cx.arena.find_ancestor(head.parent, |n| matches!(n.kind, TagKind::Form(_))).is_some() {
            return Err(CompileErrorKind::NestedForm(head.tagref()).into());
        }
        head.required_attr("id")?;
        if head.attr("x:required").is_none() {
            head.set_attr("x:required", "1");
        }
        if let Some(base) = head.attr("x:extend") {
            if !cx.config.base_models.contains(base) {
                return Err(CompileErrorKind::UnknownBaseType {
                    tag: head.tagref(),
                    base: KString::from_ref(base),
                }.into());
            }
        }
        Ok(())
    }

    /// Record a field id; false if the form already has it.
    pub fn register_field(&mut self, id: &str) -> bool {
        if self.field_ids.iter().any(|i| i == id) {
            false
        } else {
            self.field_ids.push(id.to_string());
            true
        }
    }
}

/// One validator per field tag below `form` (not looking into value
/// tags, and leaving out buttons), plus the group predicates.
pub fn compile_form(form: &TagNode, arena: &Arena, messages: &Messages) -> CompileResult<FormModelDef> {
    let form_id = form.head.attr_or("id", "").to_string();
    let mut def = FormModelDef {
        type_name: type_name_for(&form_id),
        form_id,
        extends: form.head.attr_string("x:extend"),
        fields: Vec::new(),
        groups: Vec::new(),
        validators: Vec::new(),
    };
    for id in arena.descendants_of(form, |n| !n.kind.is_value_tag()) {
        let node = &arena[id];
        if let TagKind::Group(group) = &node.kind {
            def.groups.push(group.predicate(&node.head)?);
        } else if let Some(contributor) = node.kind.as_validation_contributor() {
            let validator = contributor.collect_validation(&node.head, messages)?;
            def.fields.push(validator.name.clone());
            def.validators.push(validator);
        }
    }
    Ok(def)
}

impl Renderable for FormTag {
    fn render(&self, node: &TagNode, cx: &mut RenderCx) -> CompileResult<Fragment> {
        let def = compile_form(node, cx.arena, &cx.config.messages)?;
        cx.forms.push(def);
        let mut out = Fragment::text(format!("<form{}>\n", node.head.html_attributes(&[])));
        out.append(node.body.clone());
        out.push_text("</form>");
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::config::CompilerConfig;
    use crate::model::FormModel;
    use crate::registry::TagRegistry;
    use crate::request::RequestContext;
    use crate::template::{compile_template, CompileOutput};
    use crate::error::CompileResult;

    use super::*;

    fn compile(text: &str) -> CompileResult<CompileOutput> {
        compile_template(&TagRegistry::builtin(), &CompilerConfig::default(), "form.tpl", text)
    }

    const COMPANY: &str = "<form:form id=\"signup\">\
                           <form:group id=\"company\" cond=\"$kind == 'firm'\"/>\
                           <form:select id=\"kind\">[Private,private][Firm,firm]</form:select>\
                           <form:text id=\"vat\" x:group=\"company\"/>\
                           <form:file id=\"register\" x:group=\"company\" x:required=\"0\"/>\
                           </form:form>";

    #[test]
    fn t_group_conditioned_fields() {
        let out = compile(COMPANY).unwrap();
        let def = &out.forms[0];
        assert_eq!(def.fields, vec!["kind".to_string(), "vat".to_string(),
                                    "register".to_string()]);
        assert_eq!(def.groups.len(), 1);
        assert_eq!(def.groups[0].id, "company");

        let request = RequestContext::post([("kind", json!("firm")), ("vat", json!(""))]);
        let mut model = FormModel::new(def, &request, BTreeMap::new());
        assert!(model.group("company"));
        assert!(!model.validate());
        assert_eq!(model.errors().keys().collect::<Vec<_>>(), vec!["register", "vat"]);

        let request = RequestContext::post([("kind", json!("private")), ("vat", json!(""))]);
        let mut model = FormModel::new(def, &request, BTreeMap::new());
        assert!(!model.group("company"));
        assert!(model.validate());
    }

    #[test]
    fn t_group_errors() {
        let e = compile("<form:form id=\"f\"><form:group id=\"g\"/></form:form>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::MissingAttribute { attribute, .. }
                         if attribute.as_str() == "cond"));
        let e = compile("<form:form id=\"f\">\n<form:group id=\"g\" cond=\"$a ==\"/></form:form>")
            .unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::Expression { location, source_text, .. }
                         if location.line == 2 && source_text == "$a =="));
        let e = compile("<form:group id=\"g\" cond=\"$a\"/>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::FieldOutsideForm(_)));
    }

    #[test]
    fn t_fields_in_document_order() {
        let out = compile("<form:form id=\"f\" method=\"post\">\
                           <fieldset><form:text id=\"b\"/></fieldset>\
                           <static:set name=\"s\" value=\"1\"/>\
                           <static:if attr=\"s\" equal=\"1\"><form:hidden id=\"a\"/></static:if>\
                           <form:submit id=\"go\"/>\
                           <form:text id=\"c\" name=\"c_name\"/>\
                           </form:form>").unwrap();
        let def = &out.forms[0];
        assert_eq!(def.form_id, "f");
        assert_eq!(def.type_name, "FFormModel");
        assert_eq!(def.fields, vec!["b".to_string(), "a".to_string(), "c_name".to_string()]);
        let html = out.view.render(&RequestContext::get(), &BTreeMap::new()).unwrap();
        assert!(html.starts_with("<form id=\"f\" method=\"post\">\n<fieldset>"));
    }

    #[test]
    fn t_register_field() {
        let mut form = FormTag::default();
        assert!(form.register_field("a"));
        assert!(form.register_field("b"));
        assert!(!form.register_field("a"));
    }
}
