//! The value tags of the `form` namespace, plus its buttons and error
//! list.

use kstring::KString;
use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Messages;
use crate::error::{CompileErrorKind, CompileResult};
use crate::expr::{self, Expr};
use crate::html::html_escape;
use crate::model::GroupPredicate;
use crate::node::{NodeId, TagHead, TagNode};
use crate::options::{bracket_spans, parse_options, parse_radio_values, OptionSource, SelectOption};
use crate::rules::{pattern_to_regex, FieldValidator, Initializer, Rule};
use crate::tags::{InitCx, RenderCx, Renderable, TagKind, ValidationContributor};
use crate::view::{Fragment, Segment};

const EMAIL_PATTERN: &str = concat!(
    r#"(?i)^(?:[a-z0-9!#$%*/?|^{}`~&'+=_.-]+|"(?:(?:\\\\)*\\"|[^\\"]+)*")@"#,
    r"(?:(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}",
    r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)",
    r"|(?:(?:[a-z0-9]+)(?:[a-z0-9-]*[a-z0-9])*\.)+",
    r"(?:arpa|com|edu|gov|int|mil|net|org|biz|info|name|pro|aero|coop|museum",
    r"|travel|tel|mobi|jobs|[a-z]{2}))$");

lazy_static! {
    static ref ERROR_TEMPLATE: Regex = Regex::new(r"(?is)\[error\](.*?)\[/error\]")
        .expect("valid error template regex");
}

/// The URL pattern for the given protocol alternation.
fn url_pattern(protocols: &str, optional: bool) -> String {
    let mut pattern = format!("^(({protocols})://)");
    if optional {
        pattern.push('?');
    }
    pattern.push_str(r"([\w]+:\w+@)?([a-zA-Z]{1}([\w\-]+\.)+([\w]{2,5}))");
    pattern.push_str(r"(:[\d]{1,5})?((/?\w+/)+|/?)(\w+\.[\w]{3,4})?((\?\w+=\w+)?(&\w+=\w+)*)?");
    pattern
}

/// Which default texts a field's messages start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageStyle {
    Input,
    Select,
    File,
}

/// The enclosing form of a tag about to be initialized, with `id`
/// registered in it.
fn register_with_form(head: &TagHead, cx: &mut InitCx) -> CompileResult<NodeId> {
    let form = cx.arena.find_ancestor(head.parent, |n| matches!(n.kind, TagKind::Form(_)))
        .ok_or_else(|| CompileErrorKind::FieldOutsideForm(head.tagref()))?;
    let id = head.required_attr("id")?;
    let fresh = match &mut cx.arena[form].kind {
        TagKind::Form(f) => f.register_field(id),
        _ => true,
    };
    if !fresh {
        return Err(CompileErrorKind::DuplicateFieldId {
            form: cx.arena[form].head.tagref(),
            id: KString::from_ref(id),
        }.into());
    }
    Ok(form)
}

fn set_default(head: &mut TagHead, key: &str, value: &str) {
    if head.attr(key).is_none() {
        head.set_attr(key, value.to_string());
    }
}

/// Initialization shared by all value tags: `name` defaults to `id`,
/// `x:required` to the form's.
fn init_field(head: &mut TagHead, cx: &mut InitCx, style: MessageStyle) -> CompileResult<()> {
    let form = register_with_form(head, cx)?;
    let id = head.required_attr("id")?.to_string();
    set_default(head, "name", &id);
    let required = cx.arena[form].head.attr_or("x:required", "1").to_string();
    set_default(head, "x:required", &required);
    let m = &cx.config.messages;
    let (required_err, invalid_err) = match style {
        MessageStyle::Input => (&m.input_required, &m.input_invalid),
        MessageStyle::Select => (&m.select_required, &m.select_invalid),
        MessageStyle::File => (&m.file_required, &m.file_invalid),
    };
    set_default(head, "x:required-err", required_err);
    set_default(head, "x:invalid-err", invalid_err);
    Ok(())
}

fn name_of(head: &TagHead) -> String {
    head.attr_or("name", "").to_string()
}

/// A numeric attribute, if present.
fn bound<T: std::str::FromStr>(head: &TagHead, key: &str) -> CompileResult<Option<(T, String)>>
where T::Err: std::fmt::Display
{
    match head.attr(key) {
        None => Ok(None),
        Some(s) => match s.trim().parse::<T>() {
            Ok(n) => Ok(Some((n, s.to_string()))),
            Err(e) => Err(CompileErrorKind::InvalidAttribute(
                head.tagref(), KString::from_ref(key), format!("{s:?}: {e}")).into()),
        },
    }
}

/// The message attribute `key` (or `default`) with `%` replaced by
/// `value`.
fn message(head: &TagHead, key: &str, default: &str, value: &str) -> String {
    head.attr_or(key, default).replace('%', value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Textarea,
    Checkbox,
    Radio,
    Select,
    MultiSelect,
}

/// The initializers common to value tags, and the required rule where
/// it applies.
fn base_validator(head: &TagHead, kind: ValueKind) -> FieldValidator {
    let mut initializers = vec![Initializer::GetValue];
    if kind == ValueKind::MultiSelect {
        initializers.push(Initializer::EnsureList);
    } else {
        initializers.push(Initializer::EnsureString);
        match kind {
            ValueKind::Textarea =>
                initializers.push(Initializer::StripControl { keep_whitespace: true }),
            ValueKind::Text =>
                initializers.push(Initializer::StripControl { keep_whitespace: false }),
            _ => (),
        }
        if kind != ValueKind::Select && head.flag("x:nohtml", true) {
            initializers.push(Initializer::StripMarkup);
        }
        if let Some(chars) = head.attr("x:remove") {
            initializers.push(Initializer::RemoveChars(chars.to_string()));
        }
    }
    let mut rules = Vec::new();
    if kind != ValueKind::Checkbox {
        rules.push(Rule::Required {
            required: head.flag("x:required", true),
            group: head.attr_string("x:group"),
            message: head.attr_or("x:required-err", "").to_string(),
        });
    }
    FieldValidator { name: name_of(head), initializers, rules }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Password,
    Hidden,
    Email,
    Url,
    Textarea,
}

impl TextKind {
    fn input_type(self) -> &'static str {
        match self {
            TextKind::Text | TextKind::Email | TextKind::Url => "text",
            TextKind::Password => "password",
            TextKind::Hidden => "hidden",
            TextKind::Textarea => "textarea",
        }
    }
}

/// text, password, hidden, email, url and textarea.
#[derive(Debug, Clone)]
pub struct TextField {
    pub kind: TextKind,
}

impl TextField {
    pub fn new(kind: TextKind) -> Self {
        TextField { kind }
    }

    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        init_field(head, cx, MessageStyle::Input)?;
        match self.kind {
            TextKind::Email => head.set_attr("x:pattern", EMAIL_PATTERN),
            TextKind::Url => {
                let protocols: Vec<&str> = [("x:ftp", "ftp", false),
                                            ("x:http", "http", true),
                                            ("x:https", "https", true)]
                    .iter()
                    .filter(|(key, _, default)| head.flag(key, *default))
                    .map(|(_, protocol, _)| *protocol)
                    .collect();
                let pattern = url_pattern(&protocols.join("|"), head.flag("x:noprotocol", false));
                head.set_attr("x:pattern", pattern);
            }
            _ => (),
        }
        Ok(())
    }
}

impl Renderable for TextField {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let head = &node.head;
        let name = name_of(head);
        let default = head.attr_string("x:default");
        let mut overrides = vec![("value", None)];
        if let Some(maxlen) = head.attr("x:maxlen") {
            overrides.push(("maxlength", Some(maxlen)));
        }
        if head.flag("x:readonly", false) {
            overrides.push(("readonly", Some("readonly")));
        }
        let mut out = Fragment::new();
        if self.kind == TextKind::Textarea {
            out.push_text(&format!("<textarea{}>", head.html_attributes(&overrides)));
            out.push(Segment::FieldValue { name, default });
            out.push_text("</textarea>");
        } else {
            overrides.push(("type", Some(self.kind.input_type())));
            out.push_text(&format!("<input{}", head.html_attributes(&overrides)));
            if self.kind != TextKind::Password {
                out.push_text(" value=\"");
                out.push(Segment::FieldValue { name, default });
                out.push_text("\"");
            }
            out.push_text(">");
        }
        Ok(out)
    }
}

impl ValidationContributor for TextField {
    fn collect_validation(&self, head: &TagHead, _messages: &Messages) -> CompileResult<FieldValidator> {
        let kind = if self.kind == TextKind::Textarea { ValueKind::Textarea } else { ValueKind::Text };
        let mut v = base_validator(head, kind);
        if let Some(chars) = head.attr("x:keep") {
            v.initializers.push(Initializer::KeepChars(chars.to_string()));
        }
        if let Some((min, s)) = bound::<usize>(head, "x:minlen")? {
            let message = message(head, "x:minlen-err", "Minimum of % characters", &s);
            v.rules.push(Rule::MinLength { min, message });
        }
        if let Some((max, s)) = bound::<usize>(head, "x:maxlen")? {
            let message = message(head, "x:maxlen-err", "Maximum of % characters", &s);
            v.rules.push(Rule::MaxLength { max, message });
        }
        let minsize = bound::<f64>(head, "x:minsize")?;
        let maxsize = bound::<f64>(head, "x:maxsize")?;
        if minsize.is_some() || maxsize.is_some() {
            let message = head.attr_or("x:number-err", "Invalid number").to_string();
            v.rules.push(Rule::Number { message });
        }
        if let Some((min, s)) = minsize {
            let message = message(head, "x:minsize-err", "Minimum size of %", &s);
            v.rules.push(Rule::MinSize { min, message });
        }
        if let Some((max, s)) = maxsize {
            let message = message(head, "x:maxsize-err", "Maximum size of %", &s);
            v.rules.push(Rule::MaxSize { max, message });
        }
        if let Some(pattern) = head.attr("x:pattern") {
            if let Err(e) = Regex::new(&pattern_to_regex(pattern)) {
                return Err(CompileErrorKind::InvalidAttribute(
                    head.tagref(), "x:pattern".into(), e.to_string()).into());
            }
            let message = message(head, "x:pattern-err", "Invalid format", pattern);
            v.rules.push(Rule::Pattern { pattern: pattern.to_string(), message });
        }
        Ok(v)
    }
}


#[derive(Debug, Clone, Default)]
pub struct CheckboxField;

impl CheckboxField {
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        init_field(head, cx, MessageStyle::Input)?;
        head.required_attr("x:on")?;
        head.required_attr("x:off")?;
        Ok(())
    }
}

impl Renderable for CheckboxField {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let head = &node.head;
        let on = head.attr_or("x:on", "");
        let attrs = head.html_attributes(&[("type", Some("checkbox")), ("value", None)]);
        let mut out = Fragment::text(format!("<input{attrs} value=\"{}\"", html_escape(on)));
        out.push(Segment::Checked {
            name: name_of(head),
            on: on.to_string(),
            default: head.attr_string("x:default"),
        });
        out.push_text(">");
        Ok(out)
    }
}

impl ValidationContributor for CheckboxField {
    fn collect_validation(&self, head: &TagHead, _messages: &Messages) -> CompileResult<FieldValidator> {
        let mut v = base_validator(head, ValueKind::Checkbox);
        v.rules.push(Rule::CheckboxOnOff {
            on: head.attr_or("x:on", "").to_string(),
            off: head.attr_or("x:off", "").to_string(),
        });
        Ok(v)
    }
}


/// select and multiselect. The option source is fixed when the body is
/// complete and then shared by rendering and validation.
#[derive(Debug, Clone)]
pub struct SelectField {
    pub multiple: bool,
    source: Option<OptionSource>,
}

impl SelectField {
    pub fn new(multiple: bool) -> Self {
        SelectField { multiple, source: None }
    }

    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        init_field(head, cx, MessageStyle::Select)
    }

    pub fn finish(&mut self, head: &TagHead, body: &Fragment) {
        self.source = Some(match head.attr("x:bind") {
            Some(attrib) => OptionSource::Bound {
                attrib: attrib.to_string(),
                title_key: head.attr_or("x:titlekey", "title").to_string(),
                value_key: head.attr_or("x:valuekey", "value").to_string(),
            },
            None => OptionSource::Static(parse_options(&body.plain_text())),
        });
    }

    pub fn source(&self) -> OptionSource {
        self.source.clone().unwrap_or(OptionSource::Static(Vec::new()))
    }

    /// The caption of the leading empty option, if there is one.
    fn first_caption<'h>(&self, head: &'h TagHead, messages: &'h Messages) -> Option<&'h str> {
        let nofirst = head.flag("x:nofirst", false);
        let required = head.attr("x:required");
        if let Some(first) = head.attr("x:first") {
            Some(first)
        } else if !nofirst && required == Some("1") {
            Some(messages.select_choose.as_str())
        } else if !nofirst || required == Some("0") {
            Some(messages.select_any.as_str())
        } else {
            None
        }
    }
}

impl Renderable for SelectField {
    fn render(&self, node: &TagNode, cx: &mut RenderCx) -> CompileResult<Fragment> {
        let head = &node.head;
        let name = name_of(head);
        let mut out = Fragment::new();
        if self.multiple {
            out.push_text(&format!("<select{} name=\"{}[]\" multiple=\"multiple\">\n",
                                   head.html_attributes(&[("name", None), ("multiple", None)]),
                                   name));
        } else {
            out.push_text(&format!("<select{}>\n", head.html_attributes(&[])));
        }
        if let Some(caption) = self.first_caption(head, &cx.config.messages) {
            out.push_text(&format!("<option value=\"\">{}</option>", html_escape(caption)));
        }
        out.push_text("\n");
        out.push(Segment::Options {
            name,
            source: self.source(),
            default: head.attr_string("x:default"),
            multiple: self.multiple,
        });
        out.push_text("</select>");
        Ok(out)
    }
}

impl ValidationContributor for SelectField {
    fn collect_validation(&self, head: &TagHead, _messages: &Messages) -> CompileResult<FieldValidator> {
        let kind = if self.multiple { ValueKind::MultiSelect } else { ValueKind::Select };
        let mut v = base_validator(head, kind);
        let message = head.attr_or("x:invalid-err", "").to_string();
        if !self.multiple {
            v.rules.push(Rule::InOptions { source: self.source(), message });
        } else if head.flag("x:required", true) {
            // optional multiselects keep whatever was submitted
            v.rules.push(Rule::AllInOptions { source: self.source(), message });
        }
        Ok(v)
    }
}


/// radio: every `[value]` of the body becomes one radio button.
#[derive(Debug, Clone, Default)]
pub struct RadioField {
    values: Vec<String>,
}

impl RadioField {
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        init_field(head, cx, MessageStyle::Select)
    }

    pub fn finish(&mut self, body: &Fragment) {
        self.values = parse_radio_values(&body.plain_text());
    }
}

impl Renderable for RadioField {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let head = &node.head;
        let id = head.attr_or("id", "");
        let name = name_of(head);
        let default = head.attr_string("x:default");
        let attrs = head.html_attributes(&[("id", None), ("type", Some("radio")), ("value", None)]);
        let mut out = Fragment::new();
        let mut i = 0;
        for segment in node.body.segments() {
            let text = match segment {
                Segment::Text(text) => text,
                other => {
                    out.push(other.clone());
                    continue;
                }
            };
            let mut pos = 0;
            for (span, value) in bracket_spans(text) {
                out.push_text(&text[pos..span.start]);
                out.push_text(&format!("<input{attrs} id=\"{id}_{i}\" value=\"{}\"",
                                       html_escape(value)));
                out.push(Segment::RadioChecked {
                    name: name.clone(),
                    value: value.to_string(),
                    default: default.clone(),
                });
                out.push_text(">");
                pos = span.end;
                i += 1;
            }
            out.push_text(&text[pos..]);
        }
        Ok(out)
    }
}

impl ValidationContributor for RadioField {
    fn collect_validation(&self, head: &TagHead, _messages: &Messages) -> CompileResult<FieldValidator> {
        let mut v = base_validator(head, ValueKind::Radio);
        let options = self.values.iter()
            .map(|value| SelectOption { title: value.clone(), value: value.clone() })
            .collect();
        v.rules.push(Rule::InOptions {
            source: OptionSource::Static(options),
            message: head.attr_or("x:invalid-err", "").to_string(),
        });
        Ok(v)
    }
}


#[derive(Debug, Clone, Default)]
pub struct FileField;

impl FileField {
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        init_field(head, cx, MessageStyle::File)
    }
}

impl Renderable for FileField {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let attrs = node.head.html_attributes(&[("type", Some("file")), ("value", None)]);
        Ok(Fragment::text(format!("<input{attrs}>")))
    }
}

impl ValidationContributor for FileField {
    fn collect_validation(&self, head: &TagHead, messages: &Messages) -> CompileResult<FieldValidator> {
        let group = head.attr_string("x:group");
        // a grouped upload is required whenever its group is
        let required = head.flag("x:required", true) || group.is_some();
        let mut rules = vec![
            Rule::FileRequired {
                required,
                group,
                message: head.attr_or("x:required-err", &messages.file_required).to_string(),
            },
            Rule::UploadError {
                message: head.attr_or("x:upload-err", &messages.file_invalid).to_string(),
                size_message: head.attr_or("x:maxsize-err", "File is too big").to_string(),
            },
        ];
        if let Some((min, s)) = bound::<u64>(head, "x:minsize")? {
            let message = message(head, "x:minsize-err", "File is too small", &s);
            rules.push(Rule::MinFileSize { min, message });
        }
        if let Some((max, s)) = bound::<u64>(head, "x:maxsize")? {
            let message = message(head, "x:maxsize-err", "File is too big", &s);
            rules.push(Rule::MaxFileSize { max, message });
        }
        Ok(FieldValidator {
            name: name_of(head),
            initializers: vec![Initializer::GetFile],
            rules,
        })
    }
}


/// A named condition over the submitted values; fields with a matching
/// `x:group` are only required when it holds.
#[derive(Debug, Clone, Default)]
pub struct GroupTag {
    condition: Option<Expr>,
}

impl GroupTag {
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        register_with_form(head, cx)?;
        let cond = head.required_attr("cond")?;
        let condition = expr::parse(cond).map_err(|e| CompileErrorKind::Expression {
            location: head.location.clone(),
            source_text: cond.to_string(),
            message: e.to_string(),
        })?;
        self.condition = Some(condition);
        Ok(())
    }

    pub fn predicate(&self, head: &TagHead) -> CompileResult<GroupPredicate> {
        let condition = match &self.condition {
            Some(c) => c.clone(),
            None => return Err(CompileErrorKind::MissingAttribute {
                tag: head.tagref(),
                attribute: "cond".into(),
            }.into()),
        };
        Ok(GroupPredicate { id: head.attr_or("id", "").to_string(), condition })
    }
}

impl Renderable for GroupTag {
    fn render(&self, _node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        Ok(Fragment::new())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Button,
    Submit,
    Reset,
}

#[derive(Debug, Clone)]
pub struct ButtonTag {
    pub kind: ButtonKind,
}

impl Renderable for ButtonTag {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let input_type = match self.kind {
            ButtonKind::Button => "button",
            ButtonKind::Submit => "submit",
            ButtonKind::Reset => "reset",
        };
        let attrs = node.head.html_attributes(&[("type", Some(input_type))]);
        Ok(Fragment::text(format!("<input{attrs}>")))
    }
}


/// The error list: its body is only shown when validation failed, with
/// the first `[error]…[/error]` repeated once per error.
#[derive(Debug, Clone, Default)]
pub struct ErrorsTag;

impl Renderable for ErrorsTag {
    fn render(&self, node: &TagNode, _cx: &mut RenderCx) -> CompileResult<Fragment> {
        let mut body = Fragment::new();
        let mut found = false;
        for segment in node.body.segments() {
            match segment {
                Segment::Text(text) if !found => {
                    match ERROR_TEMPLATE.captures(text) {
                        Some(caps) => {
                            found = true;
                            let (whole, template) = match (caps.get(0), caps.get(1)) {
                                (Some(w), Some(t)) => (w, t),
                                _ => continue,
                            };
                            body.push_text(&text[..whole.start()]);
                            body.push(Segment::EachError(template.as_str().to_string()));
                            body.push_text(&text[whole.end()..]);
                        }
                        None => body.push_text(text),
                    }
                }
                other => body.push(other.clone()),
            }
        }
        Ok(Fragment(vec![Segment::IfErrors(body)]))
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::config::CompilerConfig;
    use crate::error::CompileResult;
    use crate::model::FormModel;
    use crate::registry::TagRegistry;
    use crate::request::{Method, RequestContext, UploadStatus, UploadedFile};
    use crate::template::{compile_template, CompileOutput};

    use super::*;

    fn try_form(fields: &str) -> CompileResult<CompileOutput> {
        compile_template(&TagRegistry::builtin(), &CompilerConfig::default(), "fields.tpl",
                         &format!("<form:form id=\"f\">{fields}</form:form>"))
    }

    fn form(fields: &str) -> CompileOutput {
        try_form(fields).unwrap()
    }

    fn render(out: &CompileOutput, request: &RequestContext) -> String {
        out.view.render(request, &BTreeMap::new()).unwrap()
    }

    fn errors(out: &CompileOutput, request: &RequestContext) -> BTreeMap<String, String> {
        let mut model = FormModel::new(&out.forms[0], request, BTreeMap::new());
        model.validate();
        model.errors().clone()
    }

    fn error_of(out: &CompileOutput, field: &str, value: serde_json::Value) -> Option<String> {
        errors(out, &RequestContext::post([(field, value)])).remove(field)
    }

    fn empty_post() -> RequestContext {
        RequestContext { method: Method::Post, ..RequestContext::default() }
    }

    #[test]
    fn t_email() {
        let out = form("<form:email id=\"mail\"/>");
        assert!(render(&out, &RequestContext::get())
                .contains("<input id=\"mail\" name=\"mail\" type=\"text\" value=\"\">"));
        assert_eq!(error_of(&out, "mail", json!("a@b.com")), None);
        assert_eq!(error_of(&out, "mail", json!("Someone@Example.ORG")), None);
        assert_eq!(error_of(&out, "mail", json!("not an email")).as_deref(),
                   Some("Invalid format"));
        assert_eq!(error_of(&out, "mail", json!("")).as_deref(), Some("Required"));
    }

    #[test]
    fn t_url() {
        let out = form("<form:url id=\"site\"/>");
        assert_eq!(error_of(&out, "site", json!("http://example.com/")), None);
        assert_eq!(error_of(&out, "site", json!("https://example.com/a/b.html")), None);
        assert_eq!(error_of(&out, "site", json!("example.com")).as_deref(),
                   Some("Invalid format"));
        assert_eq!(error_of(&out, "site", json!("ftp://example.com/")).as_deref(),
                   Some("Invalid format"));

        let out = form("<form:url id=\"site\" x:noprotocol=\"1\" x:ftp=\"1\"/>");
        assert_eq!(error_of(&out, "site", json!("example.com")), None);
        assert_eq!(error_of(&out, "site", json!("ftp://example.com/")), None);
    }

    #[test]
    fn t_text_lengths() {
        let out = form("<form:text id=\"n\" x:minlen=\"2\" x:maxlen=\"4\"/>");
        assert!(render(&out, &RequestContext::get())
                .contains("<input id=\"n\" maxlength=\"4\" name=\"n\" type=\"text\" value=\"\">"));
        assert_eq!(error_of(&out, "n", json!("a")).as_deref(), Some("Minimum of 2 characters"));
        assert_eq!(error_of(&out, "n", json!("abcde")).as_deref(), Some("Maximum of 4 characters"));
        assert_eq!(error_of(&out, "n", json!("abc")), None);

        let out = form("<form:text id=\"n\" x:minlen=\"3\" x:minlen-err=\"At least % please\"/>");
        assert_eq!(error_of(&out, "n", json!("ab")).as_deref(), Some("At least 3 please"));
    }

    #[test]
    fn t_number_bounds() {
        let out = form("<form:text id=\"q\" x:minsize=\"1\" x:maxsize=\"10\"/>");
        assert_eq!(error_of(&out, "q", json!("x")).as_deref(), Some("Invalid number"));
        assert_eq!(error_of(&out, "q", json!("0")).as_deref(), Some("Minimum size of 1"));
        assert_eq!(error_of(&out, "q", json!("11")).as_deref(), Some("Maximum size of 10"));
        assert_eq!(error_of(&out, "q", json!("10")), None);
    }

    #[test]
    fn t_pattern() {
        let out = form("<form:text id=\"code\" x:pattern=\"/^[A-Z]+$/\" x:pattern-err=\"Letters only\"/>");
        assert_eq!(error_of(&out, "code", json!("abc")).as_deref(), Some("Letters only"));
        assert_eq!(error_of(&out, "code", json!("ABC")), None);

        let out = form("<form:text id=\"code\" x:pattern=\"/^[a-z]+$/i\"/>");
        assert_eq!(error_of(&out, "code", json!("ABC")), None);
    }

    #[test]
    fn t_invalid_bounds_and_patterns() {
        let e = try_form("<form:text id=\"n\" x:minlen=\"two\"/>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::InvalidAttribute(_, key, _)
                         if key.as_str() == "x:minlen"));
        let e = try_form("<form:text id=\"n\" x:pattern=\"/([/\"/>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::InvalidAttribute(_, key, _)
                         if key.as_str() == "x:pattern"));
        let e = try_form("<form:file id=\"doc\" x:maxsize=\"big\"/>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::InvalidAttribute(..)));
    }

    #[test]
    fn t_value_cleanup() {
        let out = form("<form:text id=\"digits\" x:keep=\"0123456789\" x:required=\"0\"/>\
                        <form:text id=\"dashes\" x:remove=\"-\" x:required=\"0\"/>\
                        <form:text id=\"html\" x:required=\"0\"/>\
                        <form:text id=\"raw\" x:nohtml=\"0\" x:required=\"0\"/>");
        let request = RequestContext::post([("digits", json!("a1b2")),
                                            ("dashes", json!("1-2-3")),
                                            ("html", json!("<b>bold</b>\u{7}")),
                                            ("raw", json!("<b>bold</b>"))]);
        let mut model = FormModel::new(&out.forms[0], &request, BTreeMap::new());
        assert!(model.validate());
        assert_eq!(model.get("digits"), Some(&json!("12")));
        assert_eq!(model.get("dashes"), Some(&json!("123")));
        assert_eq!(model.get("html"), Some(&json!("bold")));
        assert_eq!(model.get("raw"), Some(&json!("<b>bold</b>")));
    }

    #[test]
    fn t_textarea_and_password() {
        let out = form("<form:textarea id=\"t\" rows=\"3\"/><form:password id=\"p\"/>");
        let html = render(&out, &RequestContext::post([("t", json!("a<b")), ("p", json!("secret"))]));
        assert!(html.contains("<textarea id=\"t\" name=\"t\" rows=\"3\">a&lt;b</textarea>"));
        assert!(html.contains("<input id=\"p\" name=\"p\" type=\"password\">"));
        assert!(!html.contains("secret"));
    }

    #[test]
    fn t_checkbox() {
        let out = form("<form:checkbox id=\"news\" x:on=\"yes\" x:off=\"no\" x:default=\"yes\"/>");
        assert!(render(&out, &RequestContext::get()).contains(
            "<input id=\"news\" name=\"news\" type=\"checkbox\" value=\"yes\" checked=\"checked\">"));
        assert!(render(&out, &empty_post()).contains(
            "<input id=\"news\" name=\"news\" type=\"checkbox\" value=\"yes\">"));

        let request = empty_post();
        let mut model = FormModel::new(&out.forms[0], &request, BTreeMap::new());
        assert!(model.validate());
        assert_eq!(model.get("news"), Some(&json!("no")));

        let e = try_form("<form:checkbox id=\"news\" x:on=\"yes\"/>").unwrap_err();
        assert!(matches!(e.kind(), CompileErrorKind::MissingAttribute { attribute, .. }
                         if attribute.as_str() == "x:off"));
    }

    #[test]
    fn t_radio() {
        let out = form("<form:radio id=\"size\">[S] [M]</form:radio>");
        assert!(render(&out, &RequestContext::post([("size", json!("M"))])).contains(
            "<input name=\"size\" type=\"radio\" id=\"size_0\" value=\"S\"> \
             <input name=\"size\" type=\"radio\" id=\"size_1\" value=\"M\" checked=\"checked\">"));
        assert_eq!(error_of(&out, "size", json!("M")), None);
        assert_eq!(error_of(&out, "size", json!("L")).as_deref(), Some("Invalid selection"));
        assert_eq!(error_of(&out, "size", json!("")).as_deref(), Some("Please make a selection"));
    }

    #[test]
    fn t_select_first_option() {
        let out = form("<form:select id=\"s\">[A,1][B,2]</form:select>");
        assert!(render(&out, &RequestContext::get()).contains(
            "<select id=\"s\" name=\"s\">\n<option value=\"\">-- Choose --</option>\n\
             <option value=\"1\">A</option>\n<option value=\"2\">B</option>\n</select>"));

        let out = form("<form:select id=\"s\" x:required=\"0\">[A,1]</form:select>");
        assert!(render(&out, &RequestContext::get())
                .contains("<option value=\"\">-- Any --</option>"));

        let out = form("<form:select id=\"s\" x:nofirst=\"1\">[A,1]</form:select>");
        assert!(render(&out, &RequestContext::get())
                .contains("<select id=\"s\" name=\"s\">\n\n<option value=\"1\">A</option>"));
    }

    #[test]
    fn t_multiselect() {
        let out = form("<form:multiselect id=\"m\" x:first=\"Pick\">[A,1][B,2]</form:multiselect>");
        let html = render(&out, &RequestContext::post([("m", json!(["2"]))]));
        assert!(html.contains("<select id=\"m\" name=\"m[]\" multiple=\"multiple\">\n\
                               <option value=\"\">Pick</option>\n<option value=\"1\">A</option>\n\
                               <option value=\"2\" selected=\"selected\">B</option>\n</select>"));

        assert_eq!(error_of(&out, "m", json!(["1", "2"])), None);
        assert_eq!(error_of(&out, "m", json!(["1", "3"])).as_deref(), Some("Invalid selection"));
        assert_eq!(error_of(&out, "m", json!([])).as_deref(), Some("Please make a selection"));

        let out = form("<form:multiselect id=\"m\" x:required=\"0\">[A,1]</form:multiselect>");
        assert_eq!(error_of(&out, "m", json!(["3"])), None);
    }

    #[test]
    fn t_bound_select() {
        let out = form("<form:select id=\"c\" x:bind=\"countries\" x:titlekey=\"name\" \
                        x:valuekey=\"code\"/>");
        let countries = json!([{"name": "Switzerland", "code": "ch"},
                               {"name": "Austria", "code": "at"}]);
        let request = RequestContext::post([("c", json!("ch"))])
            .with_attrib("countries", countries.clone());
        assert!(render(&out, &request)
                .contains("<option value=\"ch\" selected=\"selected\">Switzerland</option>"));
        assert!(errors(&out, &request).is_empty());

        let request = RequestContext::post([("c", json!("de"))]).with_attrib("countries", countries);
        assert_eq!(errors(&out, &request).get("c").map(String::as_str), Some("Invalid selection"));
    }

    fn upload(status: UploadStatus, size: u64) -> RequestContext {
        empty_post().with_file("doc", UploadedFile { status, size, client_name: "a.pdf".into() })
    }

    #[test]
    fn t_file() {
        let out = form("<form:file id=\"doc\" x:maxsize=\"100\"/>");
        assert!(render(&out, &RequestContext::get())
                .contains("<input id=\"doc\" name=\"doc\" type=\"file\">"));
        let error = |request: &RequestContext| errors(&out, request).remove("doc");
        assert_eq!(error(&empty_post()).as_deref(), Some("Please choose a file"));
        assert_eq!(error(&upload(UploadStatus::NoFile, 0)).as_deref(),
                   Some("Please choose a file"));
        assert_eq!(error(&upload(UploadStatus::Ok, 50)), None);
        assert_eq!(error(&upload(UploadStatus::Ok, 200)).as_deref(), Some("File is too big"));
        assert_eq!(error(&upload(UploadStatus::IniSize, 0)).as_deref(), Some("File is too big"));
        assert_eq!(error(&upload(UploadStatus::Partial, 10)).as_deref(),
                   Some("The file could not be uploaded"));

        let out = form("<form:file id=\"doc\" x:required=\"0\"/>");
        assert!(errors(&out, &empty_post()).is_empty());
    }

    #[test]
    fn t_buttons_and_errors() {
        let out = form("<form:submit id=\"go\" value=\"Send\"/><form:reset id=\"r\"/>\
                        <form:errors><ul>[error]<li>%param: %error</li>[/error]</ul></form:errors>");
        assert!(out.forms[0].fields.is_empty());
        let html = render(&out, &RequestContext::get());
        assert_eq!(html, "<form id=\"f\">\n\
                          <input id=\"go\" type=\"submit\" value=\"Send\"><input id=\"r\" type=\"reset\">\
                          </form>");
        let mut errors = BTreeMap::new();
        errors.insert("a".to_string(), "Required".to_string());
        errors.insert("b".to_string(), "Too <long>".to_string());
        let html = out.view.render(&empty_post(), &errors).unwrap();
        assert!(html.contains("<ul><li>a: Required</li><li>b: Too &lt;long&gt;</li></ul>"));
    }
}
