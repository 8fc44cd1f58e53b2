//! Compiled views: text interleaved with typed dynamic segments,
//! rendered per request.

use std::collections::BTreeMap;

use anyhow::Result;
use kstring::KString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::{lookup_path, to_text, Expr, Scope};
use crate::html::{html_escape, push_escaped};
use crate::options::OptionSource;
use crate::request::{Method, RequestContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Text(String),
    /// `{{expr}}`, escaped.
    Echo(Expr),
    /// `{%$name = expr%}`
    Assign(String, Expr),
    /// The submitted value of a field, escaped. With no submission, a
    /// GET request shows `default`, a POST request nothing.
    FieldValue { name: String, default: Option<String> },
    /// ` checked="checked"` for a checkbox whose submitted value is
    /// `on` (or, on a GET without submission, whose default is).
    Checked { name: String, on: String, default: Option<String> },
    /// ` checked="checked"` for the radio button carrying `value`.
    RadioChecked { name: String, value: String, default: Option<String> },
    /// `<option>` elements of a select, marked selected per the
    /// submitted value(s).
    Options { name: String, source: OptionSource, default: Option<String>, multiple: bool },
    /// Rendered only if validation left errors.
    IfErrors(Fragment),
    /// Repeated per error, with `%param` and `%error` replaced.
    EachError(String),
}

/// An ordered list of segments. Appended text is merged into a
/// trailing text segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment(pub Vec<Segment>);

impl Fragment {
    pub fn new() -> Self {
        Fragment(Vec::new())
    }

    pub fn text(s: impl Into<String>) -> Self {
        let mut f = Fragment::new();
        f.push_text(&s.into());
        f
    }

    pub fn push_text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.0.last_mut() {
            last.push_str(s);
        } else {
            self.0.push(Segment::Text(s.to_string()));
        }
    }

    pub fn push(&mut self, segment: Segment) {
        match segment {
            Segment::Text(s) => self.push_text(&s),
            other => self.0.push(other),
        }
    }

    pub fn append(&mut self, other: Fragment) {
        for segment in other.0 {
            self.push(segment);
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The concatenated literal text, ignoring dynamic segments.
    pub fn plain_text(&self) -> String {
        self.0.iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl From<&str> for Fragment {
    fn from(s: &str) -> Self {
        Fragment::text(s)
    }
}


/// A compiled template, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub source: KString,
    pub body: Fragment,
}

struct RenderScope<'r> {
    request: &'r RequestContext,
    errors: &'r BTreeMap<String, String>,
    locals: BTreeMap<String, Value>,
}

impl<'r> Scope for RenderScope<'r> {
    /// Locals first, then `params`, `errors`, `method`, then the request
    /// attributes.
    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        if let Some(v) = self.locals.get(first) {
            return lookup_path(v, rest);
        }
        match first.as_str() {
            "params" => lookup_path(
                &Value::Object(self.request.params.clone().into_iter().collect()), rest),
            "errors" => lookup_path(
                &Value::Object(self.errors.iter()
                               .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                               .collect()),
                rest),
            "method" if rest.is_empty() => Some(Value::String(
                self.request.method.as_str().into())),
            _ => lookup_path(self.request.attribs.get(first)?, rest),
        }
    }
}

impl<'r> RenderScope<'r> {
    /// The displayed value of a single-valued field.
    fn field_value(&self, name: &str, default: &Option<String>) -> String {
        match self.request.param(name) {
            None => match self.request.method {
                Method::Get => default.clone().unwrap_or_default(),
                Method::Post => String::new(),
            },
            Some(Value::String(s)) => s.clone(),
            Some(_) => String::new(),
        }
    }

    fn render(&mut self, fragment: &Fragment, out: &mut String) {
        for segment in fragment.segments() {
            match segment {
                Segment::Text(s) => out.push_str(s),
                Segment::Echo(e) => {
                    let v = e.eval(&*self);
                    push_escaped(out, &to_text(&v));
                }
                Segment::Assign(name, e) => {
                    let v = e.eval(&*self);
                    self.locals.insert(name.clone(), v);
                }
                Segment::FieldValue { name, default } => {
                    push_escaped(out, &self.field_value(name, default));
                }
                Segment::Checked { name, on, default } => {
                    let checked = match self.request.param(name) {
                        Some(Value::String(s)) => s == on,
                        Some(_) => false,
                        None => self.request.method == Method::Get
                            && default.as_deref() == Some(on.as_str()),
                    };
                    if checked {
                        out.push_str(" checked=\"checked\"");
                    }
                }
                Segment::RadioChecked { name, value, default } => {
                    if self.field_value(name, default) == *value {
                        out.push_str(" checked=\"checked\"");
                    }
                }
                Segment::Options { name, source, default, multiple } => {
                    let selected: Vec<String> = if *multiple {
                        match self.request.param(name) {
                            Some(Value::Array(items)) => items.iter().map(to_text).collect(),
                            _ => Vec::new(),
                        }
                    } else {
                        vec![self.field_value(name, default)]
                    };
                    for option in source.resolve(self.request) {
                        out.push_str("<option value=\"");
                        push_escaped(out, &option.value);
                        out.push('"');
                        if selected.contains(&option.value) {
                            out.push_str(" selected=\"selected\"");
                        }
                        out.push('>');
                        push_escaped(out, &option.title);
                        out.push_str("</option>\n");
                    }
                }
                Segment::IfErrors(body) => {
                    if !self.errors.is_empty() {
                        self.render(body, out);
                    }
                }
                Segment::EachError(template) => {
                    for (param, error) in self.errors {
                        out.push_str(&template
                                     .replace("%param", &html_escape(param))
                                     .replace("%error", &html_escape(error)));
                    }
                }
            }
        }
    }
}

impl View {
    pub fn render(
        &self,
        request: &RequestContext,
        errors: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut scope = RenderScope { request, errors, locals: BTreeMap::new() };
        let mut out = String::new();
        scope.render(&self.body, &mut out);
        Ok(out)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{expr, options::SelectOption};

    use super::*;

    fn view(segments: Vec<Segment>) -> View {
        View { source: KString::from_static("t.tpl"), body: Fragment(segments) }
    }

    #[test]
    fn t_push_text_merges() {
        let mut f = Fragment::text("a");
        f.push_text("b");
        f.push(Segment::Echo(Expr::Literal(json!(1))));
        f.push(Segment::Text("c".into()));
        f.push_text("");
        assert_eq!(f.segments().len(), 3);
        assert_eq!(f.plain_text(), "abc");
    }

    #[test]
    fn t_field_value() {
        let v = view(vec![
            Segment::Text("<input value=\"".into()),
            Segment::FieldValue { name: "a".into(), default: Some("def".into()) },
            Segment::Text("\">".into()),
        ]);
        let no_errors = BTreeMap::new();
        assert_eq!(v.render(&RequestContext::get(), &no_errors).unwrap(),
                   "<input value=\"def\">");
        let empty_post = RequestContext { method: Method::Post, ..RequestContext::default() };
        assert_eq!(v.render(&empty_post, &no_errors).unwrap(),
                   "<input value=\"\">");
        assert_eq!(v.render(&RequestContext::post([("a", json!("<b>"))]), &no_errors).unwrap(),
                   "<input value=\"&lt;b&gt;\">");
    }

    #[test]
    fn t_select_marks_submitted_option() {
        let source = OptionSource::Static(vec![
            SelectOption { title: "A".into(), value: "1".into() },
            SelectOption { title: "B".into(), value: "2".into() },
        ]);
        let v = view(vec![Segment::Options {
            name: "s".into(), source, default: None, multiple: false
        }]);
        let out = v.render(&RequestContext::post([("s", json!("2"))]), &BTreeMap::new()).unwrap();
        assert_eq!(out, "<option value=\"1\">A</option>\n\
                         <option value=\"2\" selected=\"selected\">B</option>\n");
    }

    #[test]
    fn t_echo_assign_and_errors() {
        let (name, e) = expr::parse_assignment("$greeting = 'Hi ' ~ $user").unwrap();
        let v = view(vec![
            Segment::Assign(name, e),
            Segment::Echo(expr::parse("$greeting").unwrap()),
            Segment::IfErrors(Fragment(vec![
                Segment::Text("<ul>".into()),
                Segment::EachError("<li>%param: %error</li>".into()),
                Segment::Text("</ul>".into()),
            ])),
        ]);
        let request = RequestContext::get().with_attrib("user", json!("<Ann>"));
        let mut errors = BTreeMap::new();
        assert_eq!(v.render(&request, &errors).unwrap(), "Hi &lt;Ann&gt;");
        errors.insert("email".to_string(), "Required".to_string());
        assert_eq!(v.render(&request, &errors).unwrap(),
                   "Hi &lt;Ann&gt;<ul><li>email: Required</li></ul>");
    }

    #[test]
    fn t_json_roundtrip() {
        let v = view(vec![Segment::Checked {
            name: "c".into(), on: "yes".into(), default: Some("yes".into())
        }]);
        let back = View::from_json(&v.to_json().unwrap()).unwrap();
        assert_eq!(back, v);
        assert_eq!(back.render(&RequestContext::get(), &BTreeMap::new()).unwrap(),
                   " checked=\"checked\"");
    }
}
