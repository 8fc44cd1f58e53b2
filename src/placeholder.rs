//! Placeholder substitution.
//!
//! In attribute values (when the tag is read): `{#name}` static
//! attribute, `{$expr}` expression over the configured variables,
//! `{NAME}` configured constant. `{{…}}` is left alone there.
//!
//! In the compiled output (after the whole template was read), in
//! addition: `{{#name}}` static attribute, `{{expr}}` escaped output of
//! an expression evaluated per request, `{%$name = expr%}` assignment
//! per request.

use std::collections::BTreeMap;

use kstring::KString;
use serde_json::{Map, Value};

use crate::error::{CompileErrorKind, CompileResult, Location};
use crate::expr::{self, to_text, ObjectScope, ParseError};
use crate::scanner::line_column;
use crate::statics::StaticStore;
use crate::view::{Fragment, Segment};

pub struct Placeholders<'c> {
    pub statics: &'c StaticStore,
    pub constants: &'c BTreeMap<String, String>,
    pub variables: &'c Map<String, Value>,
}

/// A placeholder that failed to parse: its full text and the reason.
struct Failure {
    placeholder: String,
    error: ParseError,
}

fn is_constant_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<'c> Placeholders<'c> {
    fn static_value(&self, name: &str) -> String {
        self.statics.get(name.trim()).unwrap_or("").to_string()
    }

    /// The replacement of a single-brace placeholder `{inner}`, if it is
    /// one.
    fn single(&self, inner: &str) -> Result<Option<String>, ParseError> {
        if let Some(name) = inner.strip_prefix('#') {
            Ok(Some(self.static_value(name)))
        } else if inner.starts_with('$') {
            let e = expr::parse(inner)?;
            Ok(Some(to_text(&e.eval(&ObjectScope(self.variables)))))
        } else if is_constant_name(inner) {
            Ok(self.constants.get(inner).cloned())
        } else {
            Ok(None)
        }
    }

    fn expand_text(&self, text: &str, final_pass: bool) -> Result<Vec<Segment>, Failure> {
        let mut out = Fragment::new();
        let mut rest = text;
        while let Some(i) = rest.find('{') {
            out.push_text(&rest[..i]);
            let at = &rest[i..];
            let fail = |len: usize, error: ParseError| Failure {
                placeholder: at[..len].to_string(), error
            };
            if let Some(after) = at.strip_prefix("{{") {
                // `{{…}}`, with no `}` inside
                let closing = after.find('}').filter(|j| after[j + 1..].starts_with('}'));
                match closing {
                    Some(j) if j > 0 => {
                        let len = 2 + j + 2;
                        let inner = &after[..j];
                        if !final_pass {
                            out.push_text(&at[..len]);
                        } else if let Some(name) = inner.strip_prefix('#') {
                            out.push_text(&self.static_value(name));
                        } else {
                            let e = expr::parse(inner).map_err(|e| fail(len, e))?;
                            out.push(Segment::Echo(e));
                        }
                        rest = &at[len..];
                        continue;
                    }
                    _ => (),
                }
            }
            if final_pass {
                if let Some(after) = at.strip_prefix("{%") {
                    let line = after.split('\n').next().unwrap_or("");
                    if let Some(j) = line.find("%}") {
                        let len = 2 + j + 2;
                        let (name, e) = expr::parse_assignment(after[..j].trim())
                            .map_err(|e| fail(len, e))?;
                        out.push(Segment::Assign(name, e));
                        rest = &at[len..];
                        continue;
                    }
                }
            }
            if let Some(j) = at[1..].find('}') {
                let inner = &at[1..1 + j];
                let len = j + 2;
                if !inner.is_empty() && !inner.contains('{') {
                    if let Some(replacement) = self.single(inner).map_err(|e| fail(len, e))? {
                        out.push_text(&replacement);
                        rest = &at[len..];
                        continue;
                    }
                }
            }
            out.push_text("{");
            rest = &at[1..];
        }
        out.push_text(rest);
        Ok(out.0)
    }

    /// Substitute the placeholders of an attribute value of the tag at
    /// `location`.
    pub fn substitute_attribute(&self, value: &str, location: &Location) -> CompileResult<String> {
        if !value.contains('{') {
            return Ok(value.to_string());
        }
        let segments = self.expand_text(value, false).map_err(|f| {
            CompileErrorKind::Expression {
                location: location.clone(),
                source_text: f.placeholder,
                message: f.error.to_string(),
            }
        })?;
        Ok(Fragment(segments).plain_text())
    }

    /// The final pass over the compiled body of template `file` (whose
    /// text is `source`, for error locations).
    pub fn expand(&self, body: Fragment, source: &str, file: &KString) -> CompileResult<Fragment> {
        let mut out = Fragment::new();
        for segment in body.0 {
            match segment {
                Segment::Text(text) => {
                    let segments = self.expand_text(&text, true).map_err(|f| {
                        let (line, column) = source.find(&f.placeholder)
                            .map_or((1, 1), |offset| line_column(source, offset));
                        CompileErrorKind::Expression {
                            location: Location { file: file.clone(), line, column },
                            source_text: f.placeholder,
                            message: f.error.to_string(),
                        }
                    })?;
                    for s in segments {
                        out.push(s);
                    }
                }
                Segment::IfErrors(inner) => {
                    out.push(Segment::IfErrors(self.expand(inner, source, file)?));
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn with<T>(f: impl FnOnce(&Placeholders) -> T) -> T {
        let mut statics = StaticStore::new();
        statics.set("lang", "de");
        let mut constants = BTreeMap::new();
        constants.insert("SITE".to_string(), "Example".to_string());
        let variables = json!({"user": {"name": "Ann"}, "n": 2});
        let variables = variables.as_object().cloned().unwrap_or_default();
        f(&Placeholders { statics: &statics, constants: &constants, variables: &variables })
    }

    fn location() -> Location {
        Location { file: KString::from_static("t.tpl"), line: 4, column: 2 }
    }

    #[test]
    fn t_attribute() {
        with(|p| {
            assert_eq!(p.substitute_attribute("{#lang}-{$user.name}-{SITE}-{NOPE}-{#unset}",
                                              &location()).unwrap(),
                       "de-Ann-Example-{NOPE}-");
            assert_eq!(p.substitute_attribute("{{$x}} {$n + 1}", &location()).unwrap(),
                       "{{$x}} 3");
            assert_eq!(p.substitute_attribute("a { b } {", &location()).unwrap(),
                       "a { b } {");
            let e = p.substitute_attribute("{$x(}", &location()).unwrap_err();
            assert!(matches!(e.kind(), CompileErrorKind::Expression { location, .. }
                             if location.line == 4));
        })
    }

    #[test]
    fn t_final_pass() {
        with(|p| {
            let body = Fragment::text("<p>{{#lang}} {{$user}}{%$x = 1%}{SITE}</p>");
            let out = p.expand(body, "", &KString::from_static("t.tpl")).unwrap();
            assert_eq!(out.segments().len(), 4);
            assert_eq!(out.segments()[0], Segment::Text("<p>de ".into()));
            assert!(matches!(&out.segments()[1], Segment::Echo(_)));
            assert!(matches!(&out.segments()[2], Segment::Assign(name, _) if name == "x"));
            assert_eq!(out.segments()[3], Segment::Text("Example</p>".into()));
        })
    }

    #[test]
    fn t_final_pass_error_location() {
        with(|p| {
            let source = "line one\n  {{ 1 < }}";
            let e = p.expand(Fragment::text(source), source, &KString::from_static("t.tpl"))
                .unwrap_err();
            match e.kind() {
                CompileErrorKind::Expression { location, source_text, .. } => {
                    assert_eq!((location.line, location.column), (2, 3));
                    assert_eq!(source_text, "{{ 1 < }}");
                }
                _ => panic!("unexpected error {e}"),
            }
        })
    }
}
