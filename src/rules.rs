//! The validation IR emitted by the form compiler: per field, a list of
//! initializers that prepare the value, then a chain of rules of which
//! only the first matching one takes effect.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::FormModel;
use crate::options::OptionSource;
use crate::request::{UploadStatus, UploadedFile};
use crate::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Start from the field's current value in the model.
    GetValue,
    /// Anything but a string becomes "".
    EnsureString,
    /// Anything but a list becomes an empty list.
    EnsureList,
    /// Remove ASCII control characters; with `keep_whitespace`, tab,
    /// newline and carriage return stay.
    StripControl { keep_whitespace: bool },
    StripMarkup,
    RemoveChars(String),
    /// Remove every character not in the set.
    KeepChars(String),
    /// Look up the uploaded file of the field.
    GetFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    /// Matches an empty value. Only reports `message` if the field is
    /// required, and, with a group, only if the group predicate is true;
    /// either way the rest of the chain is skipped.
    Required { required: bool, group: Option<String>, message: String },
    MinLength { min: usize, message: String },
    MaxLength { max: usize, message: String },
    /// Matches a value that isn't all digits.
    Number { message: String },
    MinSize { min: f64, message: String },
    MaxSize { max: f64, message: String },
    /// Matches a value the pattern does not match.
    Pattern { pattern: String, message: String },
    /// Matches a value other than `on`, which is replaced by `off`.
    /// Never reports an error.
    CheckboxOnOff { on: String, off: String },
    InOptions { source: OptionSource, message: String },
    /// For list values: matches if any member is not an option.
    AllInOptions { source: OptionSource, message: String },
    /// Like `Required`, for a missing upload.
    FileRequired { required: bool, group: Option<String>, message: String },
    /// A failed upload; an upload over the server's size limit reports
    /// `size_message`.
    UploadError { message: String, size_message: String },
    MinFileSize { min: u64, message: String },
    MaxFileSize { max: u64, message: String },
}

/// Validation of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidator {
    pub name: String,
    pub initializers: Vec<Initializer>,
    pub rules: Vec<Rule>,
}

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"(?s)<!--.*?(-->|$)|<[^>]*(>|$)")
        .expect("valid markup regex");
}

pub fn strip_markup(s: &str) -> String {
    MARKUP.replace_all(s, "").into_owned()
}

pub fn strip_control(s: &str, keep_whitespace: bool) -> String {
    s.chars()
        .filter(|c| {
            let control = c.is_ascii_control();
            !control || (keep_whitespace && matches!(c, '\t' | '\n' | '\r'))
        })
        .collect()
}

/// Translate a pattern in `/…/flags` (or `#…#flags` etc.) notation to
/// the regex syntax, with the flags as an inline group. Patterns without
/// delimiters are used as they are.
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut chars = pattern.chars();
    let delimiter = match chars.next() {
        Some(c) if !c.is_alphanumeric() && !c.is_whitespace() && c != '\\'
            && c != '^' && c != '(' && c != '[' => c,
        _ => return pattern.to_string(),
    };
    let closing = match delimiter {
        '{' => '}',
        '<' => '>',
        c => c,
    };
    let rest = &pattern[delimiter.len_utf8()..];
    match rest.rfind(closing) {
        Some(end) => {
            let flags: String = rest[end + closing.len_utf8()..].chars()
                .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'U'))
                .collect();
            let body = &rest[..end];
            if flags.is_empty() {
                body.to_string()
            } else {
                format!("(?{flags}){body}")
            }
        }
        None => pattern.to_string(),
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn text_of(v: &Value) -> &str {
    v.as_str().unwrap_or("")
}

/// The value being validated, plus the upload for file fields.
struct FieldState {
    value: Value,
    file: Option<UploadedFile>,
}

impl FieldValidator {
    /// Run the initializers and the first matching rule against the
    /// model, recording at most one error for the field.
    pub fn run(&self, model: &mut FormModel) {
        let mut state = FieldState { value: Value::Null, file: None };
        for initializer in &self.initializers {
            self.initialize(initializer, &mut state, model);
        }
        for rule in &self.rules {
            if self.apply(rule, &mut state, model) {
                break;
            }
        }
    }

    fn replace(&self, state: &mut FieldState, model: &mut FormModel, s: String) {
        state.value = Value::String(s);
        model.set(&self.name, state.value.clone());
    }

    /// Record `message` for the field; returns true (the rule matched).
    fn fail(&self, model: &mut FormModel, message: &str) -> bool {
        model.set_error(&self.name, message);
        true
    }

    fn initialize(&self, initializer: &Initializer, state: &mut FieldState, model: &mut FormModel) {
        let name = self.name.as_str();
        match initializer {
            Initializer::GetValue => {
                state.value = model.get(name).cloned().unwrap_or(Value::Null);
            }
            Initializer::EnsureString => {
                if !state.value.is_string() {
                    if !state.value.is_null() {
                        warn!("field {name:?}: non-string value {} replaced by \"\"",
                              state.value);
                    }
                    self.replace(state, model, String::new());
                }
            }
            Initializer::EnsureList => {
                if !state.value.is_array() {
                    state.value = Value::Array(Vec::new());
                    model.set(name, state.value.clone());
                }
            }
            Initializer::StripControl { keep_whitespace } => {
                let s = strip_control(text_of(&state.value), *keep_whitespace);
                self.replace(state, model, s);
            }
            Initializer::StripMarkup => {
                let s = strip_markup(text_of(&state.value));
                self.replace(state, model, s);
            }
            Initializer::RemoveChars(chars) => {
                let s = text_of(&state.value).chars().filter(|c| !chars.contains(*c)).collect();
                self.replace(state, model, s);
            }
            Initializer::KeepChars(chars) => {
                let s = text_of(&state.value).chars().filter(|c| chars.contains(*c)).collect();
                self.replace(state, model, s);
            }
            Initializer::GetFile => {
                state.file = model.request().files.get(name).cloned();
            }
        }
    }

    /// Whether `rule` matched (which ends the chain).
    fn apply(&self, rule: &Rule, state: &mut FieldState, model: &mut FormModel) -> bool {
        let name = self.name.as_str();
        let required_here = |model: &FormModel, required: bool, group: &Option<String>| {
            required && group.as_ref().map_or(true, |g| model.group(g))
        };
        match rule {
            Rule::Required { required, group, message } => {
                if !is_empty_value(&state.value) {
                    return false;
                }
                if required_here(&*model, *required, group) {
                    self.fail(model, message);
                }
                true
            }
            Rule::MinLength { min, message } =>
                text_of(&state.value).chars().count() < *min && self.fail(model, message),
            Rule::MaxLength { max, message } =>
                text_of(&state.value).chars().count() > *max && self.fail(model, message),
            Rule::Number { message } => {
                let s = text_of(&state.value);
                (s.is_empty() || !s.chars().all(|c| c.is_ascii_digit())) && self.fail(model, message)
            }
            Rule::MinSize { min, message } => {
                let n: f64 = text_of(&state.value).parse().unwrap_or(0.0);
                n < *min && self.fail(model, message)
            }
            Rule::MaxSize { max, message } => {
                let n: f64 = text_of(&state.value).parse().unwrap_or(0.0);
                n > *max && self.fail(model, message)
            }
            Rule::Pattern { pattern, message } => {
                match Regex::new(&pattern_to_regex(pattern)) {
                    Ok(re) => !re.is_match(text_of(&state.value)) && self.fail(model, message),
                    Err(e) => {
                        warn!("field {name:?}: unusable pattern {pattern:?}: {e}");
                        self.fail(model, message)
                    }
                }
            }
            Rule::CheckboxOnOff { on, off } => {
                if text_of(&state.value) != on {
                    state.value = Value::String(off.clone());
                    model.set(name, state.value.clone());
                    true
                } else {
                    false
                }
            }
            Rule::InOptions { source, message } => {
                let value = text_of(&state.value);
                !source.contains(model.request(), value) && self.fail(model, message)
            }
            Rule::AllInOptions { source, message } => {
                let options = source.resolve(model.request());
                let all = match &state.value {
                    Value::Array(items) => items.iter().all(
                        |item| options.iter().any(|o| item.as_str() == Some(o.value.as_str()))),
                    _ => true,
                };
                !all && self.fail(model, message)
            }
            Rule::FileRequired { required, group, message } => {
                let missing = match &state.file {
                    None => true,
                    Some(f) => f.status == UploadStatus::NoFile,
                };
                if !missing {
                    return false;
                }
                if required_here(&*model, *required, group) {
                    self.fail(model, message);
                }
                true
            }
            Rule::UploadError { message, size_message } => {
                match state.file.as_ref().map(|f| f.status) {
                    Some(UploadStatus::CantWrite | UploadStatus::Extension
                         | UploadStatus::NoTmpDir | UploadStatus::Partial) => self.fail(model, message),
                    Some(UploadStatus::IniSize) => self.fail(model, size_message),
                    _ => false,
                }
            }
            Rule::MinFileSize { min, message } => {
                let size = state.file.as_ref().map_or(0, |f| f.size);
                size < *min && self.fail(model, message)
            }
            Rule::MaxFileSize { max, message } => {
                let size = state.file.as_ref().map_or(0, |f| f.size);
                size > *max && self.fail(model, message)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_strip_markup() {
        assert_eq!(strip_markup("a<b>bold</b> <!-- x --> c <i"), "abold  c ");
    }

    #[test]
    fn t_strip_control() {
        assert_eq!(strip_control("a\tb\nc\u{7f}d\u{1}", false), "abcd");
        assert_eq!(strip_control("a\tb\nc\u{7f}d\u{1}", true), "a\tb\ncd");
    }

    #[test]
    fn t_pattern_to_regex() {
        assert_eq!(pattern_to_regex("#^a+$#i"), "(?i)^a+$");
        assert_eq!(pattern_to_regex("/x/"), "x");
        assert_eq!(pattern_to_regex("^[0-9]+$"), "^[0-9]+$");
        assert_eq!(pattern_to_regex("{a}s"), "(?s)a");
    }
}
