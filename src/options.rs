//! The bracketed option lists of select, multiselect and radio tags:
//! `[Title, value]` or `[value]`.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{expr::to_text, request::RequestContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub title: String,
    pub value: String,
}

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"\[([^\]]*)\]").expect("valid option regex");
}

/// Options in document order. A `[…]` with a comma is title and value
/// (split at the first comma), without one the value doubles as the
/// title. Both are trimmed; empty brackets are ignored.
pub fn parse_options(body: &str) -> Vec<SelectOption> {
    BRACKETED.captures_iter(body)
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let (title, value) = match inner.split_once(',') {
                Some((t, v)) => (t.trim(), v.trim()),
                None => (inner.trim(), inner.trim()),
            };
            if title.is_empty() && value.is_empty() {
                None
            } else {
                Some(SelectOption { title: title.into(), value: value.into() })
            }
        })
        .collect()
}

/// The non-empty `[…]` tokens of `text`: the span of the whole token
/// and the exact text between the brackets.
pub fn bracket_spans(text: &str) -> Vec<(Range<usize>, &str)> {
    BRACKETED.captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str())))
        .filter(|(_, inner)| !inner.is_empty())
        .collect()
}

/// The bracketed values of a radio body, untrimmed (they are
/// substituted in place).
pub fn parse_radio_values(body: &str) -> Vec<String> {
    bracket_spans(body).into_iter()
        .map(|(_, inner)| inner.to_string())
        .collect()
}

/// Where the options of a field come from. Both the rendered control
/// and validation use the same source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionSource {
    Static(Vec<SelectOption>),
    /// A request attribute holding a list of objects.
    Bound { attrib: String, title_key: String, value_key: String },
}

impl OptionSource {
    pub fn resolve(&self, request: &RequestContext) -> Vec<SelectOption> {
        match self {
            OptionSource::Static(options) => options.clone(),
            OptionSource::Bound { attrib, title_key, value_key } => {
                match request.attribs.get(attrib) {
                    Some(Value::Array(items)) => items.iter()
                        .map(|item| SelectOption {
                            title: item.get(title_key).map(to_text).unwrap_or_default(),
                            value: item.get(value_key).map(to_text).unwrap_or_default(),
                        })
                        .collect(),
                    _ => Vec::new(),
                }
            }
        }
    }

    pub fn contains(&self, request: &RequestContext, value: &str) -> bool {
        self.resolve(request).iter().any(|o| o.value == value)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn opt(title: &str, value: &str) -> SelectOption {
        SelectOption { title: title.into(), value: value.into() }
    }

    #[test]
    fn t_parse_options() {
        assert_eq!(parse_options("[A,1]\n[B, 2] [ C ] []"),
                   vec![opt("A", "1"), opt("B", "2"), opt("C", "C")]);
        assert_eq!(parse_options("[x, a,b]"), vec![opt("x", "a,b")]);
    }

    #[test]
    fn t_bound() {
        let request = RequestContext::get()
            .with_attrib("countries", json!([{"name": "Swiss", "code": "ch"},
                                             {"name": "German", "code": 49}]));
        let source = OptionSource::Bound {
            attrib: "countries".into(),
            title_key: "name".into(),
            value_key: "code".into(),
        };
        assert_eq!(source.resolve(&request), vec![opt("Swiss", "ch"), opt("German", "49")]);
        assert!(source.contains(&request, "49"));
        assert!(!OptionSource::Bound {
            attrib: "missing".into(), title_key: "t".into(), value_key: "v".into()
        }.contains(&request, ""));
    }
}
