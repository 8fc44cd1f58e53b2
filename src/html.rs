//! HTML text helpers for rendering.

use std::fmt::Write;

use kstring::KString;

pub fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_escaped(&mut out, s);
    out
}

/// Whether an attribute is passed through to the HTML element. Keys
/// with a colon (`x:required` etc.) are compiler directives.
pub fn is_html_attribute(key: &str) -> bool {
    !key.contains(':')
}

/// ` key="value"` for each of `attributes`, in the given order. Values
/// are written verbatim, they may carry `{{…}}` placeholders.
pub fn attribute_string<'a>(
    attributes: impl IntoIterator<Item = (&'a KString, &'a KString)>
) -> String {
    let mut out = String::new();
    for (key, value) in attributes {
        if is_html_attribute(key) {
            let _ = write!(&mut out, " {}=\"{}\"", key, value);
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn t_escape() {
        assert_eq!(html_escape("<a href=\"x\">'&'</a>"),
                   "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn t_attribute_string() {
        let mut attrs = BTreeMap::new();
        attrs.insert(KString::from_static("name"), KString::from_static("a"));
        attrs.insert(KString::from_static("x:required"), KString::from_static("1"));
        attrs.insert(KString::from_static("class"), KString::from_static("w"));
        assert_eq!(attribute_string(&attrs), " class=\"w\" name=\"a\"");
    }
}
