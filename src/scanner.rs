//! Finding the tags of known namespaces in template text.

use itertools::Itertools;
use kstring::KString;
use lazy_static::lazy_static;
use regex::Regex;

/// One tag as it appears in the source. `start..end` spans the whole
/// tag including the brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub closing: bool,
    pub self_closing: bool,
    pub namespace: KString,
    /// With hyphens removed, lower-cased.
    pub name: KString,
    pub attr_text: String,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

/// 1-based line, and the column counted from the last newline before
/// `offset` (1-based as well).
pub fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(nl) => offset - nl,
        None => offset + 1,
    };
    (line as u32, column as u32)
}

/// Position right after the end of the tag whose attribute text starts
/// at `from`, and whether it ends in `/>`. A `>` directly preceded by
/// `-` does not end a tag (so `->` can appear in attribute values).
fn find_tag_end(text: &str, from: usize) -> Option<(usize, usize, bool)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'>') => return Some((i, i + 2, true)),
            b'>' if i == 0 || bytes[i - 1] != b'-' => return Some((i, i + 1, false)),
            _ => i += 1,
        }
    }
    None
}

fn start_regex(namespaces: &[KString]) -> Option<Regex> {
    if namespaces.is_empty() {
        return None;
    }
    let alternation = namespaces.iter().map(|ns| regex::escape(ns)).join("|");
    // The alternation only contains escaped literals, so this can't fail.
    Regex::new(&format!(r"(?i)(</|<)({alternation}):([^\s/>]+)")).ok()
}

/// Every tag of one of `namespaces` in `text`, in document order. Tag
/// lookalikes of other namespaces, and tags that never end, are plain
/// text.
pub fn scan(text: &str, namespaces: &[KString]) -> Vec<Occurrence> {
    let re = match start_regex(namespaces) {
        Some(re) => re,
        None => return Vec::new(),
    };
    let mut occurrences = Vec::new();
    let mut pos = 0;
    while let Some(caps) = re.captures_at(text, pos) {
        let (whole, bracket, ns, name) = match (caps.get(0), caps.get(1), caps.get(2), caps.get(3)) {
            (Some(w), Some(b), Some(ns), Some(n)) => (w, b, ns, n),
            _ => break,
        };
        let attr_start = whole.end();
        match find_tag_end(text, attr_start) {
            Some((attr_end, end, self_closing)) => {
                let (line, column) = line_column(text, whole.start());
                // Namespaces match case-insensitively; report the
                // registered spelling.
                let namespace = namespaces.iter()
                    .find(|n| n.eq_ignore_ascii_case(ns.as_str()))
                    .cloned()
                    .unwrap_or_else(|| KString::from_ref(ns.as_str()));
                occurrences.push(Occurrence {
                    closing: bracket.as_str() == "</",
                    self_closing,
                    namespace,
                    name: KString::from_string(
                        name.as_str().replace('-', "").to_ascii_lowercase()),
                    attr_text: text[attr_start..attr_end].trim().to_string(),
                    start: whole.start(),
                    end,
                    line,
                    column,
                });
                pos = end;
            }
            None => {
                pos = whole.start() + 1;
            }
        }
    }
    occurrences
}

lazy_static! {
    static ref ATTRIBUTE: Regex = Regex::new(r#"([^\s="]+)="([^"]*)""#)
        .expect("valid attribute regex");
}

/// `name="value"` pairs in order of appearance. Anything else in the
/// attribute text is ignored.
pub fn parse_attributes(attr_text: &str) -> Vec<(KString, KString)> {
    ATTRIBUTE.captures_iter(attr_text)
        .filter_map(|caps| {
            let key = caps.get(1)?;
            let value = caps.get(2)?;
            Some((KString::from_ref(key.as_str()), KString::from_ref(value.as_str())))
        })
        .collect()
}
