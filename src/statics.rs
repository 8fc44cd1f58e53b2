//! Compile-time conditionals: the static attribute store and the
//! `static:if` / `static:set` tags.

use std::collections::BTreeMap;

use crate::error::{CompileErrorKind, CompileResult};
use crate::node::TagHead;

/// Named string values set by `static:set` during one compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticStore {
    values: BTreeMap<String, String>,
}

impl StaticStore {
    pub fn new() -> Self {
        StaticStore::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equal { attr: String, value: String },
    NotEqual { attr: String, value: String },
    In { attr: String, items: Vec<String> },
    NotIn { attr: String, items: Vec<String> },
    IsSet(String),
    NotSet(String),
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(|item| item.trim().to_string()).collect()
}

impl Comparison {
    /// The first comparison attribute present wins, in the order
    /// equal, notequal, in, notin, isset, notset.
    pub fn from_head(head: &TagHead) -> CompileResult<Self> {
        let attr = || head.required_attr("attr").map(String::from);
        if let Some(value) = head.attr_string("equal") {
            Ok(Comparison::Equal { attr: attr()?, value })
        } else if let Some(value) = head.attr_string("notequal") {
            Ok(Comparison::NotEqual { attr: attr()?, value })
        } else if let Some(list) = head.attr("in") {
            Ok(Comparison::In { attr: attr()?, items: split_list(list) })
        } else if let Some(list) = head.attr("notin") {
            Ok(Comparison::NotIn { attr: attr()?, items: split_list(list) })
        } else if let Some(name) = head.attr_string("isset") {
            Ok(Comparison::IsSet(name))
        } else if let Some(name) = head.attr_string("notset") {
            Ok(Comparison::NotSet(name))
        } else {
            Err(CompileErrorKind::MissingComparison(head.tagref()).into())
        }
    }

    pub fn holds(&self, store: &StaticStore) -> bool {
        match self {
            Comparison::Equal { attr, value } => store.get(attr) == Some(value.as_str()),
            Comparison::NotEqual { attr, value } => store.get(attr) != Some(value.as_str()),
            Comparison::In { attr, items } => match store.get(attr) {
                Some(v) => items.iter().any(|i| i == v),
                None => false,
            },
            Comparison::NotIn { attr, items } => match store.get(attr) {
                Some(v) => !items.iter().any(|i| i == v),
                None => true,
            },
            Comparison::IsSet(name) => store.is_set(name),
            Comparison::NotSet(name) => !store.is_set(name),
        }
    }
}

/// `static:if`: its subtree is only compiled when the comparison holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfTag {
    comparison: Option<Comparison>,
}

impl IfTag {
    pub fn init(&mut self, head: &TagHead) -> CompileResult<()> {
        self.comparison = Some(Comparison::from_head(head)?);
        Ok(())
    }

    /// False for a tag that was never initialized (inside a skipped
    /// subtree).
    pub fn check(&self, store: &StaticStore) -> bool {
        self.comparison.as_ref().map_or(false, |c| c.holds(store))
    }
}

/// `static:set name="…" value="…"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetTag;

impl SetTag {
    pub fn init(&mut self, head: &TagHead, store: &mut StaticStore) -> CompileResult<()> {
        let name = head.required_attr("name")?;
        let value = head.attr_or("value", "");
        store.set(name, value);
        Ok(())
    }
}
