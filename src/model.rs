//! Runtime form models: the validator definition the form compiler
//! produces, and its evaluation against a request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expr::{lookup_path, truthy, Expr, Scope};
use crate::request::RequestContext;
use crate::rules::FieldValidator;
use crate::util::ucfirst;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPredicate {
    pub id: String,
    /// `$name` reads the value of field `name`.
    pub condition: Expr,
}

/// The compiled validator of one form, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormModelDef {
    /// `<Capitalized form id>FormModel`
    pub type_name: String,
    pub form_id: String,
    pub extends: Option<String>,
    pub fields: Vec<String>,
    pub groups: Vec<GroupPredicate>,
    pub validators: Vec<FieldValidator>,
}

/// `contact` -> `ContactFormModel`.
pub fn type_name_for(form_id: &str) -> String {
    format!("{}FormModel", ucfirst(form_id))
}

/// Application code run for forms declaring `x:extend`, after the
/// generated field validation.
pub trait BaseModel: Send + Sync {
    fn validate_extra(&self, model: &mut FormModel);
}

/// The base types `x:extend` can name.
#[derive(Default)]
pub struct BaseModels {
    models: BTreeMap<String, Box<dyn BaseModel>>,
}

impl BaseModels {
    pub fn new() -> Self {
        BaseModels::default()
    }

    pub fn register(&mut self, name: &str, model: Box<dyn BaseModel>) {
        self.models.insert(name.to_string(), model);
    }

    pub fn get(&self, name: &str) -> Option<&dyn BaseModel> {
        self.models.get(name).map(|b| &**b)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }
}

pub struct FormModel<'r> {
    def: &'r FormModelDef,
    request: &'r RequestContext,
    fields: Vec<String>,
    values: BTreeMap<String, Value>,
    errors: BTreeMap<String, String>,
    groups: BTreeMap<String, bool>,
}

impl<'r> Scope for FormModel<'r> {
    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        lookup_path(self.values.get(first)?, rest)
    }
}

impl<'r> FormModel<'r> {
    /// Values start as `initial_values`, overridden by the submitted
    /// request parameters. Group predicates are evaluated against these.
    pub fn new(
        def: &'r FormModelDef,
        request: &'r RequestContext,
        initial_values: BTreeMap<String, Value>,
    ) -> Self {
        let mut values = initial_values;
        for (k, v) in &request.params {
            values.insert(k.clone(), v.clone());
        }
        let mut model = FormModel {
            def,
            request,
            fields: def.fields.clone(),
            values,
            errors: BTreeMap::new(),
            groups: BTreeMap::new(),
        };
        for group in &def.groups {
            let on = truthy(&group.condition.eval(&model));
            model.groups.insert(group.id.clone(), on);
        }
        model
    }

    pub fn definition(&self) -> &FormModelDef {
        self.def
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    /// Run every field's validation, even after failures. True if no
    /// errors were recorded.
    pub fn validate(&mut self) -> bool {
        let def = self.def;
        for validator in &def.validators {
            if !self.fields.contains(&validator.name) {
                self.fields.push(validator.name.clone());
            }
            validator.run(self);
        }
        self.errors.is_empty()
    }

    /// Like `validate`, then runs the extra validation of the base type
    /// named by `x:extend`, if there is one.
    pub fn validate_with(&mut self, bases: &BaseModels) -> bool {
        self.validate();
        let def = self.def;
        if let Some(base) = def.extends.as_deref().and_then(|name| bases.get(name)) {
            base.validate_extra(self);
        }
        self.errors.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.retain(|f| f != name);
        self.values.remove(name)
    }

    /// Whether the group predicate `id` held; unknown groups don't.
    pub fn group(&self, id: &str) -> bool {
        self.groups.get(id).copied().unwrap_or(false)
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(|s| s.as_str())
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn set_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    pub fn remove_error(&mut self, name: &str) -> Option<String> {
        self.errors.remove(name)
    }

    /// Every field with its value (null if unset).
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.iter()
            .map(|f| (f.clone(), self.get(f).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Like `to_map`, with empty strings as null.
    pub fn to_map_null_empty(&self) -> Map<String, Value> {
        self.to_map().into_iter()
            .map(|(k, v)| match v {
                Value::String(s) if s.is_empty() => (k, Value::Null),
                v => (k, v),
            })
            .collect()
    }

    /// Like `to_map`, leaving out unset fields and empty strings.
    pub fn to_map_skip_empty(&self) -> Map<String, Value> {
        self.to_map().into_iter()
            .filter(|(_, v)| match v {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .collect()
    }
}
