//! Tag kinds, and the capabilities they implement: rendering into the
//! parent's body, contributing field validation to the enclosing form,
//! and deciding whether their subtree is compiled at all.

use crate::config::{CompilerConfig, Messages};
use crate::error::CompileResult;
use crate::fields::{ButtonTag, CheckboxField, ErrorsTag, FileField, GroupTag, RadioField,
                    SelectField, TextField};
use crate::form::FormTag;
use crate::model::FormModelDef;
use crate::node::{Arena, TagHead, TagNode};
use crate::rules::FieldValidator;
use crate::statics::{IfTag, SetTag, StaticStore};
use crate::view::Fragment;

/// What a tag's initialization may look at and change. The tag being
/// initialized is not in the arena yet; its ancestors are.
pub struct InitCx<'s> {
    pub arena: &'s mut Arena,
    pub statics: &'s mut StaticStore,
    pub config: &'s CompilerConfig,
}

pub struct RenderCx<'s> {
    pub arena: &'s Arena,
    pub config: &'s CompilerConfig,
    /// Validator definitions of the forms rendered so far.
    pub forms: &'s mut Vec<FormModelDef>,
}

pub trait Renderable {
    /// The text the tag leaves in its parent's body, called when the
    /// tag is closed (or right away if it self-closes).
    fn render(&self, node: &TagNode, cx: &mut RenderCx) -> CompileResult<Fragment>;
}

pub trait ValidationContributor {
    fn collect_validation(
        &self,
        head: &TagHead,
        messages: &Messages,
    ) -> CompileResult<FieldValidator>;
}

pub trait StaticConditional {
    /// Evaluated once, right after initialization.
    fn check(&self, statics: &StaticStore) -> bool;
}

impl StaticConditional for IfTag {
    fn check(&self, statics: &StaticStore) -> bool {
        IfTag::check(self, statics)
    }
}

#[derive(Debug, Clone)]
pub enum TagKind {
    /// The synthetic node holding a whole template.
    Root,
    Form(FormTag),
    Text(TextField),
    Checkbox(CheckboxField),
    Select(SelectField),
    Radio(RadioField),
    File(FileField),
    Group(GroupTag),
    Button(ButtonTag),
    Errors(ErrorsTag),
    StaticIf(IfTag),
    StaticSet(SetTag),
}

impl TagKind {
    /// Called after the attributes are set, only outside of skipped
    /// subtrees. May add defaulted attributes to `head`.
    pub fn init(&mut self, head: &mut TagHead, cx: &mut InitCx) -> CompileResult<()> {
        match self {
            TagKind::Root | TagKind::Button(_) | TagKind::Errors(_) => Ok(()),
            TagKind::Form(t) => t.init(head, cx),
            TagKind::Text(t) => t.init(head, cx),
            TagKind::Checkbox(t) => t.init(head, cx),
            TagKind::Select(t) => t.init(head, cx),
            TagKind::Radio(t) => t.init(head, cx),
            TagKind::File(t) => t.init(head, cx),
            TagKind::Group(t) => t.init(head, cx),
            TagKind::StaticIf(t) => t.init(head),
            TagKind::StaticSet(t) => t.init(head, cx.statics),
        }
    }

    /// Called once the body is complete, before rendering.
    pub fn finish(&mut self, head: &TagHead, body: &Fragment) {
        match self {
            TagKind::Select(t) => t.finish(head, body),
            TagKind::Radio(t) => t.finish(body),
            _ => (),
        }
    }

    pub fn as_static_conditional(&self) -> Option<&dyn StaticConditional> {
        match self {
            TagKind::StaticIf(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_validation_contributor(&self) -> Option<&dyn ValidationContributor> {
        match self {
            TagKind::Text(t) => Some(t),
            TagKind::Checkbox(t) => Some(t),
            TagKind::Select(t) => Some(t),
            TagKind::Radio(t) => Some(t),
            TagKind::File(t) => Some(t),
            _ => None,
        }
    }

    /// Tags that stand for a value of the form (or, for buttons, a
    /// control without one); the form does not look inside them.
    pub fn is_value_tag(&self) -> bool {
        matches!(self,
                 TagKind::Text(_) | TagKind::Checkbox(_) | TagKind::Select(_)
                 | TagKind::Radio(_) | TagKind::File(_) | TagKind::Group(_)
                 | TagKind::Button(_))
    }
}

impl Renderable for TagKind {
    fn render(&self, node: &TagNode, cx: &mut RenderCx) -> CompileResult<Fragment> {
        match self {
            TagKind::Root | TagKind::StaticIf(_) | TagKind::StaticSet(_) => Ok(node.body.clone()),
            TagKind::Form(t) => t.render(node, cx),
            TagKind::Text(t) => t.render(node, cx),
            TagKind::Checkbox(t) => t.render(node, cx),
            TagKind::Select(t) => t.render(node, cx),
            TagKind::Radio(t) => t.render(node, cx),
            TagKind::File(t) => t.render(node, cx),
            TagKind::Group(t) => t.render(node, cx),
            TagKind::Button(t) => t.render(node, cx),
            TagKind::Errors(t) => t.render(node, cx),
        }
    }
}
