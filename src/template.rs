//! Building the tag tree of one template, drawing every closed tag into
//! its parent's body, and turning the root's body into a view.

use std::collections::BTreeMap;

use kstring::KString;

use crate::config::CompilerConfig;
use crate::error::{CompileErrorKind, CompileResult, Location, TagRef};
use crate::model::FormModelDef;
use crate::node::{Arena, NodeId, TagHead, TagNode};
use crate::placeholder::Placeholders;
use crate::registry::TagRegistry;
use crate::scanner::{parse_attributes, scan, Occurrence};
use crate::statics::StaticStore;
use crate::tags::{InitCx, RenderCx, Renderable, TagKind};
use crate::view::View;

/// The result of one compile.
#[derive(Debug)]
pub struct CompileOutput {
    pub view: View,
    /// The validator definitions of the template's forms, in the order
    /// the forms were closed.
    pub forms: Vec<FormModelDef>,
    /// The static attributes as they were at the end of the template.
    pub statics: StaticStore,
    pub pushes: usize,
    pub pops: usize,
}

/// The state of compiling one template. Nothing in it outlives the
/// compile.
pub struct CompileSession<'c> {
    registry: &'c TagRegistry,
    config: &'c CompilerConfig,
    source: KString,
    arena: Arena,
    root: NodeId,
    stack: Vec<NodeId>,
    /// Number of open static-conditional tags whose subtree is left out.
    skip: u32,
    pushes: usize,
    pops: usize,
    statics: StaticStore,
    forms: Vec<FormModelDef>,
}

impl<'c> CompileSession<'c> {
    pub fn new(registry: &'c TagRegistry, config: &'c CompilerConfig, source: &str) -> Self {
        let source = KString::from_ref(source);
        let mut arena = Arena::new();
        let root = arena.push(TagNode::new(
            TagHead {
                namespace: KString::from_static("rl"),
                name: KString::from_static("root"),
                attributes: BTreeMap::new(),
                location: Location { file: source.clone(), line: 1, column: 1 },
                parent: None,
            },
            TagKind::Root));
        CompileSession {
            registry,
            config,
            source,
            arena,
            root,
            stack: vec![root],
            skip: 0,
            pushes: 0,
            pops: 0,
            statics: StaticStore::new(),
            forms: Vec::new(),
        }
    }

    fn top(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.root)
    }

    fn tagref(&self, occ: &Occurrence) -> TagRef {
        TagRef {
            namespace: occ.namespace.clone(),
            name: occ.name.clone(),
            location: Location { file: self.source.clone(), line: occ.line, column: occ.column },
        }
    }

    fn placeholders(&self) -> Placeholders<'_> {
        Placeholders {
            statics: &self.statics,
            constants: &self.config.constants,
            variables: &self.config.variables,
        }
    }

    /// Compile `text`, the contents of the session's source.
    pub fn compile(mut self, text: &str) -> CompileResult<CompileOutput> {
        let namespaces = self.registry.namespaces();
        let mut pos = 0;
        for occ in scan(text, &namespaces) {
            if occ.closing && occ.self_closing {
                return Err(CompileErrorKind::MalformedTag(self.tagref(&occ)).into());
            }
            if !self.registry.contains(&occ.namespace, &occ.name) {
                return Err(CompileErrorKind::UnknownTag(self.tagref(&occ)).into());
            }
            let top = self.top();
            self.arena[top].body.push_text(&text[pos..occ.start]);
            pos = occ.end;
            if occ.closing {
                self.close(&occ)?;
            } else {
                self.open(&occ)?;
            }
        }
        let top = self.top();
        self.arena[top].body.push_text(&text[pos..]);
        if top != self.root {
            return Err(CompileErrorKind::UnterminatedTag(self.arena[top].head.tagref()).into());
        }
        if self.skip != 0 {
            return Err(CompileErrorKind::UnbalancedSkip(self.source.clone(), self.skip).into());
        }
        let body = std::mem::take(&mut self.arena[self.root].body);
        let body = self.placeholders().expand(body, text, &self.source)?;
        Ok(CompileOutput {
            view: View { source: self.source.clone(), body },
            forms: self.forms,
            statics: self.statics,
            pushes: self.pushes,
            pops: self.pops,
        })
    }

    fn open(&mut self, occ: &Occurrence) -> CompileResult<()> {
        let top = self.top();
        let mut kind = self.registry.construct(&occ.namespace, &occ.name)
            .ok_or_else(|| CompileErrorKind::UnknownTag(self.tagref(occ)))?;
        let active = self.skip == 0;
        let mut head = TagHead {
            namespace: occ.namespace.clone(),
            name: occ.name.clone(),
            attributes: BTreeMap::new(),
            location: Location { file: self.source.clone(), line: occ.line, column: occ.column },
            parent: Some(top),
        };
        {
            let placeholders = self.placeholders();
            for (key, value) in parse_attributes(&occ.attr_text) {
                let value = if active {
                    KString::from_string(placeholders.substitute_attribute(&value, &head.location)?)
                } else {
                    value
                };
                head.attributes.insert(key, value);
            }
        }
        if active {
            kind.init(&mut head, &mut InitCx {
                arena: &mut self.arena,
                statics: &mut self.statics,
                config: self.config,
            })?;
        }
        // Some(passed) for static conditionals
        let check = kind.as_static_conditional().map(|c| active && c.check(&self.statics));
        let id = self.arena.push(TagNode::new(head, kind));
        if active {
            self.arena[top].children.push(id);
        }
        if occ.self_closing {
            if active && check != Some(false) {
                self.draw(id)?;
            }
        } else {
            if check == Some(false) {
                self.skip += 1;
                self.arena[id].skipping = true;
            }
            self.stack.push(id);
            self.pushes += 1;
        }
        Ok(())
    }

    fn close(&mut self, occ: &Occurrence) -> CompileResult<()> {
        let top = self.top();
        if top == self.root {
            return Err(CompileErrorKind::UnexpectedClosingTag(self.tagref(occ)).into());
        }
        let head = &self.arena[top].head;
        if head.namespace != occ.namespace || head.name != occ.name {
            return Err(CompileErrorKind::MismatchedClosingTag {
                expected: head.tagref(),
                found: self.tagref(occ),
            }.into());
        }
        self.stack.pop();
        self.pops += 1;
        if self.skip == 0 {
            self.draw(top)?;
        } else if self.arena[top].skipping {
            self.skip -= 1;
        }
        Ok(())
    }

    /// Render node `id` into its parent's body.
    fn draw(&mut self, id: NodeId) -> CompileResult<()> {
        let parent = match self.arena[id].head.parent {
            Some(parent) => parent,
            None => return Ok(()),
        };
        {
            let TagNode { head, kind, body, .. } = &mut self.arena[id];
            kind.finish(head, body);
        }
        let fragment = {
            let node = &self.arena[id];
            let mut cx = RenderCx {
                arena: &self.arena,
                config: self.config,
                forms: &mut self.forms,
            };
            node.kind.render(node, &mut cx)?
        };
        self.arena[parent].body.append(fragment);
        Ok(())
    }
}

/// Compile `text` as template `source`.
pub fn compile_template(
    registry: &TagRegistry,
    config: &CompilerConfig,
    source: &str,
    text: &str,
) -> CompileResult<CompileOutput> {
    CompileSession::new(registry, config, source).compile(text)
}
