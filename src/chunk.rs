//! The intermediate representation produced from a rewritten node tree.
//!
//! A chunk models one renderable behavior. The code generator and the
//! direct renderer both walk the same chunk forest.

mod builder;

pub use builder::ChunkBuilder;

use crate::{
    log::{Error, CONFLICTING_DECLARATION},
    markup::ElementNode,
};
use std::collections::HashMap;

/// One node of the intermediate representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    SendLiteral(SendLiteral),
    SendExpression(SendExpression),
    CodeStatement(CodeStatement),
    LocalVariable(LocalVariable),
    Scope(Scope),
    ForEach(ForEach),
    Conditional(Conditional),
    Content(Content),
    ContentSet(ContentSet),
    UseContent(UseContent),
    RenderPartial(RenderPartial),
    RenderSection(RenderSection),
    Macro(Macro),
    Global(Global),
    ViewData(ViewData),
    UseNamespace(UseNamespace),
    UseAssembly(UseAssembly),
    Extension(Extension),
}

/// Literal text sent to output.
#[derive(Debug, Clone, PartialEq)]
pub struct SendLiteral {
    pub text: String,
}

/// An expression whose value is sent to output.
#[derive(Debug, Clone, PartialEq)]
pub struct SendExpression {
    pub code: String,
}

/// A raw code statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeStatement {
    pub code: String,
}

/// A local variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// Declared type, when one was given.
    pub kind: Option<String>,
    pub name: String,
    pub value: Option<String>,
}

/// A scoped block.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub body: Vec<Chunk>,
}

/// A loop over the items named by the iteration code.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEach {
    /// Iteration code in the shape `name in expression`.
    pub code: String,
    pub body: Vec<Chunk>,
}

impl ForEach {
    /// The name of the loop variable, taken from the term before `in`.
    pub fn variable(&self) -> Option<&str> {
        let terms: Vec<&str> = self.code.split_whitespace().collect();
        let position = terms.iter().position(|term| *term == "in")?;
        if position < 1 {
            return None;
        }
        Some(terms[position - 1])
    }

    /// The name of the synthetic index local bound inside the body.
    pub fn index_variable(&self) -> Option<String> {
        self.variable().map(|name| format!("{name}_index"))
    }

    /// The iteration source expression, the code after `in`.
    pub fn selection(&self) -> Option<&str> {
        let index = self.code.find(" in ")?;
        Some(self.code[index + 4..].trim())
    }
}

/// The position of a conditional within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    If,
    ElseIf,
    Else,
}

/// One branch of a conditional chain.
///
/// Chains are formed by adjacency: an `ElseIf` or `Else` chunk belongs to
/// the `If` or `ElseIf` chunk directly before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub kind: ConditionalKind,
    pub condition: String,
    pub body: Vec<Chunk>,
}

/// Capture of the rendered body under a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub name: String,
    pub body: Vec<Chunk>,
}

/// How [`ContentSet`] composes with the target's existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    Replace,
    AppendAfter,
    InsertBefore,
}

/// Capture of the rendered body into a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSet {
    pub variable: String,
    pub mode: ContentMode,
    pub body: Vec<Chunk>,
}

/// Emit previously captured content, or the default body when the name
/// was never captured.
#[derive(Debug, Clone, PartialEq)]
pub struct UseContent {
    pub name: String,
    pub default: Vec<Chunk>,
}

/// Inclusion of another template.
///
/// The body provides section content reachable from the nested template
/// through a default [`RenderSection`]. `contents` holds the included
/// template's own chunks, filled in when the partial is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPartial {
    pub name: String,
    pub body: Vec<Chunk>,
    pub contents: Vec<Chunk>,
}

/// Render a section supplied by the including template.
///
/// An empty name is the default section, which renders the caller's body.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSection {
    pub name: String,
}

/// A macro definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    /// Parameter names paired with their declared types.
    pub parameters: Vec<(String, String)>,
    pub body: Vec<Chunk>,
}

/// A global variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub kind: Option<String>,
    pub name: String,
    pub value: Option<String>,
}

/// A view data declaration, naming a key and its expected type.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewData {
    pub name: String,
    pub kind: String,
}

/// A namespace reference handed to the host compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct UseNamespace {
    pub namespace: String,
}

/// An assembly reference handed to the host compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct UseAssembly {
    pub assembly: String,
}

/// An extension element and its lowered body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub element: ElementNode,
    pub body: Vec<Chunk>,
}

/// Declarations gathered from a chunk forest before code generation.
///
/// Collection walks every nested body, including resolved partial
/// contents, so declarations merged from several templates are checked
/// against each other.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    /// View data name to declared type.
    pub view_data: HashMap<String, String>,
    /// Global declarations in first-seen order.
    pub globals: Vec<Global>,
    pub namespaces: Vec<String>,
    pub assemblies: Vec<String>,
    pub macros: HashMap<String, Macro>,
}

impl Declarations {
    /// Collect declarations from the given chunk sets.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a view data or global name is declared
    /// twice with incompatible types.
    pub fn collect<'a, I>(chunk_sets: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a [Chunk]>,
    {
        let mut declarations = Self::default();
        for chunks in chunk_sets {
            declarations.scan(chunks)?;
        }
        Ok(declarations)
    }

    fn scan(&mut self, chunks: &[Chunk]) -> Result<(), Error> {
        for chunk in chunks {
            match chunk {
                Chunk::ViewData(view_data) => {
                    self.add_view_data(view_data)?;
                }
                Chunk::Global(global) => {
                    self.add_global(global)?;
                }
                Chunk::UseNamespace(use_namespace) => {
                    if !self.namespaces.contains(&use_namespace.namespace) {
                        self.namespaces.push(use_namespace.namespace.clone());
                    }
                }
                Chunk::UseAssembly(use_assembly) => {
                    if !self.assemblies.contains(&use_assembly.assembly) {
                        self.assemblies.push(use_assembly.assembly.clone());
                    }
                }
                Chunk::Macro(r#macro) => {
                    self.macros
                        .entry(r#macro.name.clone())
                        .or_insert_with(|| r#macro.clone());
                }
                Chunk::Scope(scope) => self.scan(&scope.body)?,
                Chunk::ForEach(for_each) => self.scan(&for_each.body)?,
                Chunk::Conditional(conditional) => self.scan(&conditional.body)?,
                Chunk::Content(content) => self.scan(&content.body)?,
                Chunk::ContentSet(content_set) => self.scan(&content_set.body)?,
                Chunk::UseContent(use_content) => self.scan(&use_content.default)?,
                Chunk::RenderPartial(render_partial) => {
                    self.scan(&render_partial.body)?;
                    self.scan(&render_partial.contents)?;
                }
                Chunk::Extension(extension) => self.scan(&extension.body)?,
                Chunk::SendLiteral(_)
                | Chunk::SendExpression(_)
                | Chunk::CodeStatement(_)
                | Chunk::LocalVariable(_)
                | Chunk::RenderSection(_) => {}
            }
        }
        Ok(())
    }

    fn add_view_data(&mut self, view_data: &ViewData) -> Result<(), Error> {
        match self.view_data.get(&view_data.name) {
            Some(existing) if existing != &view_data.kind => {
                Err(Error::build(CONFLICTING_DECLARATION).help(format!(
                    "viewdata `{name}` is declared as both `{existing}` and `{kind}`",
                    name = view_data.name,
                    kind = view_data.kind
                )))
            }
            Some(_) => Ok(()),
            None => {
                self.view_data
                    .insert(view_data.name.clone(), view_data.kind.clone());
                Ok(())
            }
        }
    }

    fn add_global(&mut self, global: &Global) -> Result<(), Error> {
        match self.globals.iter().find(|seen| seen.name == global.name) {
            Some(existing) if existing.kind != global.kind => {
                Err(Error::build(CONFLICTING_DECLARATION).help(format!(
                    "global `{name}` is declared as both `{a}` and `{b}`",
                    name = global.name,
                    a = existing.kind.as_deref().unwrap_or("untyped"),
                    b = global.kind.as_deref().unwrap_or("untyped")
                )))
            }
            Some(_) => Ok(()),
            None => {
                self.globals.push(global.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_variable() {
        let for_each = ForEach {
            code: "item in [1, 2, 3]".into(),
            body: vec![],
        };

        assert_eq!(for_each.variable(), Some("item"));
        assert_eq!(for_each.index_variable().as_deref(), Some("item_index"));
        assert_eq!(for_each.selection(), Some("[1, 2, 3]"));
    }

    #[test]
    fn test_for_each_without_variable() {
        let for_each = ForEach {
            code: "in items".into(),
            body: vec![],
        };

        assert_eq!(for_each.variable(), None);
        assert_eq!(for_each.index_variable(), None);
    }

    #[test]
    fn test_view_data_conflict() {
        let chunks = vec![
            Chunk::ViewData(ViewData {
                name: "Name".into(),
                kind: "int".into(),
            }),
            Chunk::ViewData(ViewData {
                name: "Name".into(),
                kind: "string".into(),
            }),
        ];

        let error = Declarations::collect([chunks.as_slice()]).unwrap_err();
        assert_eq!(error.get_reason(), CONFLICTING_DECLARATION);
        assert!(error.get_help().unwrap().contains("`Name`"));
    }

    #[test]
    fn test_view_data_redeclared_same_type() {
        let chunks = vec![
            Chunk::ViewData(ViewData {
                name: "Caption".into(),
                kind: "string".into(),
            }),
            Chunk::ViewData(ViewData {
                name: "Caption".into(),
                kind: "string".into(),
            }),
        ];

        assert!(Declarations::collect([chunks.as_slice()]).is_ok());
    }

    #[test]
    fn test_conflict_across_merged_sets() {
        let first = vec![Chunk::ViewData(ViewData {
            name: "Count".into(),
            kind: "int".into(),
        })];
        let second = vec![Chunk::RenderPartial(RenderPartial {
            name: "footer".into(),
            body: vec![],
            contents: vec![Chunk::ViewData(ViewData {
                name: "Count".into(),
                kind: "string".into(),
            })],
        })];

        let error = Declarations::collect([first.as_slice(), second.as_slice()]).unwrap_err();
        assert_eq!(error.get_reason(), CONFLICTING_DECLARATION);
    }

    #[test]
    fn test_namespace_dedupe() {
        let chunks = vec![
            Chunk::UseNamespace(UseNamespace {
                namespace: "system.web".into(),
            }),
            Chunk::UseNamespace(UseNamespace {
                namespace: "system.web".into(),
            }),
        ];

        let declarations = Declarations::collect([chunks.as_slice()]).unwrap();
        assert_eq!(declarations.namespaces.len(), 1);
    }
}
