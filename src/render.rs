//! Direct rendering of chunk programs.
//!
//! The default host compiler loads a compiled view's chunk program into a
//! unit that executes it here, instead of loading generated source into
//! the process. Expressions are evaluated against the renderer's variable
//! scopes and the layered [`RenderContext`].

mod compare;
mod expr;

pub use compare::{compare_values, is_truthy};
pub use expr::{parse_expression, parse_iteration, Expr, Operator};

use crate::{
    chunk::{Chunk, ConditionalKind, ContentMode, Declarations, ForEach, RenderPartial},
    context::RenderContext,
    log::{error_write, Error, INCOMPATIBLE_TYPES},
    pipe::Pipe,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;

/// A compiled chunk program: the chunk forest of every level of one view,
/// plus the declarations gathered from them.
///
/// Each level renders one template of the descriptor. Every level except
/// the last is captured as the `view` content consumed by the level after
/// it.
#[derive(Debug, Clone, Default)]
pub struct ViewProgram {
    pub levels: Vec<Vec<Chunk>>,
    pub declarations: Declarations,
}

/// Executes a [`ViewProgram`] against a [`RenderContext`].
pub struct Renderer<'view, 'context> {
    program: &'view ViewProgram,
    context: &'context RenderContext,
    /// Variable scopes, innermost last. The outermost scope holds globals.
    scopes: Vec<HashMap<String, Value>>,
    /// Captured named content.
    content: HashMap<String, String>,
    outer_partial: Option<&'view RenderPartial>,
}

impl<'view, 'context> Renderer<'view, 'context> {
    /// Create a new Renderer.
    pub fn new(program: &'view ViewProgram, context: &'context RenderContext) -> Self {
        Self {
            program,
            context,
            scopes: vec![HashMap::new()],
            content: HashMap::new(),
            outer_partial: None,
        }
    }

    /// Render the program, writing to the given output sink.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an expression cannot be parsed or
    /// evaluated, or writing to the sink fails.
    pub fn render(&mut self, output: &mut dyn Write) -> Result<(), Error> {
        let program = self.program;

        for global in &program.declarations.globals {
            let value = match &global.value {
                Some(code) => self.eval_code(code)?,
                None => Value::Null,
            };
            self.scopes[0].insert(global.name.clone(), value);
        }

        for (index, level) in program.levels.iter().enumerate() {
            let mut buffer = String::new();
            self.render_chunks(level, &mut buffer)?;

            if index + 1 < program.levels.len() {
                self.content.entry("view".to_string()).or_default().push_str(&buffer);
            } else {
                output.write_str(&buffer).map_err(|_| error_write())?;
            }
        }

        Ok(())
    }

    fn render_chunks(&mut self, chunks: &'view [Chunk], output: &mut String) -> Result<(), Error> {
        // Tracks whether the current conditional chain took a branch.
        let mut chain_taken = false;

        for chunk in chunks {
            if let Chunk::Conditional(conditional) = chunk {
                let take = match conditional.kind {
                    ConditionalKind::If => {
                        chain_taken = false;
                        is_truthy(&self.eval_code(&conditional.condition)?)
                    }
                    ConditionalKind::ElseIf => {
                        !chain_taken && is_truthy(&self.eval_code(&conditional.condition)?)
                    }
                    ConditionalKind::Else => !chain_taken,
                };
                if take {
                    chain_taken = true;
                    self.scopes.push(HashMap::new());
                    self.render_chunks(&conditional.body, output)?;
                    self.scopes.pop();
                }
                continue;
            }

            chain_taken = false;
            self.render_chunk(chunk, output)?;
        }

        Ok(())
    }

    fn render_chunk(&mut self, chunk: &'view Chunk, output: &mut String) -> Result<(), Error> {
        match chunk {
            Chunk::SendLiteral(literal) => output.push_str(&literal.text),
            Chunk::SendExpression(expression) => {
                let value = self.eval_code(&expression.code)?;
                Pipe::new(output)
                    .write_value(&value)
                    .map_err(|_| error_write())?;
            }
            // There is no target language at direct render time, so a raw
            // code statement has nothing to execute.
            Chunk::CodeStatement(_) => {}
            Chunk::LocalVariable(local) => {
                let value = match &local.value {
                    Some(code) => self.eval_code(code)?,
                    None => Value::Null,
                };
                self.insert_variable(&local.name, value);
            }
            Chunk::Scope(scope) => {
                self.scopes.push(HashMap::new());
                self.render_chunks(&scope.body, output)?;
                self.scopes.pop();
            }
            Chunk::ForEach(for_each) => self.render_for_each(for_each, output)?,
            Chunk::Conditional(conditional) => {
                // Chains are handled in render_chunks; a lone conditional
                // reaching here is an If with no chain.
                if is_truthy(&self.eval_code(&conditional.condition)?) {
                    self.scopes.push(HashMap::new());
                    self.render_chunks(&conditional.body, output)?;
                    self.scopes.pop();
                }
            }
            Chunk::Content(content) => {
                let mut buffer = String::new();
                self.render_chunks(&content.body, &mut buffer)?;
                self.content
                    .entry(content.name.clone())
                    .or_default()
                    .push_str(&buffer);
            }
            Chunk::ContentSet(content_set) => {
                let mut buffer = String::new();
                self.render_chunks(&content_set.body, &mut buffer)?;

                let current = self.variable_text(&content_set.variable);
                let composed = match content_set.mode {
                    ContentMode::Replace => buffer,
                    ContentMode::AppendAfter => current + &buffer,
                    ContentMode::InsertBefore => buffer + &current,
                };
                self.assign_variable(&content_set.variable, Value::String(composed));
            }
            Chunk::UseContent(use_content) => match self.content.get(&use_content.name) {
                Some(text) => output.push_str(text),
                None => self.render_chunks(&use_content.default, output)?,
            },
            Chunk::RenderPartial(render_partial) => {
                let prior = self.outer_partial;
                self.outer_partial = Some(render_partial);
                self.render_chunks(&render_partial.contents, output)?;
                self.outer_partial = prior;
            }
            Chunk::RenderSection(render_section) => {
                if render_section.name.is_empty() {
                    if let Some(outer) = self.outer_partial {
                        self.render_chunks(&outer.body, output)?;
                    }
                }
            }
            Chunk::Extension(extension) => {
                self.render_chunks(&extension.body, output)?;
            }
            // Declarations execute nothing; globals were initialized at
            // render start and the rest feed earlier phases.
            Chunk::Macro(_)
            | Chunk::Global(_)
            | Chunk::ViewData(_)
            | Chunk::UseNamespace(_)
            | Chunk::UseAssembly(_) => {}
        }

        Ok(())
    }

    fn render_for_each(
        &mut self,
        for_each: &'view ForEach,
        output: &mut String,
    ) -> Result<(), Error> {
        let (name, selection) = parse_iteration(&for_each.code)?;
        let items = match selection.eval(&|name| self.lookup(name))? {
            Value::Array(items) => items,
            other => {
                return Err(Error::build(INCOMPATIBLE_TYPES).help(format!(
                    "`{code}` selects `{other}`, which is not a list",
                    code = for_each.code
                )))
            }
        };

        let index_name = format!("{name}_index");
        self.scopes.push(HashMap::new());
        for (index, item) in items.into_iter().enumerate() {
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(name.clone(), item);
                scope.insert(index_name.clone(), Value::from(index));
            }
            self.render_chunks(&for_each.body, output)?;
        }
        self.scopes.pop();

        Ok(())
    }

    fn eval_code(&self, code: &str) -> Result<Value, Error> {
        parse_expression(code)?.eval(&|name| self.lookup(name))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        self.context.get(name).cloned()
    }

    fn insert_variable(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Assign to the innermost scope already holding the name, falling
    /// back to declaring it in the current scope.
    fn assign_variable(&mut self, name: &str, value: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_string(), value);
                return;
            }
        }
        self.insert_variable(name, value);
    }

    fn variable_text(&self, name: &str) -> String {
        let value = self.lookup(name).unwrap_or(Value::Null);
        let mut text = String::new();
        // Writing to a String cannot fail.
        let _ = Pipe::new(&mut text).write_value(&value);
        text
    }
}
