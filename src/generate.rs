//! Code generation.
//!
//! Walks a chunk forest depth first and emits the source of a render
//! routine. Every chunk kind has one deterministic, context-free lowering;
//! indentation and block nesting exactly mirror the chunk forest depth.

use crate::chunk::{Chunk, ConditionalKind, ContentMode, Declarations, RenderPartial};

/// One indentation unit.
const INDENT: &str = "    ";

/// An append-only source buffer with a tracked indent level.
#[derive(Debug, Default)]
pub struct Emitter {
    buffer: String,
    indent: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at the current indent level.
    pub fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.buffer.push_str(INDENT);
        }
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    /// Increase the indent level by one unit.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease the indent level by one unit.
    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Consume the emitter, returning the source text.
    pub fn finish(self) -> String {
        self.buffer
    }

    /// Escape literal text for a string literal in the generated source.
    pub fn escape(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for next in text.chars() {
            match next {
                '\\' => escaped.push_str("\\\\"),
                '\t' => escaped.push_str("\\t"),
                '\r' => escaped.push_str("\\r"),
                '\n' => escaped.push_str("\\n"),
                '"' => escaped.push_str("\\\""),
                other => escaped.push(other),
            }
        }
        escaped
    }
}

/// Generate the render routine source for a view composed of the given
/// levels.
///
/// Each level renders one template of the descriptor; every level except
/// the last is captured as the `view` content consumed by the level after
/// it.
pub fn generate(levels: &[Vec<Chunk>], declarations: &Declarations) -> String {
    let mut emitter = Emitter::new();

    emitter.line("fn render(context, output)");
    emitter.line("{");
    emitter.indent();
    for global in &declarations.globals {
        let kind = global.kind.as_deref().unwrap_or("var");
        match &global.value {
            Some(value) => emitter.line(&format!("{kind} {name} = {value};", name = global.name)),
            None => emitter.line(&format!("{kind} {name};", name = global.name)),
        }
    }
    for index in 0..levels.len() {
        if index + 1 < levels.len() {
            emitter.line("output.begin_capture(\"view\");");
            emitter.line(&format!("render_level_{index}(context, output);"));
            emitter.line("output.end_capture();");
        } else {
            emitter.line(&format!("render_level_{index}(context, output);"));
        }
    }
    emitter.dedent();
    emitter.line("}");

    for (index, level) in levels.iter().enumerate() {
        emitter.line(&format!("fn render_level_{index}(context, output)"));
        emitter.line("{");
        emitter.indent();
        let mut visitor = SourceVisitor::new(&mut emitter);
        visitor.accept(level);
        emitter.dedent();
        emitter.line("}");
    }

    emitter.finish()
}

/// Lowers chunks onto an [`Emitter`].
pub struct SourceVisitor<'a, 'chunks> {
    emitter: &'a mut Emitter,
    outer_partial: Option<&'chunks RenderPartial>,
}

impl<'a, 'chunks> SourceVisitor<'a, 'chunks> {
    pub fn new(emitter: &'a mut Emitter) -> Self {
        Self {
            emitter,
            outer_partial: None,
        }
    }

    /// Visit each chunk in order.
    pub fn accept(&mut self, chunks: &'chunks [Chunk]) {
        for chunk in chunks {
            self.visit(chunk);
        }
    }

    fn visit(&mut self, chunk: &'chunks Chunk) {
        match chunk {
            Chunk::SendLiteral(literal) => {
                if literal.text.is_empty() {
                    return;
                }
                self.emitter.line(&format!(
                    "output.write(\"{}\");",
                    Emitter::escape(&literal.text)
                ));
            }
            Chunk::SendExpression(expression) => {
                self.emitter
                    .line(&format!("output.write({});", expression.code));
            }
            Chunk::CodeStatement(statement) => {
                self.emitter.line(&statement.code.replace('\r', ""));
            }
            Chunk::LocalVariable(local) => {
                let kind = local.kind.as_deref().unwrap_or("var");
                match &local.value {
                    Some(value) => self
                        .emitter
                        .line(&format!("{kind} {name} = {value};", name = local.name)),
                    None => self.emitter.line(&format!("{kind} {name};", name = local.name)),
                }
            }
            Chunk::Scope(scope) => {
                self.block(&scope.body);
            }
            Chunk::ForEach(for_each) => match for_each.index_variable() {
                None => {
                    self.emitter.line(&format!("for ({})", for_each.code));
                    self.block(&for_each.body);
                }
                Some(index) => {
                    self.emitter.line("{");
                    self.emitter.indent();
                    self.emitter.line(&format!("var {index} = 0;"));
                    self.emitter.line(&format!("for ({})", for_each.code));
                    self.emitter.line("{");
                    self.emitter.indent();
                    self.accept(&for_each.body);
                    self.emitter.line(&format!("{index} = {index} + 1;"));
                    self.emitter.dedent();
                    self.emitter.line("}");
                    self.emitter.dedent();
                    self.emitter.line("}");
                }
            },
            Chunk::Conditional(conditional) => {
                match conditional.kind {
                    ConditionalKind::If => self
                        .emitter
                        .line(&format!("if ({})", conditional.condition)),
                    ConditionalKind::ElseIf => self
                        .emitter
                        .line(&format!("else if ({})", conditional.condition)),
                    ConditionalKind::Else => self.emitter.line("else"),
                }
                self.block(&conditional.body);
            }
            Chunk::Content(content) => {
                self.emitter
                    .line(&format!("output.begin_capture(\"{}\");", content.name));
                self.block(&content.body);
                self.emitter.line("output.end_capture();");
            }
            Chunk::ContentSet(content_set) => {
                self.emitter.line("output.begin_capture_temp();");
                self.block(&content_set.body);
                let variable = &content_set.variable;
                let line = match content_set.mode {
                    ContentMode::Replace => {
                        format!("{variable} = output.end_capture_temp();")
                    }
                    ContentMode::AppendAfter => {
                        format!("{variable} = {variable} + output.end_capture_temp();")
                    }
                    ContentMode::InsertBefore => {
                        format!("{variable} = output.end_capture_temp() + {variable};")
                    }
                };
                self.emitter.line(&line);
            }
            Chunk::UseContent(use_content) => {
                self.emitter.line(&format!(
                    "if (output.has_content(\"{}\"))",
                    use_content.name
                ));
                self.emitter.line("{");
                self.emitter.indent();
                self.emitter.line(&format!(
                    "output.write_content(\"{}\");",
                    use_content.name
                ));
                self.emitter.dedent();
                self.emitter.line("}");
                if !use_content.default.is_empty() {
                    self.emitter.line("else");
                    self.block(&use_content.default);
                }
            }
            Chunk::RenderPartial(render_partial) => {
                let prior = self.outer_partial;
                self.outer_partial = Some(render_partial);
                self.accept(&render_partial.contents);
                self.outer_partial = prior;
            }
            Chunk::RenderSection(render_section) => {
                if render_section.name.is_empty() {
                    if let Some(outer) = self.outer_partial {
                        self.accept(&outer.body);
                    }
                }
            }
            Chunk::Extension(extension) => {
                self.accept(&extension.body);
            }
            // Declarations emit nothing in the render body.
            Chunk::Macro(_)
            | Chunk::Global(_)
            | Chunk::ViewData(_)
            | Chunk::UseNamespace(_)
            | Chunk::UseAssembly(_) => {}
        }
    }

    fn block(&mut self, body: &'chunks [Chunk]) {
        self.emitter.line("{");
        self.emitter.indent();
        self.accept(body);
        self.emitter.dedent();
        self.emitter.line("}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chunk::ChunkBuilder, markup::MarkupGrammar, rewrite};
    use std::collections::HashSet;

    fn source_for(template: &str) -> String {
        let nodes = MarkupGrammar::new().parse(template).unwrap();
        let nodes = rewrite::apply(template, nodes, &HashSet::new()).unwrap();
        let chunks = ChunkBuilder::new(template).build(&nodes).unwrap();
        let declarations = Declarations::collect([chunks.as_slice()]).unwrap();
        generate(&[chunks], &declarations)
    }

    /// Every `{` line must be balanced by a `}` line at the same indent.
    fn assert_balanced(source: &str) {
        let mut stack = vec![];
        for line in source.lines() {
            let indent = line.len() - line.trim_start().len();
            match line.trim() {
                "{" => stack.push(indent),
                "}" => assert_eq!(stack.pop(), Some(indent), "mismatched block in:\n{source}"),
                _ => {}
            }
        }
        assert!(stack.is_empty(), "unclosed block in:\n{source}");
    }

    #[test]
    fn test_escape_table() {
        assert_eq!(Emitter::escape("a\\b"), "a\\\\b");
        assert_eq!(Emitter::escape("a\tb"), "a\\tb");
        assert_eq!(Emitter::escape("a\rb"), "a\\rb");
        assert_eq!(Emitter::escape("a\nb"), "a\\nb");
        assert_eq!(Emitter::escape("a\"b"), "a\\\"b");
    }

    #[test]
    fn test_literal_write() {
        let source = source_for("<p class=\"x\">hi</p>\n");

        assert!(source.contains("output.write(\"<p class=\\\"x\\\">hi</p>\\n\");"));
        assert_balanced(&source);
    }

    #[test]
    fn test_named_index_loop_shape() {
        let source = source_for("<for each='item in [1,2,3]'>${item}</for>");

        assert!(source.contains("var item_index = 0;"));
        assert!(source.contains("for (item in [1,2,3])"));
        assert!(source.contains("item_index = item_index + 1;"));
        assert_balanced(&source);

        // The increment sits after the body, inside the loop block.
        let body = source.find("output.write(item);").unwrap();
        let increment = source.find("item_index = item_index + 1;").unwrap();
        assert!(body < increment);
    }

    #[test]
    fn test_conditional_chain_shape() {
        let source =
            source_for("<if test='a'>A</if><elseif test='b'>B</elseif><else>C</else>");

        assert!(source.contains("if (a)"));
        assert!(source.contains("else if (b)"));
        assert!(source.contains("else\n"));
        assert_balanced(&source);
    }

    #[test]
    fn test_content_capture_shape() {
        let source = source_for("<content name='header'>h</content>");

        assert!(source.contains("output.begin_capture(\"header\");"));
        assert!(source.contains("output.end_capture();"));
        assert_balanced(&source);
    }

    #[test]
    fn test_content_set_compose() {
        let source = source_for("<content var='title' add='prepend'>x</content>");

        assert!(source.contains("title = output.end_capture_temp() + title;"));
        assert_balanced(&source);
    }

    #[test]
    fn test_use_content_fallback_shape() {
        let source = source_for("<use content='footer'>none</use>");

        assert!(source.contains("if (output.has_content(\"footer\"))"));
        assert!(source.contains("output.write_content(\"footer\");"));
        assert!(source.contains("else"));
        assert_balanced(&source);
    }

    #[test]
    fn test_indent_mirrors_depth() {
        let source = source_for("<if test='a'><if test='b'>x</if></if>");

        // The inner write sits three units deep: routine, outer block,
        // inner block.
        assert!(source.contains("            output.write(\"x\");"));
        assert_balanced(&source);
    }

    #[test]
    fn test_layered_levels() {
        let chunks = vec![vec![], vec![]];
        let declarations = Declarations::default();
        let source = generate(&chunks, &declarations);

        assert!(source.contains("output.begin_capture(\"view\");"));
        assert!(source.contains("render_level_0(context, output);"));
        assert!(source.contains("render_level_1(context, output);"));
        assert_balanced(&source);
    }
}
