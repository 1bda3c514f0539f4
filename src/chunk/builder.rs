use super::{
    Chunk, CodeStatement, Conditional, ConditionalKind, Content, ContentMode, ContentSet,
    Extension, ForEach, Global, LocalVariable, Macro, RenderPartial, RenderSection, Scope,
    SendExpression, SendLiteral, UseAssembly, UseContent, UseNamespace, ViewData,
};
use crate::{
    log::{Error, INVALID_SYNTAX},
    markup::{DoctypeNode, ElementNode, Node, SpecialNode},
};

/// Lowers a rewritten node tree into a chunk forest.
pub struct ChunkBuilder<'source> {
    source: &'source str,
}

impl<'source> ChunkBuilder<'source> {
    pub fn new(source: &'source str) -> Self {
        Self { source }
    }

    /// Build chunks from the given nodes.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a control element is missing a required
    /// attribute, or an `elseif`/`else` branch does not follow an open
    /// conditional chain.
    pub fn build(&self, nodes: &[Node]) -> Result<Vec<Chunk>, Error> {
        self.build_nodes(nodes)
    }

    fn build_nodes(&self, nodes: &[Node]) -> Result<Vec<Chunk>, Error> {
        let mut chunks = vec![];
        for node in nodes {
            self.build_node(node, &mut chunks)?;
        }

        let chunks = normalize_chain_whitespace(chunks);
        self.validate_chains(&chunks)?;

        Ok(chunks)
    }

    fn build_node(&self, node: &Node, chunks: &mut Vec<Chunk>) -> Result<(), Error> {
        match node {
            Node::Text(text) => push_literal(chunks, &text.text),
            Node::Entity(entity) => push_literal(chunks, &format!("&{};", entity.name)),
            Node::Expression(expression) => chunks.push(Chunk::SendExpression(SendExpression {
                code: expression.code.clone(),
            })),
            Node::Element(element) => self.build_element(element, chunks),
            Node::EndElement(end) => push_literal(chunks, &format!("</{}>", end.name)),
            // An attribute only carries meaning inside an element tag.
            Node::Attribute(_) => {}
            Node::Comment(comment) => {
                push_literal(chunks, &format!("<!--{}-->", comment.text))
            }
            Node::Doctype(doctype) => push_literal(chunks, &doctype_text(doctype)),
            Node::Special(special) => self.build_special(special, chunks)?,
            Node::Extension(extension) => {
                let body = self.build_nodes(&extension.body)?;
                chunks.push(Chunk::Extension(Extension {
                    element: extension.element.clone(),
                    body,
                }));
            }
            Node::Statement(statement) => chunks.push(Chunk::CodeStatement(CodeStatement {
                code: statement.code.clone(),
            })),
        }

        Ok(())
    }

    fn build_element(&self, element: &ElementNode, chunks: &mut Vec<Chunk>) {
        push_literal(chunks, &format!("<{}", element.name));

        for attribute in &element.attributes {
            push_literal(chunks, &format!(" {}=\"", attribute.name));
            for node in &attribute.value {
                match node {
                    Node::Text(text) => push_literal(chunks, &text.text),
                    Node::Entity(entity) => {
                        push_literal(chunks, &format!("&{};", entity.name))
                    }
                    Node::Expression(expression) => {
                        chunks.push(Chunk::SendExpression(SendExpression {
                            code: expression.code.clone(),
                        }))
                    }
                    _ => {}
                }
            }
            push_literal(chunks, "\"");
        }

        push_literal(chunks, if element.is_empty { "/>" } else { ">" });
    }

    fn build_special(&self, special: &SpecialNode, chunks: &mut Vec<Chunk>) -> Result<(), Error> {
        let element = &special.element;
        match element.name.as_str() {
            "for" => {
                let code = self.require_attribute(element, "each")?;
                let body = self.build_nodes(&special.body)?;
                chunks.push(Chunk::ForEach(ForEach { code, body }));
            }
            "if" => {
                let condition = self.require_attribute(element, "test")?;
                let body = self.build_nodes(&special.body)?;
                chunks.push(Chunk::Conditional(Conditional {
                    kind: ConditionalKind::If,
                    condition,
                    body,
                }));
            }
            "elseif" => {
                let condition = self.require_attribute(element, "test")?;
                let body = self.build_nodes(&special.body)?;
                chunks.push(Chunk::Conditional(Conditional {
                    kind: ConditionalKind::ElseIf,
                    condition,
                    body,
                }));
            }
            "else" => {
                let body = self.build_nodes(&special.body)?;
                // An `<else if="..">` form continues the chain with a
                // condition of its own.
                match element.attribute("if") {
                    Some(attribute) => chunks.push(Chunk::Conditional(Conditional {
                        kind: ConditionalKind::ElseIf,
                        condition: attribute.code(),
                        body,
                    })),
                    None => chunks.push(Chunk::Conditional(Conditional {
                        kind: ConditionalKind::Else,
                        condition: String::new(),
                        body,
                    })),
                }
            }
            "content" => {
                let body = self.build_nodes(&special.body)?;
                if let Some(attribute) = element.attribute("name") {
                    chunks.push(Chunk::Content(Content {
                        name: attribute.code(),
                        body,
                    }));
                } else if let Some(attribute) = element.attribute("var") {
                    let mode = self.content_mode(element)?;
                    chunks.push(Chunk::ContentSet(ContentSet {
                        variable: attribute.code(),
                        mode,
                        body,
                    }));
                } else {
                    return Err(self
                        .element_error(element, "`content` requires a `name` or `var` attribute"));
                }
            }
            "use" => {
                let body = self.build_nodes(&special.body)?;
                if let Some(attribute) = element.attribute("content") {
                    chunks.push(Chunk::UseContent(UseContent {
                        name: attribute.code(),
                        default: body,
                    }));
                } else if let Some(attribute) = element.attribute("file") {
                    chunks.push(Chunk::RenderPartial(RenderPartial {
                        name: attribute.code(),
                        body,
                        contents: vec![],
                    }));
                } else if let Some(attribute) = element.attribute("namespace") {
                    chunks.push(Chunk::UseNamespace(UseNamespace {
                        namespace: attribute.code(),
                    }));
                } else if let Some(attribute) = element.attribute("assembly") {
                    chunks.push(Chunk::UseAssembly(UseAssembly {
                        assembly: attribute.code(),
                    }));
                } else {
                    return Err(self.element_error(
                        element,
                        "`use` requires a `content`, `file`, `namespace` or `assembly` attribute",
                    ));
                }
            }
            "render" => {
                let name = element
                    .attribute("section")
                    .map(|attribute| attribute.code())
                    .unwrap_or_default();
                chunks.push(Chunk::RenderSection(RenderSection { name }));
            }
            "var" => {
                let kind = element.attribute("type").map(|attribute| attribute.code());
                let mut locals = vec![];
                for attribute in &element.attributes {
                    if attribute.name == "type" {
                        continue;
                    }
                    let value = attribute.code();
                    locals.push(Chunk::LocalVariable(LocalVariable {
                        kind: kind.clone(),
                        name: attribute.name.clone(),
                        value: (!value.is_empty()).then_some(value),
                    }));
                }

                let body = self.build_nodes(&special.body)?;
                if body.is_empty() {
                    chunks.extend(locals);
                } else {
                    locals.extend(body);
                    chunks.push(Chunk::Scope(Scope { body: locals }));
                }
            }
            "viewdata" => {
                for attribute in &element.attributes {
                    chunks.push(Chunk::ViewData(ViewData {
                        name: attribute.name.clone(),
                        kind: attribute.code(),
                    }));
                }
            }
            "global" => {
                let kind = element.attribute("type").map(|attribute| attribute.code());
                for attribute in &element.attributes {
                    if attribute.name == "type" {
                        continue;
                    }
                    let value = attribute.code();
                    chunks.push(Chunk::Global(Global {
                        kind: kind.clone(),
                        name: attribute.name.clone(),
                        value: (!value.is_empty()).then_some(value),
                    }));
                }
            }
            "macro" => {
                let name = self.require_attribute(element, "name")?;
                let parameters = element
                    .attributes
                    .iter()
                    .filter(|attribute| attribute.name != "name")
                    .map(|attribute| (attribute.name.clone(), attribute.code()))
                    .collect();
                let body = self.build_nodes(&special.body)?;
                chunks.push(Chunk::Macro(Macro {
                    name,
                    parameters,
                    body,
                }));
            }
            other => {
                return Err(
                    self.element_error(element, &format!("unknown control element `{other}`"))
                )
            }
        }

        Ok(())
    }

    fn content_mode(&self, element: &ElementNode) -> Result<ContentMode, Error> {
        let mode = match element.attribute("add") {
            Some(attribute) => attribute.code(),
            None => return Ok(ContentMode::Replace),
        };
        match mode.as_str() {
            "replace" => Ok(ContentMode::Replace),
            "append" => Ok(ContentMode::AppendAfter),
            "prepend" => Ok(ContentMode::InsertBefore),
            other => Err(self.element_error(
                element,
                &format!("unknown add mode `{other}`, expected `replace`, `append` or `prepend`"),
            )),
        }
    }

    fn require_attribute(&self, element: &ElementNode, name: &str) -> Result<String, Error> {
        match element.attribute(name) {
            Some(attribute) => Ok(attribute.code()),
            None => Err(self.element_error(
                element,
                &format!("`{element}` requires a `{name}` attribute", element = element.name),
            )),
        }
    }

    fn element_error(&self, element: &ElementNode, help: &str) -> Error {
        Error::build(INVALID_SYNTAX)
            .pointer(self.source, element.region)
            .help(help)
    }

    fn validate_chains(&self, chunks: &[Chunk]) -> Result<(), Error> {
        let mut open = false;
        for chunk in chunks {
            if let Chunk::Conditional(conditional) = chunk {
                match conditional.kind {
                    ConditionalKind::If => {}
                    ConditionalKind::ElseIf | ConditionalKind::Else if !open => {
                        return Err(Error::build(INVALID_SYNTAX).help(
                            "`elseif` and `else` must directly follow an `if` or `elseif` branch",
                        ));
                    }
                    ConditionalKind::ElseIf | ConditionalKind::Else => {}
                }
                open = conditional.kind != ConditionalKind::Else;
            } else {
                open = false;
            }
        }
        Ok(())
    }
}

/// Append literal text, merging with a trailing literal chunk.
fn push_literal(chunks: &mut Vec<Chunk>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Chunk::SendLiteral(last)) = chunks.last_mut() {
        last.text.push_str(text);
        return;
    }
    chunks.push(Chunk::SendLiteral(SendLiteral {
        text: text.to_string(),
    }));
}

/// Drop whitespace-only literals sitting between the links of a
/// conditional chain, so formatting between branches does not break
/// adjacency.
fn normalize_chain_whitespace(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut result: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut rest = chunks.into_iter().peekable();

    while let Some(chunk) = rest.next() {
        let between = matches!(
            result.last(),
            Some(Chunk::Conditional(conditional)) if conditional.kind != ConditionalKind::Else
        ) && matches!(
            &chunk,
            Chunk::SendLiteral(literal) if literal.text.trim().is_empty()
        ) && matches!(
            rest.peek(),
            Some(Chunk::Conditional(conditional)) if conditional.kind != ConditionalKind::If
        );

        if !between {
            result.push(chunk);
        }
    }

    result
}

fn doctype_text(doctype: &DoctypeNode) -> String {
    match &doctype.external_id {
        None => format!("<!DOCTYPE {}>", doctype.name),
        Some(external_id) => match &external_id.public_id {
            Some(public_id) => format!(
                "<!DOCTYPE {} PUBLIC \"{public_id}\" \"{}\">",
                doctype.name, external_id.system_id
            ),
            None => format!(
                "<!DOCTYPE {} SYSTEM \"{}\">",
                doctype.name, external_id.system_id
            ),
        },
    }
}
