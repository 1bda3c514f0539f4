use crate::region::Region;

/// One element of the parsed markup tree.
///
/// The grammar produces the first eight variants. [`Node::Special`] and
/// [`Node::Extension`] are introduced by the rewrite passes, and
/// [`Node::Statement`] exists for programmatically constructed trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Entity(EntityNode),
    Expression(ExpressionNode),
    Element(ElementNode),
    EndElement(EndElementNode),
    Attribute(AttributeNode),
    Comment(CommentNode),
    Doctype(DoctypeNode),
    Special(SpecialNode),
    Extension(ExtensionNode),
    Statement(StatementNode),
}

/// Literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
}

/// An entity reference such as `&amp;`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub name: String,
}

/// An embedded code expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    pub code: String,
}

/// An element start tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub name: String,
    pub attributes: Vec<AttributeNode>,
    /// True when the tag is self closing.
    pub is_empty: bool,
    pub region: Region,
}

impl ElementNode {
    /// Create a synthetic element with the given name and attributes.
    pub fn synthetic(name: &str, attributes: Vec<AttributeNode>) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            is_empty: false,
            region: Region::new(0..0),
        }
    }

    /// Return the attribute with the given name, if any.
    pub fn attribute(&self, name: &str) -> Option<&AttributeNode> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Remove and return the attribute with the given name, if any.
    pub fn take_attribute(&mut self, name: &str) -> Option<AttributeNode> {
        let index = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(index))
    }
}

/// An element end tag.
#[derive(Debug, Clone, PartialEq)]
pub struct EndElementNode {
    pub name: String,
    pub region: Region,
}

/// An attribute and its value, which is a sequence of text, entity
/// reference and expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNode {
    pub name: String,
    pub value: Vec<Node>,
}

impl AttributeNode {
    /// Flatten the attribute value into code text.
    ///
    /// Text parts appear verbatim, expression parts contribute their code,
    /// and entity references are reconstructed.
    pub fn code(&self) -> String {
        let mut code = String::new();
        for node in &self.value {
            match node {
                Node::Text(text) => code.push_str(&text.text),
                Node::Expression(expression) => code.push_str(&expression.code),
                Node::Entity(entity) => {
                    code.push('&');
                    code.push_str(&entity.name);
                    code.push(';');
                }
                _ => {}
            }
        }
        code
    }
}

/// A comment.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub text: String,
}

/// A document type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DoctypeNode {
    pub name: String,
    pub external_id: Option<ExternalIdInfo>,
}

/// The SYSTEM or PUBLIC external identifier of a [`DoctypeNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdInfo {
    pub id_type: String,
    pub public_id: Option<String>,
    pub system_id: String,
}

/// A synthetic element wrapping a body of nodes, produced by the rewrite
/// passes to represent a control construct.
///
/// The body is owned exclusively by the Special.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialNode {
    pub element: ElementNode,
    pub body: Vec<Node>,
}

impl SpecialNode {
    /// Create a new Special wrapping the given element.
    pub fn new(element: ElementNode) -> Self {
        Self {
            element,
            body: vec![],
        }
    }
}

/// An element bound to an engine-registered extension name, carrying
/// its body for the extension to consume.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub element: ElementNode,
    pub body: Vec<Node>,
}

/// A raw code fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementNode {
    pub code: String,
}
