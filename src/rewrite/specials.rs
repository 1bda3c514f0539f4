use crate::{
    log::{Error, UNBALANCED_ELEMENT},
    markup::{ElementNode, EndElementNode, ExtensionNode, Node, SpecialNode},
};
use std::collections::HashSet;

/// Element names recognized as control constructs.
const SPECIAL_NAMES: &[&str] = &[
    "for", "if", "elseif", "else", "content", "use", "render", "var", "viewdata", "global",
    "macro",
];

/// Binds control elements and their end tags into [`SpecialNode`] wrappers
/// owning their body.
///
/// Elements whose name is registered as an extension are bound the same
/// way into [`ExtensionNode`] wrappers.
pub struct SpecialsRewrite<'source> {
    source: &'source str,
    extensions: &'source HashSet<String>,
    nodes: Vec<Node>,
    stack: Vec<Frame>,
}

/// Saved pass state for one open control element.
///
/// Same-named nesting needs no counter here: a nested element with a
/// control name always opens its own frame, so end tags pair with the
/// innermost frame.
struct Frame {
    saved: Vec<Node>,
    element: ElementNode,
    extension: bool,
    /// True when the frame isolates a pre-existing special's body rather
    /// than an open control element.
    reconstruct: bool,
}

impl<'source> SpecialsRewrite<'source> {
    pub fn new(source: &'source str, extensions: &'source HashSet<String>) -> Self {
        Self {
            source,
            extensions,
            nodes: vec![],
            stack: vec![],
        }
    }

    /// Rewrite the given nodes.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a control element is never closed, or an
    /// end tag closes a control element that was never opened.
    pub fn rewrite(mut self, nodes: Vec<Node>) -> Result<Vec<Node>, Error> {
        for node in nodes {
            self.visit(node)?;
        }

        if let Some(frame) = self.stack.last() {
            let name = frame.element.name.clone();
            return Err(Error::build(UNBALANCED_ELEMENT)
                .pointer(self.source, frame.element.region)
                .help(format!("element `{name}` is never closed")));
        }

        Ok(self.nodes)
    }

    fn visit(&mut self, node: Node) -> Result<(), Error> {
        match node {
            Node::Element(element) => {
                self.visit_element(element);
                Ok(())
            }
            Node::EndElement(end) => self.visit_end_element(end),
            Node::Special(special) => self.visit_special(special),
            // The remaining variants are re-emitted unchanged.
            Node::Text(_)
            | Node::Entity(_)
            | Node::Expression(_)
            | Node::Attribute(_)
            | Node::Comment(_)
            | Node::Doctype(_)
            | Node::Extension(_)
            | Node::Statement(_) => {
                self.nodes.push(node);
                Ok(())
            }
        }
    }

    fn is_special(&self, name: &str) -> bool {
        SPECIAL_NAMES.contains(&name)
    }

    fn is_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn visit_element(&mut self, element: ElementNode) {
        let special = self.is_special(&element.name);
        let extension = self.is_extension(&element.name);

        if special || extension {
            if element.is_empty {
                self.emit(element, vec![], extension);
            } else {
                self.stack.push(Frame {
                    saved: std::mem::take(&mut self.nodes),
                    element,
                    extension,
                    reconstruct: false,
                });
            }
            return;
        }

        self.nodes.push(Node::Element(element));
    }

    fn visit_end_element(&mut self, end: EndElementNode) -> Result<(), Error> {
        if let Some(frame) = self.stack.last() {
            if !frame.reconstruct && frame.element.name == end.name {
                let frame = match self.stack.pop() {
                    Some(frame) => frame,
                    None => return Ok(()),
                };
                let body = std::mem::replace(&mut self.nodes, frame.saved);
                self.emit(frame.element, body, frame.extension);
                return Ok(());
            }
        }

        if self.is_special(&end.name) || self.is_extension(&end.name) {
            let name = end.name.clone();
            return Err(Error::build(UNBALANCED_ELEMENT)
                .pointer(self.source, end.region)
                .help(format!("end tag `</{name}>` closes an element that was never opened")));
        }

        self.nodes.push(Node::EndElement(end));
        Ok(())
    }

    fn visit_special(&mut self, special: SpecialNode) -> Result<(), Error> {
        let depth = self.stack.len();
        self.stack.push(Frame {
            saved: std::mem::take(&mut self.nodes),
            element: special.element,
            extension: false,
            reconstruct: true,
        });

        for node in special.body {
            self.visit(node)?;
        }

        if self.stack.len() != depth + 1 {
            let name = self
                .stack
                .last()
                .map(|frame| frame.element.name.clone())
                .unwrap_or_default();
            return Err(Error::build(UNBALANCED_ELEMENT)
                .help(format!("element `{name}` is never closed")));
        }

        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let body = std::mem::replace(&mut self.nodes, frame.saved);
        self.nodes.push(Node::Special(SpecialNode {
            element: frame.element,
            body,
        }));

        Ok(())
    }

    fn emit(&mut self, element: ElementNode, body: Vec<Node>, extension: bool) {
        if extension {
            self.nodes
                .push(Node::Extension(ExtensionNode { element, body }));
        } else {
            self.nodes.push(Node::Special(SpecialNode { element, body }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkupGrammar;

    fn rewrite(source: &str) -> Result<Vec<Node>, Error> {
        let nodes = MarkupGrammar::new().parse(source).unwrap();
        SpecialsRewrite::new(source, &HashSet::new()).rewrite(nodes)
    }

    #[test]
    fn test_binds_control_element() {
        let nodes = rewrite("<if test='ready'>yes</if>").unwrap();

        assert_eq!(nodes.len(), 1);
        let special = match &nodes[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        assert_eq!(special.element.name, "if");
        assert_eq!(special.element.attribute("test").unwrap().code(), "ready");
        assert_eq!(special.body.len(), 1);
    }

    #[test]
    fn test_binds_nested_control_elements() {
        let nodes = rewrite("<if test='a'><if test='b'>x</if></if>").unwrap();

        let outer = match &nodes[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        let inner = match &outer.body[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        assert_eq!(inner.element.attribute("test").unwrap().code(), "b");
    }

    #[test]
    fn test_self_closing_control_element() {
        let nodes = rewrite("<render section=''/>").unwrap();

        let special = match &nodes[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        assert_eq!(special.element.name, "render");
        assert!(special.body.is_empty());
    }

    #[test]
    fn test_plain_elements_flow_through() {
        let nodes = rewrite("<p>one</p>").unwrap();

        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::Element(element) if element.name == "p"));
        assert!(matches!(&nodes[2], Node::EndElement(end) if end.name == "p"));
    }

    #[test]
    fn test_stray_end_tag() {
        let result = rewrite("ok</if>");

        assert_eq!(result.unwrap_err().get_reason(), UNBALANCED_ELEMENT);
    }

    #[test]
    fn test_unclosed_control_element() {
        let result = rewrite("<content name='x'>body");

        assert_eq!(result.unwrap_err().get_reason(), UNBALANCED_ELEMENT);
    }

    #[test]
    fn test_extension_binding() {
        let mut extensions = HashSet::new();
        extensions.insert("widget".to_string());

        let source = "<widget kind='nav'>inner</widget>";
        let nodes = MarkupGrammar::new().parse(source).unwrap();
        let nodes = SpecialsRewrite::new(source, &extensions)
            .rewrite(nodes)
            .unwrap();

        let extension = match &nodes[0] {
            Node::Extension(extension) => extension,
            other => panic!("expected extension, found {other:?}"),
        };
        assert_eq!(extension.element.name, "widget");
        assert_eq!(extension.body.len(), 1);
    }
}
