use crate::{
    log::{Error, UNBALANCED_ELEMENT},
    markup::{AttributeNode, ElementNode, EndElementNode, Node, SpecialNode},
    region::Region,
};

/// Promotes a control attribute into a wrapping synthetic control element.
///
/// An element carrying the designated attribute loses it and is wrapped in
/// a new [`SpecialNode`] whose synthetic element carries the attribute's
/// value as its parameter. The pass then tracks nested elements that share
/// the original element's tag name, so closing tags are matched to the
/// right scope.
pub struct PromoteRewrite<'source> {
    source: &'source str,
    /// The attribute that triggers promotion.
    attribute: &'static str,
    /// Tag name of the synthetic wrapping element.
    element: &'static str,
    /// Name given to the attribute on the synthetic element.
    parameter: &'static str,
    nodes: Vec<Node>,
    closing_name: Option<String>,
    outstanding: usize,
    stack: Vec<Frame>,
}

/// Saved pass state for one open scope.
struct Frame {
    saved: Vec<Node>,
    closing_name: Option<String>,
    outstanding: usize,
    /// Element the finished body is attached to on pop.
    pending: ElementNode,
    /// Where tracking began, for unbalance reporting.
    opened: Region,
}

impl<'source> PromoteRewrite<'source> {
    /// The `each` promotion pass, producing `<for each="..">` wrappers.
    pub fn each(source: &'source str) -> Self {
        Self::new(source, "each", "for", "each")
    }

    /// The `if` promotion pass, producing `<if test="..">` wrappers.
    pub fn condition(source: &'source str) -> Self {
        Self::new(source, "if", "if", "test")
    }

    fn new(
        source: &'source str,
        attribute: &'static str,
        element: &'static str,
        parameter: &'static str,
    ) -> Self {
        Self {
            source,
            attribute,
            element,
            parameter,
            nodes: vec![],
            closing_name: None,
            outstanding: 0,
            stack: vec![],
        }
    }

    /// Rewrite the given nodes.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an element that began tracking is never
    /// closed.
    pub fn rewrite(mut self, nodes: Vec<Node>) -> Result<Vec<Node>, Error> {
        for node in nodes {
            self.visit(node)?;
        }

        if let Some(frame) = self.stack.last() {
            let name = self.closing_name.as_deref().unwrap_or(self.element);
            return Err(Error::build(UNBALANCED_ELEMENT)
                .pointer(self.source, frame.opened)
                .help(format!("element `{name}` carries `{attribute}` but is never closed",
                    attribute = self.attribute)));
        }

        Ok(self.nodes)
    }

    fn visit(&mut self, node: Node) -> Result<(), Error> {
        match node {
            Node::Element(element) => self.visit_element(element),
            Node::EndElement(end) => {
                self.visit_end_element(end);
                Ok(())
            }
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

    fn visit_element(&mut self, mut element: ElementNode) -> Result<(), Error> {
        if let Some(found) = element.take_attribute(self.attribute) {
            let parameter = AttributeNode {
                name: self.parameter.to_string(),
                value: found.value,
            };
            let mut wrapper = ElementNode::synthetic(self.element, vec![parameter]);
            wrapper.region = element.region;

            if element.is_empty {
                let mut special = SpecialNode::new(wrapper);
                special.body.push(Node::Element(element));
                self.nodes.push(Node::Special(special));
            } else {
                let name = element.name.clone();
                self.push_frame(wrapper, element.region);
                self.closing_name = Some(name);
                self.outstanding = 1;
                self.nodes.push(Node::Element(element));
            }
        } else {
            if self.closing_name.as_deref() == Some(element.name.as_str()) && !element.is_empty {
                self.outstanding += 1;
            }
            self.nodes.push(Node::Element(element));
        }

        Ok(())
    }

    fn visit_end_element(&mut self, end: EndElementNode) {
        let matched = self.closing_name.as_deref() == Some(end.name.as_str());
        self.nodes.push(Node::EndElement(end));

        if matched {
            self.outstanding -= 1;
            if self.outstanding == 0 {
                self.pop_frame();
            }
        }
    }

    fn visit_special(&mut self, special: SpecialNode) -> Result<(), Error> {
        // A pre-existing Special gets an isolated frame, so tracking inside
        // its body starts fresh.
        let depth = self.stack.len();
        self.push_frame(special.element, Region::new(0..0));
        self.closing_name = None;
        self.outstanding = 0;

        for node in special.body {
            self.visit(node)?;
        }

        if self.stack.len() != depth + 1 {
            let name = self.closing_name.clone().unwrap_or_default();
            return Err(Error::build(UNBALANCED_ELEMENT).help(format!(
                "element `{name}` carries `{attribute}` but is never closed",
                attribute = self.attribute
            )));
        }
        self.pop_frame();

        Ok(())
    }

    fn push_frame(&mut self, pending: ElementNode, opened: Region) {
        self.stack.push(Frame {
            saved: std::mem::take(&mut self.nodes),
            closing_name: self.closing_name.take(),
            outstanding: self.outstanding,
            pending,
            opened,
        });
        self.outstanding = 0;
    }

    fn pop_frame(&mut self) {
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return,
        };
        let body = std::mem::replace(&mut self.nodes, frame.saved);
        self.closing_name = frame.closing_name;
        self.outstanding = frame.outstanding;

        self.nodes.push(Node::Special(SpecialNode {
            element: frame.pending,
            body,
        }));
    }
}
