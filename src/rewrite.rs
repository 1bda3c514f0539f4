//! Node tree rewrite passes.
//!
//! Each pass is a total function over the node variant set, threading one
//! open output sequence plus a stack of saved frames for nested scope
//! tracking. The passes run in a fixed order: control elements are bound
//! into [`Special`][`crate::markup::Node::Special`] nodes first, then the
//! `each` and `if` control attributes are promoted into synthetic wrapping
//! specials of their own.

mod promote;
mod specials;

pub use promote::PromoteRewrite;
pub use specials::SpecialsRewrite;

use crate::{log::Error, markup::Node};
use std::collections::HashSet;

/// Run every rewrite pass over the given nodes.
///
/// # Errors
///
/// Returns an [`Error`] when an end tag closes an element that was never
/// opened under tracking, or a control element is never closed.
pub fn apply(
    source: &str,
    nodes: Vec<Node>,
    extensions: &HashSet<String>,
) -> Result<Vec<Node>, Error> {
    let nodes = SpecialsRewrite::new(source, extensions).rewrite(nodes)?;
    let nodes = PromoteRewrite::each(source).rewrite(nodes)?;
    let nodes = PromoteRewrite::condition(source).rewrite(nodes)?;

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{MarkupGrammar, Node};

    fn rewrite(source: &str) -> Vec<Node> {
        let nodes = MarkupGrammar::new().parse(source).unwrap();
        apply(source, nodes, &HashSet::new()).unwrap()
    }

    fn depth(nodes: &[Node]) -> usize {
        let mut open = 0_isize;
        let mut deepest = 0_isize;
        for node in nodes {
            match node {
                Node::Element(element) if !element.is_empty => {
                    open += 1;
                    deepest = deepest.max(open);
                }
                Node::EndElement(_) => open -= 1,
                Node::Special(special) => {
                    deepest = deepest.max(open + depth(&special.body) as isize)
                }
                _ => {}
            }
        }
        deepest as usize
    }

    #[test]
    fn test_passes_compose() {
        let nodes = rewrite("<if test='ready'><li each='item in items'>${item}</li></if>");

        assert_eq!(nodes.len(), 1);
        let outer = match &nodes[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        assert_eq!(outer.element.name, "if");

        let inner = match &outer.body[0] {
            Node::Special(special) => special,
            other => panic!("expected special, found {other:?}"),
        };
        assert_eq!(inner.element.name, "for");
    }

    #[test]
    fn test_nesting_depth_preserved() {
        let source = "<ul each='row in rows'><ul><li>x</li></ul></ul>";
        let before = MarkupGrammar::new().parse(source).unwrap();
        let after = apply(source, before.clone(), &HashSet::new()).unwrap();

        assert_eq!(depth(&before), depth(&after));
    }
}
