//! Grammar for the template markup language.
//!
//! Composes the combinators in [`parse`][`crate::parse`] into a grammar for
//! text, entity references, embedded expressions, element tags, comments and
//! doctype declarations. The productions follow the XML grammar rules they
//! are named for, loosened where template syntax requires it.

mod node;

pub use node::{
    AttributeNode, CommentNode, DoctypeNode, ElementNode, EndElementNode, EntityNode,
    ExpressionNode, ExtensionNode, ExternalIdInfo, Node, SpecialNode, StatementNode, TextNode,
};

use crate::{
    log::{error_grammar, Error},
    parse::{self, ch, ch_in, ch_not, chr, opt, rep, rep1, spanned, ParseAction, Pos},
};

/// The markup grammar.
///
/// Each field is a parse action for one production. The interesting entry
/// points are [`nodes`][`MarkupGrammar::nodes`] and the
/// [`parse`][`MarkupGrammar::parse`] helper.
pub struct MarkupGrammar {
    pub whitespace: ParseAction<Vec<char>>,
    pub text: ParseAction<TextNode>,
    pub entity: ParseAction<EntityNode>,
    /// Embedded code in either delimiter style, or a lone `$` as text.
    pub code: ParseAction<Node>,
    pub attribute: ParseAction<AttributeNode>,
    pub element: ParseAction<ElementNode>,
    pub end_element: ParseAction<EndElementNode>,
    pub comment: ParseAction<CommentNode>,
    pub doctype: ParseAction<DoctypeNode>,
    pub any_node: ParseAction<Node>,
    pub nodes: ParseAction<Vec<Node>>,
}

impl MarkupGrammar {
    pub fn new() -> Self {
        let apos = chr('\'');
        let quot = chr('"');

        // NameChar ::= Letter | Digit | '.' | '-' | '_' | ':'
        let name_char = ch(char::is_alphanumeric).or(ch_in(&['.', '-', '_', ':']));

        // Name ::= (Letter | '_' | ':') (NameChar)*
        let name = ch(char::is_alphabetic)
            .or(ch_in(&['_', ':']))
            .and(rep(name_char))
            .build(|(first, rest)| {
                let mut name = String::from(first);
                name.extend(rest);
                name
            });

        // S ::= (#x20 | #x9 | #xD | #xA)+
        let whitespace = rep1(ch(char::is_whitespace));

        // Eq ::= S? '=' S?
        let eq = opt(whitespace.clone())
            .and(chr('='))
            .and(opt(whitespace.clone()));

        let text = rep1(ch_not(&['&', '<', '$'])).build(|hit| TextNode {
            text: hit.into_iter().collect(),
        });

        // EntityRef ::= '&' Name ';'
        let entity = chr('&')
            .and(name.clone())
            .and(chr(';'))
            .build(|((_, name), _)| EntityNode { name });

        // Syntax 1: ${expression}
        let code1 = parse::text("${")
            .and(rep1(ch_not(&['}'])))
            .and(chr('}'))
            .build(|((_, hit), _)| {
                Node::Expression(ExpressionNode {
                    code: hit.into_iter().collect(),
                })
            });

        // Syntax 2: $expression;
        let code2 = chr('$')
            .and(rep1(ch_not(&[';'])))
            .and(chr(';'))
            .build(|((_, hit), _)| {
                Node::Expression(ExpressionNode {
                    code: hit.into_iter().collect(),
                })
            });

        // Fallback: $ was a single text character.
        let code3 = chr('$').build(|_| {
            Node::Text(TextNode {
                text: String::from("$"),
            })
        });

        // Declared order encodes precedence.
        let code = code1.or(code2).or(code3);

        let entity_node = entity.clone().build(Node::Entity);

        // AttValue ::= '"' ([^<&"] | Reference)* '"' | "'" ([^<&']| Reference)* "'"
        let attr_single_text = rep1(ch_not(&['<', '&', '\'', '$'])).build(|hit| {
            Node::Text(TextNode {
                text: hit.into_iter().collect(),
            })
        });
        let attr_value_single = apos
            .clone()
            .and(rep(attr_single_text
                .or(entity_node.clone())
                .or(code.clone())))
            .and(apos.clone());

        let attr_double_text = rep1(ch_not(&['<', '&', '"', '$'])).build(|hit| {
            Node::Text(TextNode {
                text: hit.into_iter().collect(),
            })
        });
        let attr_value_double = quot
            .clone()
            .and(rep(attr_double_text
                .or(entity_node.clone())
                .or(code.clone())))
            .and(quot.clone());

        let attr_value = attr_value_single
            .or(attr_value_double)
            .build(|((_, value), _)| value);

        // Attribute ::= Name Eq AttValue
        let attribute = name
            .clone()
            .and(eq)
            .and(attr_value)
            .build(|((name, _), value)| AttributeNode { name, value });

        // STag ::= '<' Name (S Attribute)* S? '>'
        // EmptyElemTag ::= '<' Name (S Attribute)* S? '/>'
        let element = spanned(
            chr('<')
                .and(name.clone())
                .and(rep(whitespace
                    .clone()
                    .and(attribute.clone())
                    .build(|(_, attribute)| attribute)))
                .and(opt(whitespace.clone()))
                .and(opt(chr('/')))
                .and(chr('>')),
        )
        .build(|((((((_, name), attributes), _), slash), _), region)| ElementNode {
            name,
            attributes,
            is_empty: slash.is_some(),
            region,
        });

        // ETag ::= '</' Name S? '>'
        let end_element = spanned(
            chr('<')
                .and(chr('/'))
                .and(name.clone())
                .and(opt(whitespace.clone()))
                .and(chr('>')),
        )
        .build(|(((((_, _), name), _), _), region)| EndElementNode { name, region });

        // Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'
        let comment_char = ch_not(&['-']).or(chr('-').if_next(ch_not(&['-'])));
        let comment = parse::text("<!--")
            .and(rep(comment_char))
            .and(parse::text("-->"))
            .build(|((_, hit), _)| CommentNode {
                text: hit.into_iter().collect(),
            });

        // SystemLiteral ::= ('"' [^"]* '"') | ("'" [^']* "'")
        let system_literal = quot
            .clone()
            .and(rep(ch_not(&['"'])))
            .and(quot.clone())
            .or(apos.clone().and(rep(ch_not(&['\'']))).and(apos.clone()))
            .build(|((_, hit), _)| hit.into_iter().collect::<String>());

        // PubidChar ::= #x20 | #xD | #xA | [a-zA-Z0-9] | [-'()+,./:=?;!*#@$_%]
        let pubid_char = ch(char::is_alphanumeric).or(ch_in(&[
            ' ', '\r', '\n', '-', '(', ')', '+', ',', '.', '/', ':', '=', '?', ';', '!', '*', '#',
            '@', '$', '_', '%',
        ]));

        // PubidLiteral ::= '"' PubidChar* '"' | "'" (PubidChar - "'")* "'"
        let pubid_literal = quot
            .clone()
            .and(rep(pubid_char.clone().or(apos.clone())))
            .and(quot.clone())
            .or(apos.clone().and(rep(pubid_char)).and(apos.clone()))
            .build(|((_, hit), _)| hit.into_iter().collect::<String>());

        // ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
        let external_system = parse::text("SYSTEM")
            .and(whitespace.clone())
            .and(system_literal.clone())
            .build(|((id_type, _), system_id)| ExternalIdInfo {
                id_type: id_type.to_string(),
                public_id: None,
                system_id,
            });
        let external_public = parse::text("PUBLIC")
            .and(whitespace.clone())
            .and(pubid_literal)
            .and(whitespace.clone())
            .and(system_literal)
            .build(|((((id_type, _), public_id), _), system_id)| ExternalIdInfo {
                id_type: id_type.to_string(),
                public_id: Some(public_id),
                system_id,
            });
        let external_id = external_system.or(external_public);

        // doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? '>'
        let doctype = parse::text("<!DOCTYPE")
            .and(whitespace.clone())
            .and(name)
            .and(opt(whitespace
                .clone()
                .and(external_id)
                .build(|(_, external_id)| external_id)))
            .and(opt(whitespace.clone()))
            .and(chr('>'))
            .build(|(((((_, _), name), external_id), _), _)| DoctypeNode { name, external_id });

        let any_node = text
            .clone()
            .build(Node::Text)
            .or(entity_node)
            .or(element.clone().build(Node::Element))
            .or(end_element.clone().build(Node::EndElement))
            .or(code.clone())
            .or(doctype.clone().build(Node::Doctype))
            .or(comment.clone().build(Node::Comment));

        let nodes = rep(any_node.clone());

        Self {
            whitespace,
            text,
            entity,
            code,
            attribute,
            element,
            end_element,
            comment,
            doctype,
            any_node,
            nodes,
        }
    }

    /// Parse the given source text into a node list.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] pointing at the first position that matches no
    /// production of the grammar.
    pub fn parse(&self, source: &str) -> Result<Vec<Node>, Error> {
        let (nodes, rest) = match self.nodes.parse(source, Pos::start()) {
            Some(hit) => hit,
            None => (vec![], Pos::start()),
        };

        if !rest.is_end(source) {
            return Err(error_grammar(source, rest.offset()));
        }

        Ok(nodes)
    }
}

impl Default for MarkupGrammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Node> {
        MarkupGrammar::new().parse(source).unwrap()
    }

    #[test]
    fn test_text() {
        let nodes = parse("hello there");

        assert_eq!(
            nodes,
            vec![Node::Text(TextNode {
                text: "hello there".into()
            })]
        );
    }

    #[test]
    fn test_entity() {
        let nodes = parse("a&amp;b");

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], Node::Entity(EntityNode { name: "amp".into() }));
    }

    #[test]
    fn test_element_with_attributes() {
        let nodes = parse("<li class='odd'>one</li>");

        let element = match &nodes[0] {
            Node::Element(element) => element,
            other => panic!("expected element, found {other:?}"),
        };
        assert_eq!(element.name, "li");
        assert!(!element.is_empty);
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attributes[0].name, "class");
        assert_eq!(element.attributes[0].code(), "odd");

        let end = match &nodes[2] {
            Node::EndElement(end) => end,
            other => panic!("expected end element, found {other:?}"),
        };
        assert_eq!(end.name, "li");
    }

    #[test]
    fn test_self_closing_element() {
        let nodes = parse("<br/>");

        match &nodes[0] {
            Node::Element(element) => assert!(element.is_empty),
            other => panic!("expected element, found {other:?}"),
        }
    }

    #[test]
    fn test_expression_curly() {
        let nodes = parse("${item.name}");

        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::Expression(expression) => assert_eq!(expression.code, "item.name"),
            other => panic!("expected expression, found {other:?}"),
        }
    }

    #[test]
    fn test_expression_semi() {
        let nodes = parse("$item;");

        match &nodes[0] {
            Node::Expression(expression) => assert_eq!(expression.code, "item"),
            other => panic!("expected expression, found {other:?}"),
        }
    }

    #[test]
    fn test_dollar_fallback() {
        // No closing `;` or `}` anywhere, so the `$` is literal text.
        let nodes = parse("$5.00");

        assert_eq!(
            nodes,
            vec![
                Node::Text(TextNode { text: "$".into() }),
                Node::Text(TextNode { text: "5.00".into() }),
            ]
        );
    }

    #[test]
    fn test_dollar_brace_fallback() {
        // `${` with no `}` falls through both expression forms.
        let nodes = parse("${open");

        assert_eq!(
            nodes[0],
            Node::Text(TextNode { text: "$".into() })
        );
        assert_eq!(
            nodes[1],
            Node::Text(TextNode {
                text: "{open".into()
            })
        );
    }

    #[test]
    fn test_expression_in_attribute() {
        let nodes = parse("<li class='a ${kind}'/>");

        let element = match &nodes[0] {
            Node::Element(element) => element,
            other => panic!("expected element, found {other:?}"),
        };
        let value = &element.attributes[0].value;
        assert_eq!(value.len(), 2);
        assert_eq!(value[0], Node::Text(TextNode { text: "a ".into() }));
        match &value[1] {
            Node::Expression(expression) => assert_eq!(expression.code, "kind"),
            other => panic!("expected expression, found {other:?}"),
        }
    }

    #[test]
    fn test_attribute_quote_sensitivity() {
        // A double quote is plain text inside a single quoted value.
        let nodes = parse("<p title='say \"hi\"'/>");

        let element = match &nodes[0] {
            Node::Element(element) => element,
            other => panic!("expected element, found {other:?}"),
        };
        assert_eq!(element.attributes[0].code(), "say \"hi\"");
    }

    #[test]
    fn test_comment() {
        let nodes = parse("<!-- a - b -->");

        assert_eq!(
            nodes,
            vec![Node::Comment(CommentNode {
                text: " a - b ".into()
            })]
        );
    }

    #[test]
    fn test_comment_trailing_dashes() {
        // `--->` has no valid comment-char reading, so the whole run falls
        // out of the comment production and fails the grammar.
        let result = MarkupGrammar::new().parse("<!-- a --->");

        assert!(result.is_err());
    }

    #[test]
    fn test_doctype_bare() {
        let nodes = parse("<!DOCTYPE html>");

        assert_eq!(
            nodes,
            vec![Node::Doctype(DoctypeNode {
                name: "html".into(),
                external_id: None,
            })]
        );
    }

    #[test]
    fn test_doctype_system() {
        let nodes = parse("<!DOCTYPE html SYSTEM \"about:legacy-compat\">");

        match &nodes[0] {
            Node::Doctype(doctype) => {
                let external_id = doctype.external_id.as_ref().unwrap();
                assert_eq!(external_id.id_type, "SYSTEM");
                assert_eq!(external_id.system_id, "about:legacy-compat");
                assert_eq!(external_id.public_id, None);
            }
            other => panic!("expected doctype, found {other:?}"),
        }
    }

    #[test]
    fn test_doctype_public() {
        let nodes =
            parse("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" \"http://www.w3.org/x\">");

        match &nodes[0] {
            Node::Doctype(doctype) => {
                let external_id = doctype.external_id.as_ref().unwrap();
                assert_eq!(external_id.id_type, "PUBLIC");
                assert_eq!(
                    external_id.public_id.as_deref(),
                    Some("-//W3C//DTD XHTML 1.0//EN")
                );
            }
            other => panic!("expected doctype, found {other:?}"),
        }
    }

    #[test]
    fn test_grammar_error_location() {
        // A lone `<` matches no production.
        let result = MarkupGrammar::new().parse("ok<");

        let error = result.unwrap_err();
        assert_eq!(error.get_reason(), crate::log::INVALID_SYNTAX);
    }
}
