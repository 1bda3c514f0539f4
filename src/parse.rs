//! Generic parser combinators.
//!
//! A [`ParseAction`] is a pure function from a position in source text to an
//! optional value and follow position. Grammars are composed by chaining
//! actions together, and alternatives are tried in declared order, so the
//! order of an [`or`][`ParseAction::or`] chain encodes precedence.

use crate::region::Region;
use std::rc::Rc;

/// An immutable position within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    offset: usize,
}

impl Pos {
    /// Create a new Pos at the beginning of the source text.
    #[inline]
    pub fn start() -> Self {
        Self { offset: 0 }
    }

    /// Return the byte offset of this Pos.
    #[inline]
    pub fn offset(self) -> usize {
        self.offset
    }

    /// Return the character at this Pos, if any.
    pub fn peek(self, source: &str) -> Option<char> {
        source.get(self.offset..).and_then(|rest| rest.chars().next())
    }

    /// Return a Pos past the character at this Pos.
    pub fn advance(self, source: &str) -> Self {
        match self.peek(source) {
            Some(next) => Self {
                offset: self.offset + next.len_utf8(),
            },
            None => self,
        }
    }

    /// Return true if this Pos is at the end of the source text.
    pub fn is_end(self, source: &str) -> bool {
        self.offset >= source.len()
    }
}

/// Result of a parse attempt.
///
/// Failure is represented by absence, and carries no diagnostic.
pub type Parsed<T> = Option<(T, Pos)>;

/// A composable parse function.
pub struct ParseAction<T>(Rc<dyn Fn(&str, Pos) -> Parsed<T>>);

impl<T> Clone for ParseAction<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> ParseAction<T> {
    /// Wrap the given parse function.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&str, Pos) -> Parsed<T> + 'static,
    {
        Self(Rc::new(action))
    }

    /// Apply the parse function to the given position.
    #[inline]
    pub fn parse(&self, source: &str, position: Pos) -> Parsed<T> {
        (self.0)(source, position)
    }

    /// Sequence another action after this one, producing both values
    /// as a pair.
    pub fn and<U: 'static>(self, next: ParseAction<U>) -> ParseAction<(T, U)> {
        ParseAction::new(move |source, position| {
            let (left, rest) = self.parse(source, position)?;
            let (right, rest) = next.parse(source, rest)?;
            Some(((left, right), rest))
        })
    }

    /// Try this action, falling back to the other on failure.
    ///
    /// The fallback re-parses from the original position, so alternatives
    /// have unlimited lookahead.
    pub fn or(self, other: ParseAction<T>) -> ParseAction<T> {
        ParseAction::new(move |source, position| {
            self.parse(source, position)
                .or_else(|| other.parse(source, position))
        })
    }

    /// Map a successful result through the given function.
    pub fn build<U: 'static>(self, action: impl Fn(T) -> U + 'static) -> ParseAction<U> {
        ParseAction::new(move |source, position| {
            let (value, rest) = self.parse(source, position)?;
            Some((action(value), rest))
        })
    }

    /// Succeed only when the peeked action also matches after this one,
    /// without consuming the peeked input.
    pub fn if_next<U: 'static>(self, peeked: ParseAction<U>) -> ParseAction<T> {
        ParseAction::new(move |source, position| {
            let (value, rest) = self.parse(source, position)?;
            peeked.parse(source, rest)?;
            Some((value, rest))
        })
    }
}

/// Match one character satisfying the given predicate.
pub fn ch(predicate: impl Fn(char) -> bool + 'static) -> ParseAction<char> {
    ParseAction::new(move |source, position| match position.peek(source) {
        Some(next) if predicate(next) => Some((next, position.advance(source))),
        _ => None,
    })
}

/// Match one specific character.
pub fn chr(expected: char) -> ParseAction<char> {
    ch(move |next| next == expected)
}

/// Match one character from the given set.
pub fn ch_in(set: &'static [char]) -> ParseAction<char> {
    ch(move |next| set.contains(&next))
}

/// Match one character not in the given set.
pub fn ch_not(excluded: &'static [char]) -> ParseAction<char> {
    ch(move |next| !excluded.contains(&next))
}

/// Match a fixed string.
pub fn text(expected: &'static str) -> ParseAction<&'static str> {
    ParseAction::new(move |source, position| {
        let rest = source.get(position.offset()..)?;
        if !rest.starts_with(expected) {
            return None;
        }

        let mut position = position;
        for _ in expected.chars() {
            position = position.advance(source);
        }
        Some((expected, position))
    })
}

/// Repeat an action zero or more times, collecting the values in order.
pub fn rep<T: 'static>(action: ParseAction<T>) -> ParseAction<Vec<T>> {
    ParseAction::new(move |source, position| {
        let mut values = vec![];
        let mut position = position;

        while let Some((value, rest)) = action.parse(source, position) {
            // A zero-width match would repeat forever.
            if rest == position {
                break;
            }
            values.push(value);
            position = rest;
        }
        Some((values, position))
    })
}

/// Repeat an action one or more times.
pub fn rep1<T: 'static>(action: ParseAction<T>) -> ParseAction<Vec<T>> {
    let repeated = rep(action);
    ParseAction::new(move |source, position| {
        let (values, rest) = repeated.parse(source, position)?;
        if values.is_empty() {
            return None;
        }
        Some((values, rest))
    })
}

/// Make an action optional, yielding None instead of failing.
pub fn opt<T: 'static>(action: ParseAction<T>) -> ParseAction<Option<T>> {
    ParseAction::new(move |source, position| match action.parse(source, position) {
        Some((value, rest)) => Some((Some(value), rest)),
        None => Some((None, position)),
    })
}

/// Pair a successful result with the [`Region`] of source text it consumed.
pub fn spanned<T: 'static>(action: ParseAction<T>) -> ParseAction<(T, Region)> {
    ParseAction::new(move |source, position| {
        let (value, rest) = action.parse(source, position)?;
        Some(((value, Region::new(position.offset()..rest.offset())), rest))
    })
}
