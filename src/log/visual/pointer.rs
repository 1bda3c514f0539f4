use std::{
    cmp::max,
    fmt::{Formatter, Result},
};

use super::{
    super::{RESET, YELLOW},
    {get_width, Visual, BLANK, EQUAL, HIGHLIGHT, PIPE},
};
use crate::region::Region;

/// A type of `Visual` that points to a specific location within source text.
#[derive(Debug, PartialEq)]
pub struct Pointer {
    /// The line that the Pointer is pointing to.
    ///
    /// This number should be zero indexed.
    line: usize,
    /// The column that the Pointer is pointing to.
    ///
    /// This number should be zero indexed.
    column: usize,
    /// The length of the object being highlighted.
    length: usize,
    /// The actual line of text that is being pointed to.
    text: String,
}

impl Pointer {
    /// Create a new Visual over the given source text and Region.
    pub fn new(source: &str, region: Region) -> Self {
        let begin = region.begin.min(source.len());

        let mut line = 0;
        let mut line_begin = 0;
        for (offset, next) in source.char_indices() {
            if offset >= begin {
                break;
            }
            if next == '\n' {
                line += 1;
                line_begin = offset + next.len_utf8();
            }
        }

        let text = source[line_begin..]
            .split('\n')
            .next()
            .unwrap_or("")
            .trim_end_matches('\r')
            .to_string();
        let column = get_width(&source[line_begin..begin]);
        let length = max(1, get_width(region.literal(source)));

        Self {
            line,
            column,
            length,
            text,
        }
    }
}

impl Visual for Pointer {
    fn display(
        &self,
        formatter: &mut Formatter<'_>,
        template: Option<&str>,
        help: Option<&str>,
    ) -> Result {
        let num = (self.line + 1).to_string();
        let col = self.column + 1;
        let pad = get_width(&num);
        let align = self.column + self.length;

        let extra = "-".repeat(3_usize.saturating_sub(self.length));
        let name = template.unwrap_or("?");
        let text = &self.text;
        let underline = HIGHLIGHT.repeat(self.length);

        write!(
            formatter,
            "\n {BLANK:pad$}--> {name}:{num}:{col}\
             \n {BLANK:pad$} {PIPE}\
             \n {num:>} {PIPE} {text}\
             \n {BLANK:pad$} {PIPE} {YELLOW}{underline:>align$}{RESET}{extra}\
             \n {BLANK:pad$} {PIPE}\n",
        )?;

        if let Some(help) = help {
            writeln!(formatter, "{BLANK:pad$} {EQUAL} help: {help}")?;
        }

        Ok(())
    }
}
