use super::Error;

pub const INVALID_SYNTAX: &str = "invalid syntax";
pub const UNBALANCED_ELEMENT: &str = "unbalanced element";
pub const CONFLICTING_DECLARATION: &str = "conflicting declaration";
pub const COMPILE_FAILURE: &str = "compile failure";
pub const MISSING_TEMPLATE: &str = "missing template";
pub const INVALID_EXPRESSION: &str = "invalid expression";
pub const INCOMPATIBLE_TYPES: &str = "incompatible types";

/// Return an [`Error`] explaining that the grammar stopped before the end
/// of the source text.
pub fn error_grammar(source: &str, offset: usize) -> Error {
    let end = source[offset..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| offset + i)
        .unwrap_or(source.len());

    Error::build(INVALID_SYNTAX)
        .pointer(source, offset..end)
        .help("this text does not match the template grammar")
}

/// Return an [`Error`] describing a missing template.
pub fn error_missing_template(name: &str) -> Error {
    Error::build(MISSING_TEMPLATE).help(format!(
        "template `{name}` was not found, check the name and the view folder"
    ))
}

/// Return an [`Error`] explaining that the write operation failed.
///
/// This is likely caused by a failure during a `write!` macro operation.
pub fn error_write() -> Error {
    Error::build("write failure").help("failed to write rendered output, are you low on memory?")
}

#[cfg(test)]
mod tests {
    use super::{error_grammar, INVALID_SYNTAX};

    #[test]
    fn test_error_grammar_at_end() {
        let error = error_grammar("<p", 2);

        assert_eq!(error.get_reason(), INVALID_SYNTAX);
    }

    #[test]
    fn test_error_grammar_multibyte() {
        // The caret region must land on a char boundary.
        let source = "héllo";
        let error = error_grammar(source, 1);

        assert_eq!(error.get_reason(), INVALID_SYNTAX);
    }
}
