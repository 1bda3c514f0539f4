use super::{Pointer, RED, RESET};
use crate::{log::Visual, region::Region};
use std::fmt::{Debug, Display, Formatter, Result};

/// Describes an error, and allows adding a contextual help text and visualization.
///
/// # Examples
///
/// Creating an [`Error`] that includes a [`Visual`] of type [`Pointer`]:
///
/// ```
/// use cinder::log::Error;
/// use cinder::Region;
///
/// Error::build("unexpected end tag")
///     .pointer("<p></div>", Region::new(3..9))
///     .template("home.html")
///     .help("expected `</p>`");
/// ```
///
/// When printed with `println!("{:#}", error)` the [`Error`] produces output
/// in this shape:
///
/// ```text
/// error: unexpected end tag
///   --> home.html:1:4
///    |
///  1 | <p></div>
///    |    ^^^^^^
///    |
///   = help: expected `</p>`
/// ```
pub struct Error {
    /// Describes the cause of the [`Error`].
    reason: String,
    /// A visualization to help illustrate the [`Error`].
    visual: Option<Box<dyn Visual>>,
    /// Additional information to display with the [`Error`].
    help: Option<String>,
    /// The name of the template that the [`Error`] comes from.
    name: Option<String>,
}

impl Error {
    /// Create a new [`Error`] with the given reason text.
    ///
    /// The additional fields may be populated using the various methods
    /// defined on `Error`.
    pub fn build<T>(reason: T) -> Self
    where
        T: Into<String>,
    {
        Error {
            reason: reason.into(),
            name: None,
            visual: None,
            help: None,
        }
    }

    /// Set the name of the template that the [`Error`] is related to.
    pub fn template<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(text.into());

        self
    }

    /// Set the visualization to a new [`Pointer`] over the given source text
    /// and [`Region`].
    pub fn pointer<T>(mut self, source: &str, region: T) -> Self
    where
        T: Into<Region>,
    {
        self.visual = Some(Box::new(Pointer::new(source, region.into())));

        self
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Return the reason text.
    pub fn get_reason(&self) -> &str {
        &self.reason
    }

    /// Return the help text, if any.
    pub fn get_help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Return the name of the template that the error is related to.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if !f.alternate() {
            writeln!(f, "{self:#}")?;
        }
        f.debug_struct("Error")
            .field("reason", &self.reason)
            .field("name", &self.name)
            .field("visual", &self.visual)
            .field("help", &self.help)
            .finish()?;

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let header = format!("{RED}error{RESET}");
        write!(f, "{header}: {}", self.reason)?;

        match &self.visual {
            Some(visual) if f.alternate() => {
                visual.display(f, self.name.as_deref(), self.help.as_deref())
            }
            _ => Ok(()),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.reason == other.reason && self.help == other.help && self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_reason() {
        let error = Error::build("invalid syntax").help("check the template");

        assert_eq!(error.get_reason(), "invalid syntax");
        assert_eq!(error.get_help(), Some("check the template"));
    }

    #[test]
    fn test_template_name() {
        let error = Error::build("missing template").template("layout.html");

        assert_eq!(error.get_name(), Some("layout.html"));
    }

    #[test]
    fn test_display() {
        let error = Error::build("unbalanced element")
            .pointer("<ul></li>", 4..9)
            .template("list.html")
            .help("expected `</ul>`");
        let text = format!("{error:#}");

        assert!(text.contains("unbalanced element"));
        assert!(text.contains("list.html:1:5"));
        assert!(text.contains("help: expected `</ul>`"));
    }
}
