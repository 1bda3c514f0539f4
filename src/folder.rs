use crate::log::{error_missing_template, Error};
use std::collections::HashMap;
use std::sync::Mutex;

/// An opaque freshness stamp for one template.
pub type Signature = u64;

/// Template text plus the signature captured with it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub text: String,
    pub signature: Signature,
}

/// Supplies template text and change signals.
///
/// The compiler consumes only these three operations and never touches
/// storage directly.
pub trait ViewFolder: Send + Sync {
    /// Return true if a template with the given name exists.
    fn has_template(&self, name: &str) -> bool;

    /// Return the template's text and current signature.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the template does not exist.
    fn get_text(&self, name: &str) -> Result<SourceEntry, Error>;

    /// Return true if the template has changed since the signature was
    /// captured.
    ///
    /// Implementations should be conservative: when freshness cannot be
    /// determined, report stale so the view is rebuilt.
    fn is_stale(&self, name: &str, signature: Signature) -> bool;
}

/// An in-memory view folder.
///
/// Each update bumps the template's signature, so compiled views that
/// depend on it become stale.
#[derive(Default)]
pub struct MemoryFolder {
    templates: Mutex<HashMap<String, SourceEntry>>,
    counter: Mutex<Signature>,
}

impl MemoryFolder {
    /// Create a new, empty MemoryFolder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    pub fn set<S, T>(&self, name: S, text: T)
    where
        S: Into<String>,
        T: Into<String>,
    {
        let signature = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            *counter
        };
        self.templates.lock().unwrap().insert(
            name.into(),
            SourceEntry {
                text: text.into(),
                signature,
            },
        );
    }

    /// Add a template, returning the MemoryFolder so additional methods
    /// may be chained.
    pub fn with<S, T>(self, name: S, text: T) -> Self
    where
        S: Into<String>,
        T: Into<String>,
    {
        self.set(name, text);
        self
    }
}

impl<F> ViewFolder for std::sync::Arc<F>
where
    F: ViewFolder + ?Sized,
{
    fn has_template(&self, name: &str) -> bool {
        (**self).has_template(name)
    }

    fn get_text(&self, name: &str) -> Result<SourceEntry, Error> {
        (**self).get_text(name)
    }

    fn is_stale(&self, name: &str, signature: Signature) -> bool {
        (**self).is_stale(name, signature)
    }
}

impl ViewFolder for MemoryFolder {
    fn has_template(&self, name: &str) -> bool {
        self.templates.lock().unwrap().contains_key(name)
    }

    fn get_text(&self, name: &str) -> Result<SourceEntry, Error> {
        self.templates
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| error_missing_template(name))
    }

    fn is_stale(&self, name: &str, signature: Signature) -> bool {
        self.templates
            .lock()
            .unwrap()
            .get(name)
            .map(|entry| entry.signature != signature)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MISSING_TEMPLATE;

    #[test]
    fn test_get_text() {
        let folder = MemoryFolder::new().with("home", "<p>hi</p>");

        assert!(folder.has_template("home"));
        assert_eq!(folder.get_text("home").unwrap().text, "<p>hi</p>");
    }

    #[test]
    fn test_missing_template() {
        let folder = MemoryFolder::new();

        let error = folder.get_text("ghost").unwrap_err();
        assert_eq!(error.get_reason(), MISSING_TEMPLATE);
    }

    #[test]
    fn test_signature_bumps_on_update() {
        let folder = MemoryFolder::new().with("home", "one");
        let first = folder.get_text("home").unwrap().signature;

        assert!(!folder.is_stale("home", first));

        folder.set("home", "two");
        assert!(folder.is_stale("home", first));
    }

    #[test]
    fn test_unknown_template_is_stale() {
        let folder = MemoryFolder::new();

        assert!(folder.is_stale("ghost", 1));
    }
}
