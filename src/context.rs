use crate::log::Error;
use serde::Serialize;
use serde_json::{to_value, Value};
use std::collections::HashMap;

/// Layered storage for data that views are rendered against.
///
/// A lookup checks view data, flash messages, framework helpers, request
/// parameters and named resources, in that order, returning the first
/// layer that holds the key.
#[derive(Default)]
pub struct RenderContext {
    data: HashMap<String, Value>,
    flash: HashMap<String, Value>,
    helpers: HashMap<String, Value>,
    parameters: HashMap<String, Value>,
    resources: HashMap<String, Value>,
}

impl RenderContext {
    /// Create a new RenderContext.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the value into the view data layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the serialization fails.
    pub fn insert<S, T>(&mut self, key: S, value: T) -> Result<(), Error>
    where
        S: Into<String>,
        T: Serialize,
    {
        match to_value(&value) {
            Ok(value) => {
                self.data.insert(key.into(), value);
                Ok(())
            }
            Err(_) => Err(Error::build("unserializable value")
                .help("the value could not be serialized into the render context")),
        }
    }

    /// Insert the value into the view data layer.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn insert_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.data.insert(key.into(), to_value(value).unwrap());
    }

    /// Insert the value into the view data layer.
    ///
    /// Returns the RenderContext, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn with_must<S, T>(mut self, key: S, value: T) -> Self
    where
        S: Into<String>,
        T: Serialize,
    {
        self.insert_must(key, value);
        self
    }

    /// Insert the value into the flash message layer.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn insert_flash_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.flash.insert(key.into(), to_value(value).unwrap());
    }

    /// Insert the value into the framework helper layer.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn insert_helper_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.helpers.insert(key.into(), to_value(value).unwrap());
    }

    /// Insert the value into the request parameter layer.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn insert_parameter_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.parameters.insert(key.into(), to_value(value).unwrap());
    }

    /// Insert the value into the named resource layer.
    ///
    /// # Panics
    ///
    /// Will panic if the serialization fails.
    #[inline]
    pub fn insert_resource_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.resources.insert(key.into(), to_value(value).unwrap());
    }

    /// Get the value of the given key from the first layer that holds it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data
            .get(key)
            .or_else(|| self.flash.get(key))
            .or_else(|| self.helpers.get(key))
            .or_else(|| self.parameters.get(key))
            .or_else(|| self.resources.get(key))
    }
}
