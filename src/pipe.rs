use serde_json::{Map, Value};
use std::fmt::{Arguments, Display, Result, Write};

/// Wraps some underlying buffer by providing methods that write to it
/// in different formats.
pub struct Pipe<'buffer> {
    buffer: &'buffer mut (dyn Write + 'buffer),
}

impl<'buffer> Pipe<'buffer> {
    /// Create a new Pipe that writes to the given buffer.
    pub fn new(buffer: &'buffer mut dyn Write) -> Self {
        Self { buffer }
    }

    /// Write the given Value to the Pipe buffer.
    ///
    /// Strings are written raw, null writes nothing, and lists and maps
    /// are written in a bracketed form.
    ///
    /// # Errors
    ///
    /// The Pipe supports all Value types, so the only error that will
    /// be returned is propagated from the underlying buffer.
    pub fn write_value(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => Ok(()),
            Value::String(string) => self.write_str(string),
            Value::Array(array) => self.write_array(array),
            Value::Object(object) => self.write_object(object),
            _ => self.write_display(value),
        }
    }

    /// Write the value to the buffer using the Display implementation.
    fn write_display(&mut self, value: impl Display) -> Result {
        write!(self.buffer, "{}", value)
    }

    /// Write the value to the buffer as a comma separated list surrounded
    /// by brackets.
    fn write_array(&mut self, value: &[Value]) -> Result {
        write!(self.buffer, "[")?;
        for (index, item) in value.iter().enumerate() {
            if index > 0 {
                write!(self.buffer, ", ")?;
            }
            self.write_value(item)?;
        }
        write!(self.buffer, "]")
    }

    /// Write the value to the buffer as key/value pairs surrounded by
    /// curly braces.
    fn write_object(&mut self, value: &Map<String, Value>) -> Result {
        write!(self.buffer, "{{")?;
        for (index, (key, item)) in value.iter().enumerate() {
            if index > 0 {
                write!(self.buffer, ", ")?;
            }
            write!(self.buffer, "{}: ", key)?;
            self.write_value(item)?;
        }
        write!(self.buffer, "}}")
    }
}

impl Write for Pipe<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> Result {
        Write::write_str(self.buffer, s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> Result {
        Write::write_char(self.buffer, c)
    }

    #[inline]
    fn write_fmt(&mut self, args: Arguments<'_>) -> Result {
        Write::write_fmt(self.buffer, args)
    }
}

#[cfg(test)]
mod tests {
    use super::Pipe;
    use serde_json::json;

    fn format(value: serde_json::Value) -> String {
        let mut buffer = String::new();
        Pipe::new(&mut buffer).write_value(&value).unwrap();
        buffer
    }

    #[test]
    fn test_write_string_raw() {
        assert_eq!(format(json!("plain")), "plain");
    }

    #[test]
    fn test_write_null_empty() {
        assert_eq!(format(json!(null)), "");
    }

    #[test]
    fn test_write_number() {
        assert_eq!(format(json!(3)), "3");
    }

    #[test]
    fn test_write_array() {
        assert_eq!(format(json!([1, 2, 3])), "[1, 2, 3]");
    }

    #[test]
    fn test_write_object() {
        assert_eq!(format(json!({"a": 1, "b": "x"})), "{a: 1, b: x}");
    }
}
