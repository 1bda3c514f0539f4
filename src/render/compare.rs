use super::Operator;
use crate::log::{Error, INCOMPATIBLE_TYPES};
use serde_json::Value;

/// Return true if the given [`Value`] is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(boolean) => *boolean,
        Value::Number(number) => number.as_f64().unwrap_or(0.0) > 0.0f64,
        Value::String(string) => !string.is_empty(),
        Value::Array(array) => !array.is_empty(),
        Value::Object(object) => !object.is_empty(),
        Value::Null => false,
    }
}

/// Compare the two [`Value`] instances with the given [`Operator`].
///
/// # Errors
///
/// Returns an [`Error`] if the two types cannot be compared.
pub fn compare_values(left: &Value, operator: Operator, right: &Value) -> Result<bool, Error> {
    let result = match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            let left = left.as_f64().unwrap_or(0.0);
            let right = right.as_f64().unwrap_or(0.0);
            match operator {
                Operator::Greater => left > right,
                Operator::Lesser => left < right,
                Operator::Equal => left == right,
                Operator::NotEqual => left != right,
                Operator::GreaterOrEqual => left >= right,
                Operator::LesserOrEqual => left <= right,
            }
        }
        (Value::String(left), Value::String(right)) => match operator {
            Operator::Greater => left > right,
            Operator::Lesser => left < right,
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::GreaterOrEqual => left >= right,
            Operator::LesserOrEqual => left <= right,
        },
        (Value::Bool(left), Value::Bool(right)) => match operator {
            Operator::Greater => left > right,
            Operator::Lesser => left < right,
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::GreaterOrEqual => left >= right,
            Operator::LesserOrEqual => left <= right,
        },
        (Value::Array(left), Value::Array(right)) => match operator {
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::Greater => left.len() > right.len(),
            Operator::Lesser => left.len() < right.len(),
            Operator::GreaterOrEqual => left.len() >= right.len(),
            Operator::LesserOrEqual => left.len() <= right.len(),
        },
        (Value::Null, Value::Null) => match operator {
            Operator::Equal | Operator::GreaterOrEqual | Operator::LesserOrEqual => true,
            Operator::NotEqual | Operator::Greater | Operator::Lesser => false,
        },
        (left, right) => {
            return Err(Error::build(INCOMPATIBLE_TYPES).help(format!(
                "types `{left}` and `{right}` cannot be compared"
            )))
        }
    };

    Ok(result)
}
