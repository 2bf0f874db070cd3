use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a finite number")]
    NotANumber(&'static str),
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Reads a finite number at a JSON pointer, naming `field` in errors.
pub(crate) fn number_at(
    value: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<f64, ParseError> {
    let raw = value.pointer(pointer).ok_or(ParseError::MissingField(field))?;
    raw.as_f64()
        .filter(|n| n.is_finite())
        .ok_or(ParseError::NotANumber(field))
}
