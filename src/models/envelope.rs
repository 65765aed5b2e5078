use serde_json::{Map, Value};

/// One decoded bus message: the `MessageName` discriminator plus the
/// remaining payload as a loosely-typed JSON object. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    message_name: String,
    fields: Map<String, Value>,
}

/// Terminal decode failures. A message that fails here will never parse
/// correctly on redelivery, so the consumer drops it.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message body is not a JSON object")]
    NotAnObject,

    #[error("message has no MessageName discriminator")]
    MissingMessageName,
}

/// A required payload field was absent or had the wrong shape. Terminal for
/// the message, same as a decode failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("required field '{0}' is missing")]
    Missing(&'static str),

    #[error("field '{0}' is not a {1}")]
    WrongShape(&'static str, &'static str),
}

impl Envelope {
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(body)?;
        let document: Value = serde_json::from_str(text)?;

        let Value::Object(fields) = document else {
            return Err(DecodeError::NotAnObject);
        };

        let message_name = fields
            .get("MessageName")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingMessageName)?
            .to_string();

        Ok(Self {
            message_name,
            fields,
        })
    }

    pub fn message_name(&self) -> &str {
        &self.message_name
    }

    pub fn string(&self, name: &'static str) -> Result<&str, FieldError> {
        self.required(name)?
            .as_str()
            .ok_or(FieldError::WrongShape(name, "string"))
    }

    pub fn integer(&self, name: &'static str) -> Result<i64, FieldError> {
        self.required(name)?
            .as_i64()
            .ok_or(FieldError::WrongShape(name, "integer"))
    }

    pub fn boolean(&self, name: &'static str) -> Result<bool, FieldError> {
        self.required(name)?
            .as_bool()
            .ok_or(FieldError::WrongShape(name, "boolean"))
    }

    pub fn object(&self, name: &'static str) -> Result<&Map<String, Value>, FieldError> {
        self.required(name)?
            .as_object()
            .ok_or(FieldError::WrongShape(name, "object"))
    }

    /// Absent, null, or non-string values all read as `None`.
    pub fn optional_string(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    fn required(&self, name: &'static str) -> Result<&Value, FieldError> {
        match self.fields.get(name) {
            Some(Value::Null) | None => Err(FieldError::Missing(name)),
            Some(value) => Ok(value),
        }
    }
}
