// The typed data value that travels through places

use serde::{Deserialize, Serialize};

/// A token: an opaque, typed data value resident in a place.
///
/// The engine doesn't know or care what's inside — it's whatever the
/// transition authors agreed a given place's color tag means. We use
/// `serde_json::Value` as the payload the same way the reference crate's
/// `Resource::data` field carries domain-specific state generically,
/// since this engine (like its teacher) is driven by data defined outside
/// the crate, not by a compile-time schema.
///
/// Equality is by value, matching §4.A's "by value equality, each listed
/// token removes one matching occurrence".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token(pub serde_json::Value);

impl Token {
    pub fn new(value: serde_json::Value) -> Self {
        Token(value)
    }

    pub fn unit() -> Self {
        Token(serde_json::Value::Null)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Token {
    fn from(value: serde_json::Value) -> Self {
        Token(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokens_compare_by_value() {
        let a = Token::new(json!({"order": 1}));
        let b = Token::new(json!({"order": 1}));
        let c = Token::new(json!({"order": 2}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unit_token_is_null() {
        assert_eq!(Token::unit().value(), &serde_json::Value::Null);
    }
}
