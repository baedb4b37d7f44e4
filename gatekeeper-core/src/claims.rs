use serde_json::{Map, Value};

/// Verified JWT claims.
///
/// An opaque mapping of string to value with a handful of well-known
/// accessors. Created once per request after JWT verification and never
/// mutated thereafter.
#[derive(Debug, Clone, Default)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn sub(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    pub fn preferred_username(&self) -> Option<&str> {
        self.get_str("preferred_username")
    }

    pub fn aud(&self) -> Option<&str> {
        self.get_str("aud")
    }

    pub fn exp(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    /// User identifier derived from claims: `email` else
    /// `preferred_username` else `sub`.
    pub fn user_identifier(&self) -> Option<&str> {
        self.email().or_else(|| self.preferred_username()).or_else(|| self.sub())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(pairs: &[(&str, Value)]) -> Claims {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Claims::from_map(m)
    }

    #[test]
    fn user_identifier_prefers_email() {
        let c = claims(&[
            ("email", Value::String("a@example.com".into())),
            ("preferred_username", Value::String("alice".into())),
            ("sub", Value::String("u1".into())),
        ]);
        assert_eq!(c.user_identifier(), Some("a@example.com"));
    }

    #[test]
    fn user_identifier_falls_back_to_preferred_username() {
        let c = claims(&[
            ("preferred_username", Value::String("alice".into())),
            ("sub", Value::String("u1".into())),
        ]);
        assert_eq!(c.user_identifier(), Some("alice"));
    }

    #[test]
    fn user_identifier_falls_back_to_sub() {
        let c = claims(&[("sub", Value::String("u1".into()))]);
        assert_eq!(c.user_identifier(), Some("u1"));
    }

    #[test]
    fn user_identifier_is_none_when_all_absent() {
        let c = claims(&[]);
        assert_eq!(c.user_identifier(), None);
    }

    #[test]
    fn exp_reads_as_i64() {
        let c = claims(&[("exp", Value::from(1700000000i64))]);
        assert_eq!(c.exp(), Some(1700000000));
    }
}
