use serde::{Deserialize, Serialize};

/// Value of a type-specific entity field or a meta key.
///
/// Untagged on the JSON surface, so `{"health": 80}` decodes as `Int(80)` and
/// `{"rotation": 1.5}` as `Float(1.5)`. Anything else (objects, arrays, null)
/// is rejected when a packet enters the system, as are non-finite floats.
///
/// Equality treats a NaN float as equal to itself so an unchanged NaN never
/// registers as a change.
#[derive(
    Debug,
    Clone,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// False only for a NaN or infinite float. JSON cannot carry those.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_pick_narrowest_variant() {
        let int: FieldValue = serde_json::from_str("80").unwrap();
        let float: FieldValue = serde_json::from_str("1.5").unwrap();
        let text: FieldValue = serde_json::from_str("\"boss\"").unwrap();
        let flag: FieldValue = serde_json::from_str("true").unwrap();

        assert_eq!(int, FieldValue::Int(80));
        assert_eq!(float, FieldValue::Float(1.5));
        assert_eq!(text, FieldValue::from("boss"));
        assert_eq!(flag, FieldValue::Bool(true));
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(serde_json::from_str::<FieldValue>("{\"a\": 1}").is_err());
        assert!(serde_json::from_str::<FieldValue>("[1, 2]").is_err());
        assert!(serde_json::from_str::<FieldValue>("null").is_err());
    }

    #[test]
    fn numeric_view_widens_ints() {
        assert_eq!(FieldValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Float(3.5).as_i64(), None);
        assert_eq!(FieldValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn nan_equals_itself_but_is_not_finite() {
        let nan = FieldValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert!(!nan.is_finite());
        assert!(!FieldValue::Float(f64::INFINITY).is_finite());
        assert!(FieldValue::Int(i64::MAX).is_finite());
        assert_ne!(FieldValue::Int(1), FieldValue::Float(1.0));
    }
}
