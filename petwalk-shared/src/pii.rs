use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Hides contact details (phone numbers, e-mail addresses) from log output.
///
/// Serialization still writes the inner value, so the wrapper can sit inside
/// payloads that are handed to the push transport.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0.to_string();
        let tail: String = raw
            .chars()
            .rev()
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if raw.chars().count() <= 4 {
            write!(f, "****")
        } else {
            write!(f, "****{}", tail)
        }
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_all_but_tail() {
        let phone = Masked("010-1234-5678".to_string());
        assert_eq!(format!("{}", phone), "****78");
        assert_eq!(format!("{:?}", phone), "****78");
        assert_eq!(format!("{}", Masked("119")), "****");
    }

    #[test]
    fn test_masked_serializes_raw_value() {
        let email = Masked("owner@example.com".to_string());
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"owner@example.com\"");
    }
}
