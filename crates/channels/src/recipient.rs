use std::fmt;

use venom_protocol::CONTACT_SUFFIX;

/// Normalized destination for an outbound message (`<number>@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipientId(String);

impl RecipientId {
    /// Append the contact suffix unless the token already carries it.
    pub fn normalize(number: &str) -> Self {
        if number.ends_with(CONTACT_SUFFIX) {
            Self(number.to_string())
        } else {
            Self(format!("{number}{CONTACT_SUFFIX}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_contact_suffix() {
        let id = RecipientId::normalize("6281234567890");
        assert_eq!(id.as_str(), "6281234567890@c.us");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = RecipientId::normalize("6281234567890");
        let twice = RecipientId::normalize(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn display_matches_inner() {
        let id = RecipientId::normalize("15551234567@c.us");
        assert_eq!(id.to_string(), "15551234567@c.us");
    }
}
