/// Server-assigned user identifier, normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub phone: String,
    pub name: Option<String>,
}

impl User {
    /// Name when the user set one, phone otherwise.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.phone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> User {
        User {
            id: UserId("7".to_owned()),
            phone: "9876543210".to_owned(),
            name: name.map(str::to_owned),
        }
    }

    #[test]
    fn display_name_prefers_name() {
        assert_eq!(user(Some("Asha")).display_name(), "Asha");
    }

    #[test]
    fn display_name_falls_back_to_phone_for_missing_or_blank_name() {
        assert_eq!(user(None).display_name(), "9876543210");
        assert_eq!(user(Some("  ")).display_name(), "9876543210");
    }
}
