//! Secret wrapper with a redacting `Debug` impl (§6.4, §7).
//!
//! Mirrors the teacher's `config::secrets` pattern of never letting a
//! credential escape into a log line via a derived or manual `Debug`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_value() {
        let secret = SecretString::new("sk-super-secret");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("sk-super-secret"));
        assert_eq!(secret.expose(), "sk-super-secret");
    }
}
