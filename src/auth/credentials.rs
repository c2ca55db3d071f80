//! Login and registration payloads with client-side validation.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Default role assigned to self-registered accounts.
pub const DEFAULT_ROLE: &str = "customer";

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

/// Email/password pair sent to the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(Error::Validation(
                "Please enter both email and password".into(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::Validation(
                "Please enter a valid email address".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account details sent to the registration endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password: String,
    pub password_confirm: String,
    pub role: String,
}

impl Registration {
    /// Registration with matching password fields and the default role.
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            email: email.into().trim().to_string(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: phone_number.into(),
            password_confirm: password.clone(),
            password,
            role: DEFAULT_ROLE.to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_password_confirm(mut self, confirm: impl Into<String>) -> Self {
        self.password_confirm = confirm.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            &self.email,
            &self.first_name,
            &self.last_name,
            &self.phone_number,
            &self.password,
            &self.password_confirm,
            &self.role,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::Validation("Please fill all fields".into()));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::Validation(
                "Please enter a valid email address".into(),
            ));
        }
        if self.password != self.password_confirm {
            return Err(Error::Validation("Passwords do not match".into()));
        }
        Ok(())
    }

    /// Credentials for the login that follows a successful registration.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::new("rider@example.com", "pw").validate().is_ok());
        assert!(Credentials::new("  rider@example.com ", "pw").validate().is_ok());

        let err = Credentials::new("", "pw").validate().unwrap_err();
        assert!(err.to_string().contains("both email and password"));

        let err = Credentials::new("rider@example.com", "").validate().unwrap_err();
        assert!(err.to_string().contains("both email and password"));

        for bad in ["rider", "rider@example", "rider @example.com", "@example.com"] {
            let err = Credentials::new(bad, "pw").validate().unwrap_err();
            assert!(err.to_string().contains("valid email"), "{bad}");
        }
    }

    #[test]
    fn test_registration_validation() {
        let reg = Registration::new("rider@example.com", "Asha", "Rai", "9800000000", "pw");
        assert!(reg.validate().is_ok());
        assert_eq!(reg.role, DEFAULT_ROLE);

        let missing = Registration::new("rider@example.com", "", "Rai", "9800000000", "pw");
        assert!(missing.validate().unwrap_err().to_string().contains("fill all fields"));

        let mismatch = reg.clone().with_password_confirm("other");
        assert!(mismatch.validate().unwrap_err().to_string().contains("do not match"));
    }

    #[test]
    fn test_registration_wire_fields() {
        let reg = Registration::new("rider@example.com", "Asha", "Rai", "9800000000", "pw")
            .with_role("driver");
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["first_name"], "Asha");
        assert_eq!(value["phone_number"], "9800000000");
        assert_eq!(value["password_confirm"], "pw");
        assert_eq!(value["role"], "driver");
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("rider@example.com", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
