//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was refused at registration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    #[error("email domain must contain a dot, like example.com")]
    InvalidDomain,
    /// More than one `@`, or whitespace inside the address.
    #[error("email contains invalid characters")]
    InvalidCharacters,
}

/// The address that identifies a marketplace account.
///
/// Two registrations that differ only in the case of the domain or in
/// surrounding whitespace name the same account, so parsing trims the input
/// and lowercases everything after the `@`. The local part keeps its case.
///
/// ```
/// use atelier_core::Email;
///
/// let email = Email::parse(" Mira@Atelier.Example ").unwrap();
/// assert_eq!(email.as_str(), "Mira@atelier.example");
///
/// assert!(Email::parse("mira@localhost").is_err());
/// assert!(Email::parse("@atelier.example").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Normalize and validate an address.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] naming the first rule the input breaks.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::InvalidCharacters);
        }

        let (local, domain) = trimmed
            .split_once('@')
            .ok_or(EmailError::MissingAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::InvalidCharacters);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        let valid_domain = domain
            .split('.')
            .all(|label| !label.is_empty())
            && domain.contains('.');
        if !valid_domain {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything after the `@`, already lowercased.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
