//! Phone Number Value Object
//!
//! Destination numbers arrive in whatever form a user typed them. The protocol
//! expects international digits only, so `PhoneNumber::parse` strips
//! formatting, swaps the local trunk prefix for the country code and prepends
//! the country code when it is missing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local trunk prefix replaced by the country code.
pub const TRUNK_PREFIX: char = '0';

/// Suffix of a user address on the network.
pub const USER_JID_SUFFIX: &str = "@s.whatsapp.net";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneNumberError {
    #[error("Phone number contains no digits")]
    Empty,

    #[error("Country code must be digits only, got {0:?}")]
    InvalidCountryCode(String),
}

/// A destination number in international form, digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize `raw` against `country_code` (e.g. `"62"`).
    pub fn parse(raw: &str, country_code: &str) -> Result<Self, PhoneNumberError> {
        if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneNumberError::InvalidCountryCode(country_code.to_string()));
        }

        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        let normalized = if let Some(local) = digits.strip_prefix(TRUNK_PREFIX) {
            format!("{country_code}{local}")
        } else if digits.starts_with(country_code) {
            digits
        } else {
            format!("{country_code}{digits}")
        };

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Protocol address for this number.
    pub fn to_jid(&self) -> String {
        format!("{}{}", self.0, USER_JID_SUFFIX)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
