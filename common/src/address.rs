use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in a Brazilian postal code (CEP).
pub const POSTAL_CODE_DIGITS: usize = 8;

/// A normalized postal code: exactly eight ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Strip everything but digits and accept the result only at full length.
    ///
    /// `"01310-100"`, `"01310100"` and `" 01.310-100 "` all parse; partial
    /// input while the user is still typing yields `None`.
    pub fn parse(raw: &str) -> Option<PostalCode> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        (digits.len() == POSTAL_CODE_DIGITS).then_some(PostalCode(digits))
    }

    /// Digits only, as the lookup and carrier APIs expect.
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    /// Format as `01310-100`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = self.0.split_at(5);
        write!(f, "{head}-{tail}")
    }
}

impl TryFrom<String> for PostalCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostalCode::parse(&value).ok_or_else(|| format!("invalid postal code: {value:?}"))
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}

/// Street, city and region resolved from a postal code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAddress {
    pub street: String,
    pub city: String,
    pub region: String,
}

/// Address fields a user can edit during checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    PostalCode,
    Region,
    City,
    Street,
    Number,
    Complement,
}

/// Destination address, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Raw input; may still be partial or carry a mask.
    pub postal_code: String,
    /// Two-letter state code (UF).
    pub region: String,
    pub city: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: String,
}

impl ShippingAddress {
    pub fn normalized_postal_code(&self) -> Option<PostalCode> {
        PostalCode::parse(&self.postal_code)
    }

    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::PostalCode => &self.postal_code,
            AddressField::Region => &self.region,
            AddressField::City => &self.city,
            AddressField::Street => &self.street,
            AddressField::Number => &self.number,
            AddressField::Complement => &self.complement,
        }
    }

    pub fn set(&mut self, field: AddressField, value: String) {
        let slot = match field {
            AddressField::PostalCode => &mut self.postal_code,
            AddressField::Region => &mut self.region,
            AddressField::City => &mut self.city,
            AddressField::Street => &mut self.street,
            AddressField::Number => &mut self.number,
            AddressField::Complement => &mut self.complement,
        };
        *slot = value;
    }

    /// Required fields that are still blank. Complement is optional.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.normalized_postal_code().is_none() {
            missing.push("postal_code");
        }
        for (name, value) in [
            ("region", &self.region),
            ("city", &self.city),
            ("street", &self.street),
            ("number", &self.number),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        missing
    }
}
