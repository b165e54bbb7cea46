//! Carrier quote wire types and normalization.
//!
//! The quoting service returns one object per carrier service. Numeric fields
//! arrive as strings or numbers depending on the service, and unavailable
//! services come back with an `error` instead of a price.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::PostalCode;
use crate::currency::{cents_to_reais, reais_to_cents};
use crate::package::{DeclaredItem, PackageDescriptor};

/// A JSON value that may be a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().replace(',', ".").parse().ok()?,
        };
        v.is_finite().then_some(v)
    }

    fn as_string(&self) -> String {
        match self {
            Numeric::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Numeric::Number(n) => n.to_string(),
            Numeric::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierCompany {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// One raw carrier offer, exactly as the upstream sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierOffer {
    #[serde(default)]
    pub id: Option<Numeric>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Numeric>,
    #[serde(default)]
    pub custom_price: Option<Numeric>,
    #[serde(default)]
    pub deadline: Option<Numeric>,
    #[serde(default)]
    pub delivery_time: Option<Numeric>,
    #[serde(default)]
    pub custom_delivery_time: Option<Numeric>,
    #[serde(default)]
    pub insurance_value: Option<Numeric>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub company: Option<CarrierCompany>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// A usable, normalized carrier quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub carrier_id: String,
    pub carrier_name: String,
    /// [`carrier_key`] of the company running the service, e.g. `correios`.
    #[serde(default)]
    pub carrier_company: String,
    /// Centavos.
    pub price: u64,
    pub deadline_days: u32,
    /// Centavos.
    pub insurance_value: u64,
    pub included_services: Vec<String>,
    pub logo_url: String,
}

impl CarrierOffer {
    /// Normalize into a quote, or `None` when the offer has no positive price.
    pub fn into_quote(self) -> Option<ShippingQuote> {
        if self.error.as_ref().is_some_and(|e| !e.is_null()) {
            return None;
        }
        let price = self
            .custom_price
            .as_ref()
            .or(self.price.as_ref())
            .and_then(Numeric::as_f64)
            .and_then(reais_to_cents)
            .filter(|&cents| cents > 0)?;

        let deadline_days = self
            .custom_delivery_time
            .as_ref()
            .or(self.delivery_time.as_ref())
            .or(self.deadline.as_ref())
            .and_then(Numeric::as_f64)
            .filter(|d| *d >= 0.0)
            .map(|d| d.ceil() as u32)
            .unwrap_or(0);

        let insurance_value = self
            .insurance_value
            .as_ref()
            .and_then(Numeric::as_f64)
            .and_then(reais_to_cents)
            .unwrap_or(0);

        let company = self.company.unwrap_or_default();
        let carrier_company = company.name.as_deref().map(carrier_key).unwrap_or_default();
        let carrier_name = self
            .name
            .or(company.name)
            .unwrap_or_else(|| "Transportadora".to_string());
        let carrier_id = self
            .id
            .as_ref()
            .map(Numeric::as_string)
            .unwrap_or_else(|| carrier_name.to_lowercase());

        Some(ShippingQuote {
            carrier_id,
            carrier_name,
            carrier_company,
            price,
            deadline_days,
            insurance_value,
            included_services: self.includes,
            logo_url: self.logo.or(company.picture).unwrap_or_default(),
        })
    }
}

/// Result of a successful quote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteOutcome {
    /// Never empty; sorted by ascending price.
    Options { quotes: Vec<ShippingQuote> },
    /// The upstream answered but no carrier serves this destination.
    NoOptions,
}

impl QuoteOutcome {
    pub fn cheapest(&self) -> Option<&ShippingQuote> {
        match self {
            QuoteOutcome::Options { quotes } => quotes.first(),
            QuoteOutcome::NoOptions => None,
        }
    }

    /// Keep only services of enabled carriers. Order is preserved.
    pub fn restrict_to(self, settings: &ShippingSettings) -> QuoteOutcome {
        match self {
            QuoteOutcome::Options { quotes } => {
                let quotes: Vec<ShippingQuote> =
                    quotes.into_iter().filter(|q| settings.allows(q)).collect();
                if quotes.is_empty() {
                    QuoteOutcome::NoOptions
                } else {
                    QuoteOutcome::Options { quotes }
                }
            }
            QuoteOutcome::NoOptions => QuoteOutcome::NoOptions,
        }
    }
}

/// Settings key for a carrier company: `"Azul Cargo Express"` becomes
/// `azul_cargo_express`.
pub fn carrier_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
        } else if !key.is_empty() && !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_end_matches('_').to_string()
}

/// Carriers offered to shoppers when nothing was configured.
pub const DEFAULT_CARRIERS: [&str; 3] = ["jadlog", "correios", "azul_cargo"];

/// Which carrier companies the shop ships with. Credentials are not part of
/// this; they come from server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSettings {
    pub enabled_carriers: Vec<String>,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CARRIERS)
    }
}

impl ShippingSettings {
    /// Normalizes names to carrier keys, dropping blanks and repeats.
    pub fn new<I, T>(carriers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut enabled_carriers: Vec<String> = Vec::new();
        for key in carriers.into_iter().map(|c| carrier_key(c.as_ref())) {
            if !key.is_empty() && !enabled_carriers.contains(&key) {
                enabled_carriers.push(key);
            }
        }
        Self { enabled_carriers }
    }

    /// A key also covers the company's branded variants: `azul_cargo`
    /// enables `azul_cargo_express`.
    pub fn allows(&self, quote: &ShippingQuote) -> bool {
        let company = quote.carrier_company.as_str();
        self.enabled_carriers.iter().any(|key| {
            company == key
                || company
                    .strip_prefix(key.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
        })
    }
}

/// Turn raw offers into a price-ascending list, dropping unusable ones.
/// Equal prices fall back to the shorter deadline.
pub fn normalize(offers: Vec<CarrierOffer>) -> QuoteOutcome {
    let mut quotes: Vec<ShippingQuote> = offers
        .into_iter()
        .filter_map(CarrierOffer::into_quote)
        .collect();
    if quotes.is_empty() {
        return QuoteOutcome::NoOptions;
    }
    quotes.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then(a.deadline_days.cmp(&b.deadline_days))
    });
    QuoteOutcome::Options { quotes }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteErrorKind {
    Network,
    Status(u16),
    Unauthorized,
    Decode,
    NotConfigured,
}

/// Quote call failure, already caught at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteError {
    pub kind: QuoteErrorKind,
    /// Provider or transport detail. Logged; shown to users only for auth failures.
    pub message: String,
}

impl QuoteError {
    pub fn new(kind: QuoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Non-technical text for the storefront banner.
    pub fn user_message(&self) -> String {
        match self.kind {
            QuoteErrorKind::Unauthorized => format!(
                "O serviço de frete recusou a autenticação: {}",
                self.message
            ),
            QuoteErrorKind::NotConfigured => {
                "O cálculo de frete está indisponível no momento.".to_string()
            }
            QuoteErrorKind::Network | QuoteErrorKind::Status(_) | QuoteErrorKind::Decode => {
                "Não foi possível calcular o frete. Tente novamente.".to_string()
            }
        }
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QuoteErrorKind::Network => write!(f, "quote network error: {}", self.message),
            QuoteErrorKind::Status(code) => write!(f, "quote HTTP {code}: {}", self.message),
            QuoteErrorKind::Unauthorized => write!(f, "quote unauthorized: {}", self.message),
            QuoteErrorKind::Decode => write!(f, "quote response undecodable: {}", self.message),
            QuoteErrorKind::NotConfigured => write!(f, "quote provider not configured"),
        }
    }
}

impl std::error::Error for QuoteError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEndpoint {
    pub postal_code: String,
}

/// One product entry in the quote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteProduct {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
    pub quantity: u32,
    /// Reais.
    pub insurance_value: f64,
    pub description: String,
}

/// Body of `POST /shipment/calculate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub from: QuoteEndpoint,
    pub to: QuoteEndpoint,
    pub products: Vec<QuoteProduct>,
}

impl QuoteRequest {
    /// The aggregated package travels as one consolidated entry so carriers
    /// price the box actually shipped; its declared value is the cart's value.
    pub fn new(
        origin: &PostalCode,
        destination: &PostalCode,
        package: &PackageDescriptor,
        items: &[DeclaredItem],
    ) -> Self {
        let declared: u64 = items.iter().map(|i| i.declared_value).sum();
        let description = items
            .iter()
            .map(|i| {
                if i.quantity > 1 {
                    format!("{}x {}", i.quantity, i.description)
                } else {
                    i.description.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let id = items
            .iter()
            .map(|i| i.id.0.as_str())
            .collect::<Vec<_>>()
            .join("+");

        Self {
            from: QuoteEndpoint {
                postal_code: origin.digits().to_string(),
            },
            to: QuoteEndpoint {
                postal_code: destination.digits().to_string(),
            },
            products: vec![QuoteProduct {
                id,
                width: package.width,
                height: package.height,
                length: package.length,
                weight: package.weight,
                quantity: 1,
                insurance_value: cents_to_reais(declared),
                description,
            }],
        }
    }
}
