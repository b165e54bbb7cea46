//! Brazilian real formatting and installment arithmetic.
//!
//! Amounts are always held in centavos (`u64`). The hosted backend and the
//! carrier API speak decimal reais, so the [`reais`] module converts at the
//! serde boundary.

/// Credit card payments can be split into at most this many installments.
pub const MAX_INSTALLMENTS: u8 = 12;

/// Format centavos as `R$ 1.234,56` (pt-BR grouping and decimal comma).
pub fn format_brl(amount_cents: u64) -> String {
    let reais = amount_cents / 100;
    let cents = amount_cents % 100;

    let digits = reais.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("R$ {grouped},{cents:02}")
}

/// Per-installment amount, rounded half-up to the centavo. No interest is applied.
///
/// `installments == 0` is treated as a single payment.
pub fn installment_amount(total_cents: u64, installments: u8) -> u64 {
    let n = u64::from(installments.max(1));
    let (whole, rest) = (total_cents / n, total_cents % n);
    whole + u64::from(rest * 2 >= n)
}

/// Format an installment plan as `3x de R$ 100,00`.
pub fn format_installment(total_cents: u64, installments: u8) -> String {
    let n = installments.max(1);
    format!("{n}x de {}", format_brl(installment_amount(total_cents, n)))
}

/// Convert a decimal reais value into centavos, rejecting negatives and non-finite input.
pub fn reais_to_cents(reais: f64) -> Option<u64> {
    if !reais.is_finite() || reais < 0.0 {
        return None;
    }
    Some((reais * 100.0).round() as u64)
}

/// Centavos back to decimal reais for wire formats.
pub fn cents_to_reais(cents: u64) -> f64 {
    cents as f64 / 100.0
}

/// Serde adapter storing centavos as decimal reais.
///
/// Accepts JSON numbers and numeric strings (`"23.45"`), since PostgREST
/// returns `numeric` columns either way depending on configuration.
pub mod reais {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(cents: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::cents_to_reais(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(ReaisVisitor)
    }

    struct ReaisVisitor;

    impl<'de> Visitor<'de> for ReaisVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a non-negative amount in reais")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            v.checked_mul(100)
                .ok_or_else(|| E::custom("amount out of range"))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            self.visit_f64(v as f64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            super::reais_to_cents(v).ok_or_else(|| E::custom(format!("invalid amount: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            let parsed: f64 = v
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid amount: {v:?}")))?;
            self.visit_f64(parsed)
        }
    }
}
