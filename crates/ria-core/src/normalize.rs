//! Deterministic currency unification
//!
//! Rewrites every monetary amount in a text as a EUR amount with two decimals
//! and thousands separators. Recognised forms:
//!
//! - symbol prefix: `$1,200`, `£3.5m`, `€8.5 million`
//! - code prefix: `USD 250k`, `GBP 1.2bn`
//! - code suffix: `1,200 GBP`, `4.2 million USD`
//!
//! A redundant code after a symbol amount (`€8.5 million EUR`) is absorbed.
//! All other text is left byte-for-byte intact.

use crate::capability::TextNormalizer;
use crate::error::CapabilityError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const NUMBER: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";
const MULTIPLIER: &str = r"(?i:million|thousand|billion|bn|m|k)";

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?P<sym>[$£€])\s?(?P<num1>{NUMBER})(?:\s?(?P<mult1>{MULTIPLIER})\b)?(?:\s?(?:USD|GBP|EUR)\b)?|\b(?P<pre>USD|GBP|EUR)\s?(?P<num2>{NUMBER})(?:\s?(?P<mult2>{MULTIPLIER})\b)?|\b(?P<num3>{NUMBER})(?:\s?(?P<mult3>{MULTIPLIER}))?\s?(?P<post>USD|GBP|EUR)\b"
    );
    Regex::new(&pattern).expect("amount pattern is valid")
});

static LEADING_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    let pattern =
        format!(r"^\s?(?:{NUMBER})(?:\s?{MULTIPLIER}\b)?(?P<code>\s?(?:USD|GBP|EUR)\b)?");
    Regex::new(&pattern).expect("leading amount pattern is valid")
});

/// Currencies the normalizer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    /// Euro
    Eur,
    /// US dollar
    Usd,
    /// Pound sterling
    Gbp,
}

impl Currency {
    /// Currency for a symbol or ISO code
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "€" | "EUR" => Some(Self::Eur),
            "$" | "USD" => Some(Self::Usd),
            "£" | "GBP" => Some(Self::Gbp),
            _ => None,
        }
    }
}

/// Conversion rates into EUR
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeRates {
    /// EUR per EUR
    pub eur: f64,
    /// EUR per USD
    pub usd: f64,
    /// EUR per GBP
    pub gbp: f64,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self {
            eur: 1.0,
            usd: 0.91,
            gbp: 1.18,
        }
    }
}

impl ExchangeRates {
    /// Rate for `currency`
    #[inline]
    #[must_use]
    pub fn to_eur(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Eur => self.eur,
            Currency::Usd => self.usd,
            Currency::Gbp => self.gbp,
        }
    }
}

fn multiplier(word: Option<&str>) -> f64 {
    match word.map(str::to_ascii_lowercase).as_deref() {
        Some("thousand" | "k") => 1e3,
        Some("million" | "m") => 1e6,
        Some("billion" | "bn") => 1e9,
        _ => 1.0,
    }
}

/// Render `amount` as `1,234,567.89 EUR`
#[must_use]
pub fn format_eur(amount: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac:02} EUR")
}

fn opens_next_amount(rest: &str) -> bool {
    LEADING_AMOUNT
        .captures(rest)
        .is_some_and(|caps| caps.name("code").is_none())
}

/// Regex-driven currency normalizer
#[derive(Debug, Clone, Default)]
pub struct RateTableNormalizer {
    rates: ExchangeRates,
}

impl RateTableNormalizer {
    /// Create normalizer with `rates`
    #[inline]
    #[must_use]
    pub fn new(rates: ExchangeRates) -> Self {
        Self { rates }
    }

    /// Configured rates
    #[inline]
    #[must_use]
    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    /// Rewrite every amount in `text` as EUR
    ///
    /// A code between two numbers (`4 USD 5m`) prefixes the second one and
    /// the first number stays plain text, unless the second number carries
    /// its own code (`4.00 EUR 5.00 EUR`).
    #[must_use]
    pub fn convert(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut at = 0;

        while let Some(caps) = AMOUNT.captures_at(text, at) {
            let Some(whole) = caps.get(0) else { break };
            if let Some(code) = caps.name("post") {
                if opens_next_amount(&text[whole.end()..]) {
                    at = code.start();
                    continue;
                }
            }
            out.push_str(&text[copied..whole.start()]);
            out.push_str(&self.render(&caps));
            copied = whole.end();
            at = whole.end();
        }

        out.push_str(&text[copied..]);
        out
    }

    fn render(&self, caps: &Captures<'_>) -> String {
        let original = caps.get(0).map_or("", |m| m.as_str());
        let (currency, number, mult) = if let Some(sym) = caps.name("sym") {
            (sym.as_str(), caps.name("num1"), caps.name("mult1"))
        } else if let Some(code) = caps.name("pre") {
            (code.as_str(), caps.name("num2"), caps.name("mult2"))
        } else if let Some(code) = caps.name("post") {
            (code.as_str(), caps.name("num3"), caps.name("mult3"))
        } else {
            return original.to_string();
        };

        let (Some(currency), Some(number)) = (Currency::parse(currency), number) else {
            return original.to_string();
        };
        let Ok(value) = number.as_str().replace(',', "").parse::<f64>() else {
            return original.to_string();
        };

        let eur = value * multiplier(mult.map(|m| m.as_str())) * self.rates.to_eur(currency);
        format_eur(eur)
    }
}

#[async_trait]
impl TextNormalizer for RateTableNormalizer {
    async fn normalize(&self, text: &str) -> Result<String, CapabilityError> {
        Ok(self.convert(text))
    }

    fn name(&self) -> &'static str {
        "rate-table"
    }
}
