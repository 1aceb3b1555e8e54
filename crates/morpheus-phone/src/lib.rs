//! C2: pure phone-number validation, grounded on `validate_number` in
//! `src/worker/sms.py`, ported onto the `phonenumber` crate (a Rust port of
//! libphonenumber) instead of the Python `phonenumbers` package.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedNumber {
    /// E.164, e.g. `+447700900123`.
    pub number: String,
    pub country_code: String,
    /// International format, e.g. `+44 7700 900123`.
    pub number_formatted: String,
    pub descr: Option<String>,
    pub is_mobile: bool,
}

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("unparsable phone number")]
    Unparsable,
    #[error("invalid phone number")]
    Invalid,
    #[error("unknown default country code {0:?}")]
    UnknownCountry(String),
}

/// Validates `raw` against `default_country` (2-letter ISO code). Returns
/// `None` semantics as `Err(ValidateError)` so callers can distinguish
/// "couldn't parse" failure modes for logging, collapsing to `None`-like
/// behavior (spec.md §4.2) wherever the caller only cares about success.
pub fn validate_number(raw: &str, default_country: &str) -> Result<ValidatedNumber, ValidateError> {
    let country: phonenumber::country::Id = default_country
        .parse()
        .map_err(|_| ValidateError::UnknownCountry(default_country.to_string()))?;

    let number =
        phonenumber::parse(Some(country), raw).map_err(|_| ValidateError::Unparsable)?;

    if !phonenumber::is_valid(&number) {
        return Err(ValidateError::Invalid);
    }

    let typ = number.phone_type();
    let is_mobile = matches!(
        typ,
        phonenumber::Type::Mobile | phonenumber::Type::FixedLineOrMobile
    );

    let e164 = phonenumber::Mode::E164.format(&number).to_string();
    let international = phonenumber::Mode::International.format(&number).to_string();

    Ok(ValidatedNumber {
        number: e164,
        country_code: number.code().value().to_string(),
        number_formatted: international,
        descr: None,
        is_mobile,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_garbage() {
        assert!(validate_number("not a number", "GB").is_err());
    }

    #[test]
    fn unknown_default_country_is_an_error() {
        assert!(matches!(
            validate_number("07700900123", "ZZ"),
            Err(ValidateError::UnknownCountry(_))
        ));
    }
}
