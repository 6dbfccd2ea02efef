//! VIN validation and year decoding
//!
//! The built-in decoder reads the model year from position 10 using the
//! standard VIN year table. External decoders (HTTP services that also
//! resolve make/model) plug in through the `VinDecoder` trait; they own
//! their timeout budget so the matcher stays synchronous.

use chrono::Datelike;

use crate::{Error, Result};

/// Model-year codes at VIN position 10. I, O, Q, U, Z and 0 are never
/// used as year codes.
const YEAR_CODES: &[(char, i32)] = &[
    ('A', 2010),
    ('B', 2011),
    ('C', 2012),
    ('D', 2013),
    ('E', 2014),
    ('F', 2015),
    ('G', 2016),
    ('H', 2017),
    ('J', 2018),
    ('K', 2019),
    ('L', 2020),
    ('M', 2021),
    ('N', 2022),
    ('P', 2023),
    ('R', 2024),
    ('S', 2025),
    ('T', 2026),
    ('V', 2027),
    ('W', 2028),
    ('X', 2029),
    ('Y', 2030),
    ('1', 2001),
    ('2', 2002),
    ('3', 2003),
    ('4', 2004),
    ('5', 2005),
    ('6', 2006),
    ('7', 2007),
    ('8', 2008),
    ('9', 2009),
];

/// Decoded VIN fields. The built-in decoder only fills `year`; external
/// decoders may resolve make and model as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VinDecoded {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Opaque VIN decoder seam. Implementations must not block past their own
/// deadline; the engine constructs them with the configured timeout.
pub trait VinDecoder: Send + Sync {
    fn decode(&self, vin: &str) -> Result<VinDecoded>;
}

/// Built-in decoder backed by the position-10 year table. Pure and
/// infallible beyond input validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableVinDecoder;

impl VinDecoder for TableVinDecoder {
    fn decode(&self, vin: &str) -> Result<VinDecoded> {
        if !is_valid_vin(vin) {
            return Err(Error::vin_decode(format!("malformed VIN: {:?}", vin)));
        }
        Ok(VinDecoded {
            year: decode_year(vin),
            make: None,
            model: None,
        })
    }
}

/// 17 characters from the VIN alphabet `[A-HJ-NPR-Z0-9]` (I, O, Q
/// excluded), case-insensitive.
pub fn is_valid_vin(vin: &str) -> bool {
    let vin = vin.trim();
    vin.len() == 17
        && vin.chars().all(|c| {
            let c = c.to_ascii_uppercase();
            c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
        })
}

/// Model year from position 10, sanity-clamped to
/// `[1980, current_year + 1]`. Returns `None` for codes outside the table
/// or years that fail the clamp.
pub fn decode_year(vin: &str) -> Option<i32> {
    let code = vin.trim().chars().nth(9)?.to_ascii_uppercase();
    let year = YEAR_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, year)| *year)?;

    let max_year = chrono::Utc::now().year() + 1;
    if (1980..=max_year).contains(&year) {
        Some(year)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_vin() {
        assert!(is_valid_vin("1FTFW1E50LFA00000"));
        assert!(is_valid_vin("1ftfw1e50lfa00000"));
        assert!(!is_valid_vin("1FTFW1E50LFA0000")); // 16 chars
        assert!(!is_valid_vin("1FTFW1E50LFA0000O")); // O excluded
        assert!(!is_valid_vin(""));
    }

    #[test]
    fn test_decode_year_letter() {
        // Position 10 = 'L' -> 2020.
        assert_eq!(decode_year("1FTFW1E50LFA00000"), Some(2020));
        // 'A' -> 2010.
        assert_eq!(decode_year("1FTFW1E50AFA00000"), Some(2010));
    }

    #[test]
    fn test_decode_year_digit() {
        // Position 10 = '5' -> 2005.
        assert_eq!(decode_year("1FTFW1E505FA00000"), Some(2005));
    }

    #[test]
    fn test_decode_year_unknown_code() {
        // 'Z' is a valid VIN character but not a year code.
        assert_eq!(decode_year("1FTFW1E50ZFA00000"), None);
    }

    #[test]
    fn test_decode_year_future_clamped() {
        // 'Y' -> 2030, beyond current_year + 1.
        assert_eq!(decode_year("1FTFW1E50YFA00000"), None);
    }

    #[test]
    fn test_table_decoder() {
        let decoder = TableVinDecoder;
        let decoded = decoder.decode("1FTFW1E50LFA00000").unwrap();
        assert_eq!(decoded.year, Some(2020));
        assert_eq!(decoded.make, None);
        assert!(decoder.decode("junk").is_err());
    }
}
