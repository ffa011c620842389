//! Concentration bounds for mass-balance requests.
//!
//! Callers pass one raw bound string per property key; each is turned into a
//! fractional `[min, max]` interval:
//!
//! | raw      | interval              |
//! |----------|-----------------------|
//! | `>X`     | `[X/100, 1.0]`        |
//! | `<X`     | `[0.0, X/100]`        |
//! | `A-B`    | `[A/100, B/100]`      |
//!
//! Anything else is rejected with the offending key named.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BoundsError;
use crate::substance::PropertyKey;

/// Fractional interval a weighted-average property must lie in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

/// Parsed bounds, one per constrained property key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConcentrationBounds {
    bounds: BTreeMap<PropertyKey, Bound>,
}

impl ConcentrationBounds {
    /// Bounds with no constrained keys.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Parse raw `(key, bound)` pairs.
    pub fn parse<K, V, I>(raw: I) -> Result<Self, BoundsError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut bounds = BTreeMap::new();
        for (key, value) in raw {
            let key_str = key.as_ref();
            let property: PropertyKey = key_str.parse()?;
            let bound = parse_bound(key_str, value.as_ref())?;
            bounds.insert(property, bound);
        }
        Ok(Self { bounds })
    }

    /// Insert or replace the bound for one key.
    pub fn with(mut self, key: PropertyKey, min: f64, max: f64) -> Self {
        self.bounds.insert(key, Bound { min, max });
        self
    }

    pub fn get(&self, key: PropertyKey) -> Option<Bound> {
        self.bounds.get(&key).copied()
    }

    /// Lower bound for `key`, if constrained.
    pub fn min(&self, key: PropertyKey) -> Option<f64> {
        self.get(key).map(|b| b.min)
    }

    /// Upper bound for `key`, if constrained.
    pub fn max(&self, key: PropertyKey) -> Option<f64> {
        self.get(key).map(|b| b.max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyKey, Bound)> + '_ {
        self.bounds.iter().map(|(k, b)| (*k, *b))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Parse a single raw bound string for `key`.
pub fn parse_bound(key: &str, raw: &str) -> Result<Bound, BoundsError> {
    let value = raw.trim();
    let number = |s: &str| -> Option<f64> {
        s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    };

    if let Some(rest) = value.strip_prefix('>') {
        let x = number(rest).ok_or_else(|| unsupported(key, raw))?;
        return Ok(Bound {
            min: x / 100.0,
            max: 1.0,
        });
    }

    if let Some(rest) = value.strip_prefix('<') {
        let x = number(rest).ok_or_else(|| unsupported(key, raw))?;
        return Ok(Bound {
            min: 0.0,
            max: x / 100.0,
        });
    }

    if let Some((lo, hi)) = value.split_once('-') {
        let invalid = || BoundsError::InvalidRange {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let lo = number(lo).ok_or_else(invalid)?;
        let hi = number(hi).ok_or_else(invalid)?;
        return Ok(Bound {
            min: lo / 100.0,
            max: hi / 100.0,
        });
    }

    Err(unsupported(key, raw))
}

fn unsupported(key: &str, raw: &str) -> BoundsError {
    BoundsError::UnsupportedFormat {
        key: key.to_string(),
        value: raw.to_string(),
    }
}

/// Validate a requested product mass.
pub fn validate_target_mass(mass: f64) -> Result<f64, BoundsError> {
    if mass.is_finite() && mass > 0.0 {
        Ok(mass)
    } else {
        Err(BoundsError::InvalidTargetMass { mass })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn range_bound() {
        let b = ConcentrationBounds::parse([("main_percent", "10-20")]).unwrap();
        assert!(close(b.min(PropertyKey::Main).unwrap(), 0.10));
        assert!(close(b.max(PropertyKey::Main).unwrap(), 0.20));
    }

    #[test]
    fn greater_than_bound() {
        let b = ConcentrationBounds::parse([("fe_percent", ">5")]).unwrap();
        assert!(close(b.min(PropertyKey::Fe).unwrap(), 0.05));
        assert!(close(b.max(PropertyKey::Fe).unwrap(), 1.0));
    }

    #[test]
    fn less_than_bound() {
        let b = ConcentrationBounds::parse([("si_percent", " < 5 ")]).unwrap();
        assert!(close(b.min(PropertyKey::Si).unwrap(), 0.0));
        assert!(close(b.max(PropertyKey::Si).unwrap(), 0.05));
    }

    #[test]
    fn unrecognized_format_names_key() {
        let err = ConcentrationBounds::parse([("k_percent", "about 5")]).unwrap_err();
        match err {
            BoundsError::UnsupportedFormat { key, .. } => assert_eq!(key, "k_percent"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_range_names_key() {
        let err = ConcentrationBounds::parse([("ca_percent", "1-x")]).unwrap_err();
        assert!(matches!(err, BoundsError::InvalidRange { ref key, .. } if key == "ca_percent"));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = ConcentrationBounds::parse([("zn_percent", "<1")]).unwrap_err();
        assert!(matches!(err, BoundsError::UnknownKey { .. }));
    }

    #[test]
    fn inverted_range_is_kept_for_the_solver() {
        // An inverted range is syntactically valid; the LP reports it infeasible.
        let b = parse_bound("main_percent", "30-10").unwrap();
        assert!(b.min > b.max);
    }

    #[test]
    fn target_mass_must_be_positive() {
        assert!(validate_target_mass(100.0).is_ok());
        assert!(validate_target_mass(0.0).is_err());
        assert!(validate_target_mass(f64::NAN).is_err());
    }
}
