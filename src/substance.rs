//! Core record types for the reaction network.
//!
//! Substances are the nodes of the network, operations are directed
//! hyperedges between them, and composition variants describe the batches
//! of a substance available as raw material. All of them are read from a
//! [`GraphAccessor`](crate::store::GraphAccessor) and never mutated here.

use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BoundsError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Create an id from a raw `u64`.
            ///
            /// Returns `None` if `raw` is zero.
            pub fn new(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map($name)
            }

            /// Get the underlying `u64` value.
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a [`Substance`].
    SubstanceId,
    "sub"
);
record_id!(
    /// Identifier of an [`Operation`].
    OperationId,
    "op"
);
record_id!(
    /// Identifier of a [`CompositionVariant`].
    VariantId,
    "var"
);

/// A chemical material node in the transformation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substance {
    pub id: SubstanceId,
    /// Chemical formula as stored, e.g. `Al(OH)3`.
    pub formula: String,
    /// Molar mass in g/mol.
    pub molar_mass: f64,
    /// Whether the substance may start a chain as raw material.
    #[serde(default)]
    pub is_source: bool,
}

/// Property keys carried by every composition variant.
///
/// `Main` is the primary component concentration; the others are trace
/// impurities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    Main,
    Fe,
    Si,
    K,
    Ca,
    Mg,
    Na,
}

impl PropertyKey {
    pub const ALL: [PropertyKey; 7] = [
        PropertyKey::Main,
        PropertyKey::Fe,
        PropertyKey::Si,
        PropertyKey::K,
        PropertyKey::Ca,
        PropertyKey::Mg,
        PropertyKey::Na,
    ];

    /// Canonical external name, as used in request parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyKey::Main => "main_percent",
            PropertyKey::Fe => "fe_percent",
            PropertyKey::Si => "si_percent",
            PropertyKey::K => "k_percent",
            PropertyKey::Ca => "ca_percent",
            PropertyKey::Mg => "mg_percent",
            PropertyKey::Na => "na_percent",
        }
    }

    /// Whether this is the primary-component key.
    pub fn is_main(self) -> bool {
        self == PropertyKey::Main
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKey {
    type Err = BoundsError;

    /// Accepts `main_percent`, `main`, `Fe_percent`, `fe`, ... case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let stem = lower.strip_suffix("_percent").unwrap_or(&lower);
        match stem {
            "main" => Ok(PropertyKey::Main),
            "fe" => Ok(PropertyKey::Fe),
            "si" => Ok(PropertyKey::Si),
            "k" => Ok(PropertyKey::K),
            "ca" => Ok(PropertyKey::Ca),
            "mg" => Ok(PropertyKey::Mg),
            "na" => Ok(PropertyKey::Na),
            _ => Err(BoundsError::UnknownKey { key: s.to_string() }),
        }
    }
}

/// One supply batch of a substance with its elemental percentage profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionVariant {
    pub id: VariantId,
    pub substance_id: SubstanceId,
    pub main_percent: f64,
    #[serde(default)]
    pub fe_percent: f64,
    #[serde(default)]
    pub si_percent: f64,
    #[serde(default)]
    pub k_percent: f64,
    #[serde(default)]
    pub ca_percent: f64,
    #[serde(default)]
    pub mg_percent: f64,
    #[serde(default)]
    pub na_percent: f64,
}

impl CompositionVariant {
    /// Percentage (0..=100) for the given property.
    pub fn percent(&self, key: PropertyKey) -> f64 {
        match key {
            PropertyKey::Main => self.main_percent,
            PropertyKey::Fe => self.fe_percent,
            PropertyKey::Si => self.si_percent,
            PropertyKey::K => self.k_percent,
            PropertyKey::Ca => self.ca_percent,
            PropertyKey::Mg => self.mg_percent,
            PropertyKey::Na => self.na_percent,
        }
    }

    /// Fraction (0..=1) for the given property.
    pub fn fraction(&self, key: PropertyKey) -> f64 {
        self.percent(key) / 100.0
    }
}

/// A reaction: consumes a set of substances, produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    /// Ordered, non-empty list of consumed substances.
    pub sources: Vec<SubstanceId>,
    pub target: SubstanceId,
    pub temperature: f64,
    /// Auxiliary process parameters, delimiter-separated.
    #[serde(default)]
    pub conditions: Option<String>,
}

impl Operation {
    /// Whether any of this operation's sources is in `ids`.
    pub fn consumes_any(&self, ids: &std::collections::BTreeSet<SubstanceId>) -> bool {
        self.sources.iter().any(|s| ids.contains(s))
    }

    /// The condition line: temperature first, then every auxiliary field,
    /// joined by `delimiter`.
    pub fn condition_line(&self, delimiter: &str) -> String {
        let mut line = format_number(self.temperature);
        if let Some(extra) = self.conditions.as_deref() {
            let extra = extra.trim();
            if !extra.is_empty() {
                line.push_str(delimiter);
                line.push_str(extra);
            }
        }
        line
    }
}

/// Render whole numbers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
