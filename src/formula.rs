//! Formula scanning and stoichiometric ratios.
//!
//! Formulas are treated as opaque strings everywhere except here. The scanner
//! only needs element symbols and the count written right after them, so
//! grouping characters (`(`, `)`, `[`, `·`) are skipped rather than expanded.

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;

/// Periodic-table symbols, in atomic-number order.
static SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Whether `symbol` is a known element symbol (case-sensitive).
pub fn is_element_symbol(symbol: &str) -> bool {
    SYMBOLS.contains(&symbol)
}

/// One element occurrence in a formula string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementToken<'a> {
    pub symbol: &'a str,
    /// Count written immediately after the symbol, if any.
    pub count: Option<u32>,
}

/// Scan a formula into element tokens, left to right.
///
/// A symbol is an uppercase ASCII letter optionally followed by one
/// lowercase letter. Everything that is neither a symbol nor a count is
/// skipped.
pub fn tokenize(formula: &str) -> Vec<ElementToken<'_>> {
    let bytes = formula.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_uppercase() {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        if i < bytes.len() && bytes[i].is_ascii_lowercase() {
            i += 1;
        }
        let symbol = &formula[start..i];

        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let count = if i > digits_start {
            formula[digits_start..i].parse::<u32>().ok()
        } else {
            None
        };

        tokens.push(ElementToken { symbol, count });
    }

    tokens
}

/// How the anchor element for stoichiometric scaling is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnchorElement {
    /// Always use this element symbol.
    Fixed(String),
    /// Use the first element of the source formula that the target also contains.
    Shared,
}

impl Default for AnchorElement {
    fn default() -> Self {
        AnchorElement::Fixed("Al".to_string())
    }
}

impl AnchorElement {
    /// Build a fixed anchor, validating the symbol.
    pub fn fixed(symbol: &str) -> Result<Self, FormulaError> {
        let symbol = symbol.trim();
        if is_element_symbol(symbol) {
            Ok(AnchorElement::Fixed(symbol.to_string()))
        } else {
            Err(FormulaError::UnknownElement {
                symbol: symbol.to_string(),
            })
        }
    }

    /// Resolve the anchor symbol for a source/target formula pair.
    pub fn resolve<'a>(&'a self, source: &'a str, target: &'a str) -> Option<&'a str> {
        match self {
            AnchorElement::Fixed(symbol) => Some(symbol.as_str()),
            AnchorElement::Shared => {
                let target_tokens = tokenize(target);
                tokenize(source)
                    .into_iter()
                    .map(|t| t.symbol)
                    .find(|s| target_tokens.iter().any(|t| t.symbol == *s))
            }
        }
    }
}

impl TryFrom<String> for AnchorElement {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("shared") {
            Ok(AnchorElement::Shared)
        } else {
            AnchorElement::fixed(&value)
        }
    }
}

impl From<AnchorElement> for String {
    fn from(anchor: AnchorElement) -> Self {
        match anchor {
            AnchorElement::Fixed(symbol) => symbol,
            AnchorElement::Shared => "shared".to_string(),
        }
    }
}

impl std::fmt::Display for AnchorElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorElement::Fixed(symbol) => f.write_str(symbol),
            AnchorElement::Shared => f.write_str("shared"),
        }
    }
}

/// Integer multiplier of `anchor` in `formula`.
///
/// Reads the digits immediately after the first occurrence of the symbol.
/// Defaults to 1 when the symbol is absent or carries no count.
pub fn anchor_coefficient(formula: &str, anchor: &str) -> u64 {
    tokenize(formula)
        .into_iter()
        .find(|t| t.symbol == anchor)
        .and_then(|t| t.count)
        .map(|c| u64::from(c.max(1)))
        .unwrap_or(1)
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Mass of target produced per unit mass of source.
///
/// `ratio = (lcm/target_coeff · M_target) / (lcm/source_coeff · M_source)`,
/// where the coefficients are the anchor-element counts of each formula.
pub fn stoichiometric_ratio(
    source_formula: &str,
    source_molar_mass: f64,
    target_formula: &str,
    target_molar_mass: f64,
    anchor: &AnchorElement,
) -> f64 {
    let (source_coeff, target_coeff) = match anchor.resolve(source_formula, target_formula) {
        Some(symbol) => (
            anchor_coefficient(source_formula, symbol),
            anchor_coefficient(target_formula, symbol),
        ),
        None => (1, 1),
    };
    let common = lcm(source_coeff, target_coeff);

    let target_units = (common / target_coeff) as f64 * target_molar_mass;
    let source_units = (common / source_coeff) as f64 * source_molar_mass;
    target_units / source_units
}
