//! Unit algebra and explicit scale conversion.

use crate::store::Unit;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Cannot parse unit '{0}'")]
    Unparsable(String),
    #[error("Cannot convert '{from}' to '{to}': dimensions differ")]
    Incompatible { from: String, to: String },
}

/// A unit as a product of base symbols raised to integer powers.
/// Example: "kg*m/s^2" -> { "kg": 1, "m": 1, "s": -2 }
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedUnit {
    terms: BTreeMap<String, i32>,
}

impl ParsedUnit {
    pub fn from_str(s: &str) -> Result<Self, ()> {
        if s.trim().is_empty() { return Err(()); }

        let mut terms = BTreeMap::new();
        let mut parts = s.split('/');

        if let Some(num) = parts.next() { Self::parse_product(num, 1, &mut terms)?; }
        if let Some(den) = parts.next() { Self::parse_product(den, -1, &mut terms)?; }
        if parts.next().is_some() { return Err(()); } // Multiple slashes

        Ok(Self { terms })
    }

    fn parse_product(s: &str, sign: i32, terms: &mut BTreeMap<String, i32>) -> Result<(), ()> {
        let s = s.trim();
        if s.is_empty() || s == "1" { return Ok(()); }
        for factor in s.split('*') {
            let mut parts = factor.split('^');
            let base = parts.next().ok_or(())?.trim();
            if base.is_empty() || base == "1" { return Err(()); }
            let exp = parts.next().unwrap_or("1").trim().parse::<i32>().map_err(|_| ())?;
            if parts.next().is_some() { return Err(()); }
            *terms.entry(base.to_string()).or_insert(0) += exp * sign;
        }
        Ok(())
    }

    pub fn multiply(&mut self, other: &Self) {
        for (k, v) in &other.terms { *self.terms.entry(k.clone()).or_insert(0) += v; }
    }

    pub fn divide(&mut self, other: &Self) {
        for (k, v) in &other.terms { *self.terms.entry(k.clone()).or_insert(0) -= v; }
    }

    pub fn to_string(&self) -> String {
        let (num, den): (Vec<_>, Vec<_>) = self.terms.iter().filter(|&(_, &v)| v != 0).partition(|&(_, &v)| v > 0);

        let fmt = |terms: Vec<(&String, &i32)>| -> String {
            if terms.is_empty() { return "1".to_string(); }
            terms.into_iter().map(|(k, v)| if v.abs() == 1 { k.clone() } else { format!("{}^{}", k, v.abs()) }).collect::<Vec<_>>().join("*")
        };

        let n_str = fmt(num);
        let d_str = fmt(den);

        if d_str == "1" {
            n_str
        } else {
            format!("{}/{}", n_str, d_str)
        }
    }

    /// Reduces every symbol to its base dimension, returning the overall scale
    /// factor and the dimension signature.
    fn reduce(&self) -> (f64, BTreeMap<&'static str, i32>, BTreeMap<String, i32>) {
        let mut scale = 1.0;
        let mut dims: BTreeMap<&'static str, i32> = BTreeMap::new();
        // Symbols without a table entry are their own dimension.
        let mut opaque: BTreeMap<String, i32> = BTreeMap::new();
        for (symbol, &exp) in &self.terms {
            if exp == 0 { continue; }
            match lookup(symbol) {
                Some((dim, factor)) => {
                    scale *= factor.powi(exp);
                    *dims.entry(dim).or_insert(0) += exp;
                }
                None => *opaque.entry(symbol.clone()).or_insert(0) += exp,
            }
        }
        dims.retain(|_, e| *e != 0);
        opaque.retain(|_, e| *e != 0);
        (scale, dims, opaque)
    }
}

/// Scaled units understood by [`convert`]: (symbol, dimension, factor to the dimension's base).
const SCALES: &[(&str, &str, f64)] = &[
    ("eV", "energy", 1.0),
    ("keV", "energy", 1e3),
    ("MeV", "energy", 1e6),
    ("GeV", "energy", 1e9),
    ("TeV", "energy", 1e12),
    ("PeV", "energy", 1e15),
    ("J", "energy", 6.241_509_074_460_763e18),
    ("s", "time", 1.0),
    ("ms", "time", 1e-3),
    ("us", "time", 1e-6),
    ("ns", "time", 1e-9),
    ("min", "time", 60.0),
    ("h", "time", 3600.0),
    ("day", "time", 86_400.0),
    ("yr", "time", 3.155_76e7),
    ("years", "time", 3.155_76e7),
    ("m", "length", 1.0),
    ("km", "length", 1e3),
    ("cm", "length", 1e-2),
    ("mm", "length", 1e-3),
    ("nm", "length", 1e-9),
    ("fm", "length", 1e-15),
    ("kg", "mass", 1.0),
    ("g", "mass", 1e-3),
    ("rad", "angle", 1.0),
    ("deg", "angle", std::f64::consts::PI / 180.0),
];

fn lookup(symbol: &str) -> Option<(&'static str, f64)> {
    SCALES.iter().find(|(s, _, _)| *s == symbol).map(|&(_, dim, factor)| (dim, factor))
}

fn parse_unit(unit: &Unit) -> Result<ParsedUnit, UnitError> {
    if unit.is_dimensionless() {
        return Ok(ParsedUnit::default());
    }
    ParsedUnit::from_str(unit.as_str()).map_err(|_| UnitError::Unparsable(unit.to_string()))
}

/// Converts `value` expressed in `from` into `to`.
///
/// This is the only sanctioned way to change the scale of a value; modules
/// call it instead of multiplying by inline powers of ten.
pub fn convert(value: f64, from: &Unit, to: &Unit) -> Result<f64, UnitError> {
    if from == to {
        return Ok(value);
    }
    let (from_scale, from_dims, from_opaque) = parse_unit(from)?.reduce();
    let (to_scale, to_dims, to_opaque) = parse_unit(to)?.reduce();
    if from_dims != to_dims || from_opaque != to_opaque {
        return Err(UnitError::Incompatible { from: from.to_string(), to: to.to_string() });
    }
    Ok(value * from_scale / to_scale)
}
