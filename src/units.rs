//! Physical units and unit-tagged quantities.
//!
//! A [`Unit`] is a scale factor to SI plus exponents over the seven SI base
//! dimensions `(m, kg, s, A, K, mol, cd)`. Units are parsed from short
//! expressions such as `"mm"`, `"kg*m/s^2"` or `"N/m^2"`. Affine units
//! (degrees Celsius, Fahrenheit) are not representable.

use crate::mesh_error::MeshFieldError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of SI base dimensions tracked per unit.
pub const BASE_DIMENSIONS: usize = 7;

const LENGTH: [i8; BASE_DIMENSIONS] = [1, 0, 0, 0, 0, 0, 0];
const MASS: [i8; BASE_DIMENSIONS] = [0, 1, 0, 0, 0, 0, 0];
const TIME: [i8; BASE_DIMENSIONS] = [0, 0, 1, 0, 0, 0, 0];
const CURRENT: [i8; BASE_DIMENSIONS] = [0, 0, 0, 1, 0, 0, 0];
const TEMPERATURE: [i8; BASE_DIMENSIONS] = [0, 0, 0, 0, 1, 0, 0];
const AMOUNT: [i8; BASE_DIMENSIONS] = [0, 0, 0, 0, 0, 1, 0];
const LUMINOSITY: [i8; BASE_DIMENSIONS] = [0, 0, 0, 0, 0, 0, 1];
const NONE: [i8; BASE_DIMENSIONS] = [0; BASE_DIMENSIONS];

/// `(symbol, scale to SI, dimensions, accepts SI prefix)`
const SYMBOLS: &[(&str, f64, [i8; BASE_DIMENSIONS], bool)] = &[
    ("m", 1.0, LENGTH, true),
    ("g", 1e-3, MASS, true),
    ("s", 1.0, TIME, true),
    ("A", 1.0, CURRENT, true),
    ("K", 1.0, TEMPERATURE, true),
    ("mol", 1.0, AMOUNT, true),
    ("cd", 1.0, LUMINOSITY, true),
    ("N", 1.0, [1, 1, -2, 0, 0, 0, 0], true),
    ("Pa", 1.0, [-1, 1, -2, 0, 0, 0, 0], true),
    ("J", 1.0, [2, 1, -2, 0, 0, 0, 0], true),
    ("W", 1.0, [2, 1, -3, 0, 0, 0, 0], true),
    ("Hz", 1.0, [0, 0, -1, 0, 0, 0, 0], true),
    ("C", 1.0, [0, 0, 1, 1, 0, 0, 0], true),
    ("V", 1.0, [2, 1, -3, -1, 0, 0, 0], true),
    ("L", 1e-3, [3, 0, 0, 0, 0, 0, 0], true),
    ("min", 60.0, TIME, false),
    ("h", 3600.0, TIME, false),
    ("d", 86400.0, TIME, false),
    ("rad", 1.0, NONE, false),
];

const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
];

/// A physical unit: display name, scale to SI and base-dimension exponents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    name: String,
    scale: f64,
    dims: [i8; BASE_DIMENSIONS],
}

impl Unit {
    /// The dimensionless unit `1`.
    pub fn dimensionless() -> Self {
        Self {
            name: String::new(),
            scale: 1.0,
            dims: NONE,
        }
    }

    /// SI second.
    pub fn second() -> Self {
        Self {
            name: "s".into(),
            scale: 1.0,
            dims: TIME,
        }
    }

    /// SI metre.
    pub fn meter() -> Self {
        Self {
            name: "m".into(),
            scale: 1.0,
            dims: LENGTH,
        }
    }

    /// Parse a unit expression, e.g. `"mm"`, `"W/m/K"`, `"kg*m^2*s^-2"`.
    pub fn parse(expr: &str) -> Result<Self, MeshFieldError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() || trimmed == "1" || trimmed == "-" {
            return Ok(Self::dimensionless());
        }
        let mut scale = 1.0;
        let mut dims = NONE;
        let mut sign = 1i32;
        let mut token = String::new();
        let mut flush = |token: &mut String, sign: i32| -> Result<(), MeshFieldError> {
            if token.is_empty() {
                return Err(MeshFieldError::Unit(format!(
                    "empty factor in unit expression `{trimmed}`"
                )));
            }
            let (factor_scale, factor_dims, power) = parse_factor(token)?;
            let power = power * sign;
            scale *= factor_scale.powi(power);
            for (d, f) in dims.iter_mut().zip(factor_dims.iter()) {
                *d += (*f as i32 * power) as i8;
            }
            token.clear();
            Ok(())
        };
        for ch in trimmed.chars() {
            match ch {
                '*' | '.' | '·' => {
                    flush(&mut token, sign)?;
                    sign = 1;
                }
                '/' => {
                    flush(&mut token, sign)?;
                    sign = -1;
                }
                c if c.is_whitespace() => {
                    if !token.is_empty() {
                        flush(&mut token, sign)?;
                        sign = 1;
                    }
                }
                c => token.push(c),
            }
        }
        flush(&mut token, sign)?;
        Ok(Self {
            name: trimmed.to_string(),
            scale,
            dims,
        })
    }

    /// Display name as given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Multiplicative factor converting one of this unit into SI base units.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Base-dimension exponents `(m, kg, s, A, K, mol, cd)`.
    pub fn dimensions(&self) -> [i8; BASE_DIMENSIONS] {
        self.dims
    }

    /// True when both units measure the same physical dimension.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }

    pub fn is_time(&self) -> bool {
        self.dims == TIME
    }

    pub fn is_length(&self) -> bool {
        self.dims == LENGTH
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims == NONE
    }

    /// Factor `f` such that `x [self] == x * f [to]`.
    pub fn conversion_factor(&self, to: &Unit) -> Result<f64, MeshFieldError> {
        if !self.is_compatible(to) {
            return Err(MeshFieldError::IncompatibleUnits {
                from: self.name.clone(),
                to: to.name.clone(),
            });
        }
        Ok(self.scale / to.scale)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Unit {
    type Err = MeshFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

/// Split `"m^2"`, `"s-1"`, `"m2"` into symbol and integer power, then resolve the symbol.
fn parse_factor(token: &str) -> Result<(f64, [i8; BASE_DIMENSIONS], i32), MeshFieldError> {
    let split = token
        .char_indices()
        .find(|(_, c)| *c == '^' || *c == '-' || c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    let (symbol, power_str) = token.split_at(split);
    let power_str = power_str.strip_prefix('^').unwrap_or(power_str);
    let power = if power_str.is_empty() {
        1
    } else {
        power_str
            .parse::<i32>()
            .map_err(|_| MeshFieldError::Unit(format!("invalid exponent in `{token}`")))?
    };
    let (scale, dims) = resolve_symbol(symbol)
        .ok_or_else(|| MeshFieldError::Unit(format!("unknown unit symbol `{symbol}`")))?;
    Ok((scale, dims, power))
}

fn resolve_symbol(symbol: &str) -> Option<(f64, [i8; BASE_DIMENSIONS])> {
    if let Some((_, scale, dims, _)) = SYMBOLS.iter().find(|(s, ..)| *s == symbol) {
        return Some((*scale, *dims));
    }
    for (prefix, factor) in PREFIXES {
        if let Some(rest) = symbol.strip_prefix(prefix) {
            if let Some((_, scale, dims, _)) = SYMBOLS
                .iter()
                .find(|(s, _, _, prefixable)| *prefixable && *s == rest)
            {
                return Some((factor * scale, *dims));
            }
        }
    }
    None
}

/// A value tagged with a physical unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity<T = f64> {
    pub value: T,
    pub unit: Unit,
}

impl<T> Quantity<T> {
    pub fn new(value: T, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }
}

impl Quantity<f64> {
    /// Parse the unit expression and build a scalar quantity.
    pub fn parse(value: f64, unit: &str) -> Result<Self, MeshFieldError> {
        Ok(Self::new(value, Unit::parse(unit)?))
    }

    /// Value expressed in SI base units.
    pub fn si_value(&self) -> f64 {
        self.value * self.unit.scale
    }

    /// Value expressed in `unit`.
    pub fn value_in(&self, unit: &Unit) -> Result<f64, MeshFieldError> {
        Ok(self.value * self.unit.conversion_factor(unit)?)
    }

    /// Convert to another unit of the same dimension.
    pub fn convert_to(&self, unit: &Unit) -> Result<Self, MeshFieldError> {
        Ok(Self::new(self.value_in(unit)?, unit.clone()))
    }
}

impl Quantity<Vec<f64>> {
    /// Component-wise conversion to another unit of the same dimension.
    pub fn convert_to(&self, unit: &Unit) -> Result<Self, MeshFieldError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(Self::new(
            self.value.iter().map(|v| v * factor).collect(),
            unit.clone(),
        ))
    }
}

impl fmt::Display for Quantity<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.name.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}
