//! Size literals and unit conventions.
//!
//! Rule conditions compare `filesize` against literals like `500KB` or
//! `10MB`. The unit suffix stays symbolic in the AST; the raw byte count
//! is resolved at compile time against a [`UnitBasis`], because the
//! 1000-vs-1024 convention shifts thresholds by a few percent and is a
//! per-deployment choice.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, RuleParserError};

/// Unit suffix of a size literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    fn suffix(self) -> &'static str {
        match self {
            SizeUnit::Bytes => "B",
            SizeUnit::Kilobytes => "KB",
            SizeUnit::Megabytes => "MB",
            SizeUnit::Gigabytes => "GB",
        }
    }
}

/// The multiplier convention used to resolve size units to bytes.
///
/// `Binary` (the default) uses 1024-based units: `500KB` = 512000 bytes,
/// `10MB` = 10485760 bytes. `Decimal` uses 1000-based SI units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum UnitBasis {
    #[default]
    Binary,
    Decimal,
}

impl UnitBasis {
    /// Bytes per unit under this basis.
    pub fn multiplier(self, unit: SizeUnit) -> u64 {
        let base: u64 = match self {
            UnitBasis::Binary => 1024,
            UnitBasis::Decimal => 1000,
        };
        match unit {
            SizeUnit::Bytes => 1,
            SizeUnit::Kilobytes => base,
            SizeUnit::Megabytes => base * base,
            SizeUnit::Gigabytes => base * base * base,
        }
    }
}

/// A size literal as written in a condition: a value plus a unit suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeLiteral {
    pub value: u64,
    pub unit: SizeUnit,
}

impl SizeLiteral {
    /// Parse a literal like `512000`, `500KB`, or `10mb`.
    ///
    /// The suffix is case-insensitive; a bare number means bytes.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);
        if digits.is_empty() {
            return Err(RuleParserError::InvalidSize(format!(
                "missing numeric value in '{s}'"
            )));
        }
        let value: u64 = digits.parse().map_err(|_| {
            RuleParserError::InvalidSize(format!("value out of range in '{s}'"))
        })?;
        let unit = match suffix.to_ascii_uppercase().as_str() {
            "" | "B" => SizeUnit::Bytes,
            "KB" => SizeUnit::Kilobytes,
            "MB" => SizeUnit::Megabytes,
            "GB" => SizeUnit::Gigabytes,
            other => {
                return Err(RuleParserError::InvalidSize(format!(
                    "unknown unit '{other}' in '{s}'"
                )));
            }
        };
        Ok(SizeLiteral { value, unit })
    }

    /// Resolve to a raw byte count under the given basis.
    pub fn resolve(&self, basis: UnitBasis) -> u64 {
        self.value.saturating_mul(basis.multiplier(self.unit))
    }
}

impl fmt::Display for SizeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            SizeUnit::Bytes => write!(f, "{}", self.value),
            unit => write!(f, "{}{}", self.value, unit.suffix()),
        }
    }
}
