//! Type and unit rules
//!
//! One rule table shared by the parser, which stops at the first violation,
//! and the semantic analyzer, which records every violation and keeps going.

use thiserror::Error;

use super::{unit_name, Type, Typed, Unit};
use crate::ast::{BinOp, Property};
use crate::symbols::Symbol;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("Unit mismatch: {} and {}", show(.left), show(.right))]
    UnitMismatch { left: Option<Unit>, right: Option<Unit> },

    #[error("Operator '{op}' is not valid between {left} and {right}")]
    InvalidOperands { op: BinOp, left: Type, right: Type },

    #[error("Comparison between incompatible types: {left} and {right}")]
    ComparisonTypes { left: Type, right: Type },

    #[error("Unit mismatch in comparison: {} and {}", show(.left), show(.right))]
    ComparisonUnits { left: Option<Unit>, right: Option<Unit> },

    #[error("Variable '{name}' not declared")]
    Undeclared { name: String },

    #[error("'{name}' must be a substance to access property '{property}'")]
    NotASubstance { name: String, property: Property },

    #[error("Property '{property}' not defined for substance '{name}'")]
    UndefinedProperty { name: String, property: Property },
}

fn show(unit: &Option<Unit>) -> &'static str {
    unit_name(*unit)
}

impl Violation {
    /// Type to keep checking with after reporting this violation
    pub fn recovered(&self) -> Typed {
        match self {
            Violation::UnitMismatch { left, .. } => Typed::substance(*left),
            _ => Typed::unknown(),
        }
    }
}

/// Result type of `left op right`.
///
/// | operands             | `+` `-`                 | `*` `/`             |
/// |----------------------|-------------------------|---------------------|
/// | substance, substance | same unit, substance    | invalid             |
/// | substance, number    | invalid                 | substance           |
/// | number, number       | number                  | number              |
/// | string, string       | `+` only, string        | invalid             |
pub fn binary(op: BinOp, left: Typed, right: Typed) -> Result<Typed, Violation> {
    use Type::*;

    let invalid = || Violation::InvalidOperands { op, left: left.ty, right: right.ty };
    match op {
        BinOp::Add | BinOp::Sub => match (left.ty, right.ty) {
            (Substance, Substance) if left.unit == right.unit => Ok(Typed::substance(left.unit)),
            (Substance, Substance) => Err(Violation::UnitMismatch { left: left.unit, right: right.unit }),
            (String, String) if op == BinOp::Add => Ok(Typed::string()),
            (Number, Number) => Ok(Typed::number()),
            _ => Err(invalid()),
        },
        BinOp::Mul | BinOp::Div => match (left.ty, right.ty) {
            (Substance, Number) => Ok(Typed::substance(left.unit)),
            (Number, Number) => Ok(Typed::number()),
            _ => Err(invalid()),
        },
    }
}

/// Both sides of a comparison must share a type, and substances a unit
pub fn compare(left: Typed, right: Typed) -> Result<(), Violation> {
    if left.ty != right.ty {
        return Err(Violation::ComparisonTypes { left: left.ty, right: right.ty });
    }
    if left.ty == Type::Substance && left.unit != right.unit {
        return Err(Violation::ComparisonUnits { left: left.unit, right: right.unit });
    }
    Ok(())
}

/// Type of `name.property` given whatever `name` resolved to.
///
/// `cant` is a number in the substance's unit; `temp` and `presion` are
/// numbers in `gradC` / `atm` and exist only if the substance declared that
/// metadata slot.
pub fn property(name: &str, property: Property, symbol: Option<&Symbol>) -> Result<Typed, Violation> {
    let symbol = symbol.ok_or_else(|| Violation::Undeclared { name: name.to_string() })?;
    let info = symbol.as_substance().ok_or_else(|| Violation::NotASubstance {
        name: name.to_string(),
        property,
    })?;

    match property.metadata_unit() {
        None => Ok(Typed::measured(info.unit)),
        Some(tag) => match info.metadata_slot(tag) {
            Some(_) => Ok(Typed::measured(Some(tag))),
            None => Err(Violation::UndefinedProperty { name: name.to_string(), property }),
        },
    }
}
