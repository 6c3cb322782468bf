//! Type system for MCL
//!
//! MCL values carry a type and, for substances and some numbers, a physical
//! unit. Units are tracked as first-class information so that operations on
//! incompatible quantities (mol against gramo, say) are rejected.

use serde::Serialize;
use std::fmt;

pub mod checker;
pub mod rules;

/// Physical units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    #[serde(rename = "mol")]
    Mol,
    #[serde(rename = "gramo")]
    Gramo,
    #[serde(rename = "atm")]
    Atm,
    #[serde(rename = "gradC")]
    GradC,
    #[serde(rename = "gradF")]
    GradF,
    #[serde(rename = "gradK")]
    GradK,
}

impl Unit {
    pub fn from_lexeme(lexeme: &str) -> Option<Unit> {
        match lexeme {
            "mol" => Some(Unit::Mol),
            "gramo" => Some(Unit::Gramo),
            "atm" => Some(Unit::Atm),
            "gradC" => Some(Unit::GradC),
            "gradF" => Some(Unit::GradF),
            "gradK" => Some(Unit::GradK),
            _ => None,
        }
    }

    pub fn lexeme(&self) -> &'static str {
        match self {
            Unit::Mol => "mol",
            Unit::Gramo => "gramo",
            Unit::Atm => "atm",
            Unit::GradC => "gradC",
            Unit::GradF => "gradF",
            Unit::GradK => "gradK",
        }
    }

    /// Only temperature (`gradC`) and pressure (`atm`) may tag metadata
    pub fn is_metadata_tag(&self) -> bool {
        matches!(self, Unit::GradC | Unit::Atm)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

/// Value types recognized by the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Number,
    String,
    Substance,
    Boolean,
    Reaction,
    Unknown,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Number => "number",
            Type::String => "string",
            Type::Substance => "substance",
            Type::Boolean => "boolean",
            Type::Reaction => "reaction",
            Type::Unknown => "unknown",
        };
        f.pad(name)
    }
}

/// A type paired with the unit it is measured in, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typed {
    pub ty: Type,
    pub unit: Option<Unit>,
}

impl Typed {
    pub fn new(ty: Type, unit: Option<Unit>) -> Self {
        Self { ty, unit }
    }

    pub fn number() -> Self {
        Self::new(Type::Number, None)
    }

    pub fn measured(unit: Option<Unit>) -> Self {
        Self::new(Type::Number, unit)
    }

    pub fn string() -> Self {
        Self::new(Type::String, None)
    }

    pub fn substance(unit: Option<Unit>) -> Self {
        Self::new(Type::Substance, unit)
    }

    pub fn boolean() -> Self {
        Self::new(Type::Boolean, None)
    }

    pub fn unknown() -> Self {
        Self::new(Type::Unknown, None)
    }
}

/// Renders an optional unit the way diagnostics show it
pub fn unit_name(unit: Option<Unit>) -> &'static str {
    unit.map(|u| u.lexeme()).unwrap_or("none")
}
