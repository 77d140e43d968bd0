//! Fuel mass units.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FuelUnits {
    #[default]
    Kilograms,
    Pounds,
}

impl FuelUnits {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            FuelUnits::Kilograms => "kg",
            FuelUnits::Pounds => "lbs",
        }
    }
}

impl std::fmt::Display for FuelUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for FuelUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" | "kilograms" => Ok(FuelUnits::Kilograms),
            "lb" | "lbs" | "pounds" => Ok(FuelUnits::Pounds),
            other => Err(format!("unknown fuel units '{}' (expected kg or lbs)", other)),
        }
    }
}
