//! Canonical medicine catalog models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single medicine in the canonical catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineRecord {
    /// Catalog identifier
    pub id: String,
    /// Brand or primary product name
    pub name: String,
    /// International non-proprietary name (e.g., "acetaminophen")
    pub generic_name: Option<String>,
    /// Marketing authorisation holder
    pub manufacturer_name: Option<String>,
    /// Therapeutic category (e.g., "analgesic")
    pub category: String,
    /// Dosage form (e.g., "tablet", "oral suspension")
    pub dosage_form: String,
    /// Strength per unit dose
    pub strength: Option<Strength>,
    /// Conditions the medicine is indicated for
    pub indications: Vec<String>,
    /// Whether this medicine is currently listed
    pub active: bool,
}

/// Strength of a single dose unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strength {
    pub value: f64,
    pub unit: String,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl MedicineRecord {
    /// Create a new medicine record with required fields.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            generic_name: None,
            manufacturer_name: None,
            category: String::new(),
            dosage_form: String::new(),
            strength: None,
            indications: Vec::new(),
            active: true,
        }
    }

    /// A record with a blank name cannot be matched against.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(MedicineRecord::new("MED-1".into(), "Advil".into()).is_well_formed());
        assert!(!MedicineRecord::new("MED-1".into(), "  ".into()).is_well_formed());
        assert!(!MedicineRecord::new("".into(), "Advil".into()).is_well_formed());
    }

    #[test]
    fn test_strength_display() {
        let strength = Strength {
            value: 500.0,
            unit: "mg".into(),
        };
        assert_eq!(strength.to_string(), "500 mg");
    }
}
