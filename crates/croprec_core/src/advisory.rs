//! Static agronomic reference text per crop

use serde::Serialize;
use std::collections::BTreeMap;

/// Substituted when a crop has no catalog entry
pub const ADVISORY_PLACEHOLDER: &str = "No details available.";

/// Expected economics of growing a crop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CropEconomics {
    pub expected_yield: String,
    pub market_price: String,
    pub profit_potential: String,
}

/// Reference entry for one crop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryNote {
    pub summary: String,
    pub economics: Option<CropEconomics>,
}

impl AdvisoryNote {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            economics: None,
        }
    }

    pub fn with_economics(mut self, expected_yield: &str, market_price: &str, profit: &str) -> Self {
        self.economics = Some(CropEconomics {
            expected_yield: expected_yield.to_string(),
            market_price: market_price.to_string(),
            profit_potential: profit.to_string(),
        });
        self
    }

    fn placeholder() -> Self {
        Self::new(ADVISORY_PLACEHOLDER)
    }
}

/// Advisory notes keyed by crop label
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdvisoryCatalog {
    notes: BTreeMap<String, AdvisoryNote>,
}

impl AdvisoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes for the crops of the Kerala table
    pub fn kerala() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            "Rice",
            AdvisoryNote::new(
                "Grows best in clay or alluvial soil with high rainfall. \
                 Requires standing water and warm temperatures.",
            )
            .with_economics("2500-3000 kg/acre", "₹20-25/kg", "Medium"),
        );
        catalog.insert(
            "Banana",
            AdvisoryNote::new(
                "Thrives in loamy soil with moderate rainfall. \
                 Needs irrigation and rich organic matter.",
            )
            .with_economics("10,000-12,000 kg/acre", "₹10-15/kg", "High"),
        );
        catalog.insert(
            "Pepper",
            AdvisoryNote::new(
                "Prefers sandy or loamy soil with good drainage. \
                 Needs warm climate and partial shade.",
            )
            .with_economics("400-600 kg/acre", "₹350-450/kg", "Very High"),
        );
        catalog.insert(
            "Coconut",
            AdvisoryNote::new(
                "Grows in sandy coastal or laterite soil. \
                 Requires high humidity and plenty of sunlight.",
            )
            .with_economics("8000-10,000 nuts/acre", "₹12-20/nut", "High"),
        );
        catalog.insert(
            "Mango",
            AdvisoryNote::new(
                "Prefers alluvial or laterite soil. \
                 Grows best in tropical climate with dry spells before flowering.",
            )
            .with_economics("2000-2500 kg/acre", "₹40-60/kg", "High"),
        );
        catalog.insert(
            "Tapioca",
            AdvisoryNote::new(
                "Drought tolerant, grows in sandy-loam soil, and requires minimal rainfall.",
            )
            .with_economics("6000-8000 kg/acre", "₹8-12/kg", "Medium"),
        );
        catalog
    }

    /// Add or replace the note for `crop`
    pub fn insert(&mut self, crop: &str, note: AdvisoryNote) {
        self.notes.insert(crop.to_string(), note);
    }

    pub fn get(&self, crop: &str) -> Option<&AdvisoryNote> {
        self.notes.get(crop)
    }

    /// Note for `crop`, or the placeholder note when the catalog has none
    pub fn note_for(&self, crop: &str) -> AdvisoryNote {
        self.notes
            .get(crop)
            .cloned()
            .unwrap_or_else(AdvisoryNote::placeholder)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
