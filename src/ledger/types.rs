use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two physical stock locations the station dispenses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockLocation {
    #[serde(rename = "A")]
    AreaA,
    #[serde(rename = "B")]
    AreaB,
}

impl StockLocation {
    pub const ALL: [StockLocation; 2] = [StockLocation::AreaA, StockLocation::AreaB];

    pub fn code(&self) -> &'static str {
        match self {
            StockLocation::AreaA => "A",
            StockLocation::AreaB => "B",
        }
    }

    pub fn other(&self) -> StockLocation {
        match self {
            StockLocation::AreaA => StockLocation::AreaB,
            StockLocation::AreaB => StockLocation::AreaA,
        }
    }
}

impl fmt::Display for StockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StockLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(StockLocation::AreaA),
            "B" => Ok(StockLocation::AreaB),
            other => Err(format!("unknown stock location '{other}' (expected A or B)")),
        }
    }
}

/// A medication tracked by the station.
///
/// Stock is held independently at the two locations; `min_threshold` is the
/// dispensing guard. Medications are never deleted, only zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub stock_area_a: u32,
    pub stock_area_b: u32,
    pub min_threshold: u32,
}

impl Medication {
    pub fn stock_at(&self, location: StockLocation) -> u32 {
        match location {
            StockLocation::AreaA => self.stock_area_a,
            StockLocation::AreaB => self.stock_area_b,
        }
    }

    pub fn set_stock(&mut self, location: StockLocation, value: u32) {
        match location {
            StockLocation::AreaA => self.stock_area_a = value,
            StockLocation::AreaB => self.stock_area_b = value,
        }
    }

    pub fn total_stock(&self) -> u32 {
        self.stock_area_a + self.stock_area_b
    }

    /// Low-stock warning: any location at or below the threshold.
    pub fn is_low(&self) -> bool {
        self.stock_area_a <= self.min_threshold || self.stock_area_b <= self.min_threshold
    }
}

/// Input for registering a new medication.
#[derive(Debug, Clone)]
pub struct NewMedication {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub stock_area_a: u32,
    pub stock_area_b: u32,
    pub min_threshold: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_round_trips_through_code() {
        for loc in StockLocation::ALL {
            assert_eq!(loc.code().parse::<StockLocation>().unwrap(), loc);
        }
        assert!("C".parse::<StockLocation>().is_err());
        assert_eq!("b".parse::<StockLocation>().unwrap(), StockLocation::AreaB);
    }

    #[test]
    fn stock_accessors_track_locations_independently() {
        let mut med = Medication {
            id: "PARA500".to_string(),
            name: "Paracetamol 500mg".to_string(),
            unit: "pill".to_string(),
            stock_area_a: 10,
            stock_area_b: 5,
            min_threshold: 3,
        };
        assert_eq!(med.stock_at(StockLocation::AreaA), 10);
        assert_eq!(med.total_stock(), 15);
        med.set_stock(StockLocation::AreaA, 0);
        assert_eq!(med.stock_at(StockLocation::AreaA), 0);
        assert_eq!(med.stock_at(StockLocation::AreaB), 5);
        assert!(med.is_low());
    }
}
