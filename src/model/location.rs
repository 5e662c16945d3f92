use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a cartridge can physically be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TapeLocationType {
    Drive,
    Slot,
    /// Out of robotic reach (removed from the library or lost track of)
    Outside,
}

/// Physical location of a cartridge.
///
/// Two locations are equal iff they share the same type and index.
/// `Outside` never carries an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTapeLocation")]
pub struct TapeLocation {
    index: Option<u32>,
    #[serde(rename = "type")]
    location_type: TapeLocationType,
}

#[derive(Deserialize)]
struct RawTapeLocation {
    #[serde(default)]
    index: Option<u32>,
    #[serde(rename = "type")]
    location_type: TapeLocationType,
}

impl TryFrom<RawTapeLocation> for TapeLocation {
    type Error = String;

    fn try_from(raw: RawTapeLocation) -> Result<Self, Self::Error> {
        match (raw.location_type, raw.index) {
            (TapeLocationType::Drive, Some(i)) => Ok(Self::drive(i)),
            (TapeLocationType::Slot, Some(i)) => Ok(Self::slot(i)),
            (TapeLocationType::Outside, None) => Ok(Self::outside()),
            (TapeLocationType::Outside, Some(i)) => {
                Err(format!("OUTSIDE location cannot carry index {}", i))
            }
            (location_type, None) => Err(format!("{:?} location requires an index", location_type)),
        }
    }
}

impl TapeLocation {
    pub fn drive(index: u32) -> Self {
        Self {
            index: Some(index),
            location_type: TapeLocationType::Drive,
        }
    }

    pub fn slot(index: u32) -> Self {
        Self {
            index: Some(index),
            location_type: TapeLocationType::Slot,
        }
    }

    pub fn outside() -> Self {
        Self {
            index: None,
            location_type: TapeLocationType::Outside,
        }
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn location_type(&self) -> TapeLocationType {
        self.location_type
    }

    pub fn is_drive(&self) -> bool {
        self.location_type == TapeLocationType::Drive
    }

    /// Slot index when this location is a slot
    pub fn slot_index(&self) -> Option<u32> {
        match self.location_type {
            TapeLocationType::Slot => self.index,
            _ => None,
        }
    }
}

impl fmt::Display for TapeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match (self.location_type, self.index) {
            (TapeLocationType::Drive, Some(i)) => format!("DRIVE({})", i),
            (TapeLocationType::Slot, Some(i)) => format!("SLOT({})", i),
            _ => "OUTSIDE".to_string(),
        };
        f.pad(&text)
    }
}
