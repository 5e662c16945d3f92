use super::location::TapeLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a cartridge's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TapeState {
    /// Never written, no label yet
    Empty,
    /// Labeled, accepting appends
    Open,
    /// End of tape reached
    Full,
    /// Physical content disagrees with the catalog, needs an operator
    Conflict,
}

/// Label written once as file 0 of a cartridge the first time it is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeCartridgeLabel {
    pub id: String,
    pub code: String,
    pub bucket: Option<String>,
    #[serde(rename = "type")]
    pub cartridge_type: Option<String>,
}

/// Catalog entry for one physical cartridge.
///
/// Created once at registration, then only mutated by read and write tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeCartridge {
    pub id: String,
    pub code: String,
    pub library: String,
    pub bucket: Option<String>,
    pub state: TapeState,
    pub current_location: TapeLocation,
    pub previous_location: Option<TapeLocation>,
    /// File-mark offset of the drive head on this medium
    pub current_position: u32,
    pub file_count: u32,
    pub written_bytes: u64,
    pub label: Option<TapeCartridgeLabel>,
    pub cartridge_type: Option<String>,
    pub worm: bool,
}

impl TapeCartridge {
    pub fn new(code: &str, library: &str, location: TapeLocation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            library: library.to_string(),
            bucket: None,
            state: TapeState::Empty,
            current_location: location,
            previous_location: None,
            current_position: 0,
            file_count: 0,
            written_bytes: 0,
            label: None,
            cartridge_type: None,
            worm: false,
        }
    }

    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    pub fn with_state(mut self, state: TapeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_previous_location(mut self, location: TapeLocation) -> Self {
        self.previous_location = Some(location);
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.current_position = position;
        self
    }

    /// Record a move: the old current location becomes the previous one
    pub fn move_to(&mut self, location: TapeLocation) {
        self.previous_location = Some(self.current_location);
        self.current_location = location;
    }

    /// Label describing this cartridge as it is now
    pub fn build_label(&self) -> TapeCartridgeLabel {
        TapeCartridgeLabel {
            id: self.id.clone(),
            code: self.code.clone(),
            bucket: self.bucket.clone(),
            cartridge_type: self.cartridge_type.clone(),
        }
    }

    pub fn is_mounted_in(&self, drive_index: u32) -> bool {
        self.current_location == TapeLocation::drive(drive_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_keeps_previous_location() {
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::slot(1));
        tape.move_to(TapeLocation::drive(0));

        assert_eq!(tape.current_location, TapeLocation::drive(0));
        assert_eq!(tape.previous_location, Some(TapeLocation::slot(1)));
        assert!(tape.is_mounted_in(0));
        assert!(!tape.is_mounted_in(1));
    }

    #[test]
    fn test_label_mirrors_cartridge() {
        let tape = TapeCartridge::new("T1", "LIB", TapeLocation::slot(1)).with_bucket("bucket-a");
        let label = tape.build_label();

        assert_eq!(label.id, tape.id);
        assert_eq!(label.code, "T1");
        assert_eq!(label.bucket.as_deref(), Some("bucket-a"));
    }
}
