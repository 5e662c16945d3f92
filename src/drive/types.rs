use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one physical command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeResponse {
    ok: bool,
    message: Option<String>,
}

impl TapeResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn ko<T: Into<String>>(message: T) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

impl fmt::Display for TapeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ok, &self.message) {
            (true, _) => write!(f, "OK"),
            (false, Some(m)) => write!(f, "KO: {}", m),
            (false, None) => write!(f, "KO"),
        }
    }
}

/// Flags reported by `mt status`-style queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveStatus {
    Online,
    /// Door open, no cartridge
    DrOpen,
    /// Beginning of tape
    Bot,
    Eof,
    /// End of data
    Eod,
    /// End of tape
    Eot,
    WrProt,
    ImRepEn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeDriveState {
    pub response: TapeResponse,
    pub drive_statuses: Vec<DriveStatus>,
    /// Cartridge type or volume tag reported by the drive
    pub cartridge: Option<String>,
    pub file_number: Option<u32>,
    pub description: Option<String>,
}

impl TapeDriveState {
    pub fn failed<T: Into<String>>(message: T) -> Self {
        Self {
            response: TapeResponse::ko(message),
            drive_statuses: Vec::new(),
            cartridge: None,
            file_number: None,
            description: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response.is_ok()
    }

    pub fn drive_has_tape(&self) -> bool {
        self.drive_statuses.contains(&DriveStatus::Online)
    }

    pub fn is_end_of_tape(&self) -> bool {
        self.drive_statuses.contains(&DriveStatus::Eot)
    }

    pub fn is_write_protected(&self) -> bool {
        self.drive_statuses.contains(&DriveStatus::WrProt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Backward,
}

/// Data-path tool used to stream files to and from the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadWriteCmd {
    #[default]
    Dd,
    Tar,
}
