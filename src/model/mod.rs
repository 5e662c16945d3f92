//! Tape Library Data Model
//!
//! Plain values describing cartridges, where they are, the orders executed
//! against them and the outcome reported back to the order queue.

pub mod cartridge;
pub mod location;
pub mod order;
pub mod result;

pub use cartridge::{TapeCartridge, TapeCartridgeLabel, TapeState};
pub use location::{TapeLocation, TapeLocationType};
pub use order::{ReadOrder, WriteOrder};
pub use result::{QueueState, ReadWriteResult, StatusCode};
