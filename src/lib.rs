
// Error type shared by every layer of the crate
pub mod error;

// The byte pipe to the instrument: VISA in production, a scripted double in tests
pub mod transport;

// Instrument facades mapping named operations onto SCPI strings
pub mod devices;

// Line-oriented command loop driving a DS1000E from a terminal
pub mod console;

// Runtime configuration (resource string, timeouts, settle delay)
pub mod config;

pub mod utils;

pub use error::{Error, Result};
