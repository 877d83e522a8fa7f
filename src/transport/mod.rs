
// Everything above the transport speaks SCPI strings; everything below it (USB/GPIB/LAN framing,
// termination characters, resource managers) belongs to the VISA driver.

use std::time::Duration;

use crate::Result;

pub mod mock;
pub mod visa;

// Upper bound for a single text reply. SCPI answers on these scopes are a few dozen bytes.
pub const TEXT_READ_LIMIT:usize = 4096;

pub trait Transport {

    /// Send one command. Line termination is the transport's business.
    fn write(&mut self, command:&str) -> Result<()>;

    /// Read one textual reply with the trailing line terminator removed.
    fn read(&mut self) -> Result<String>;

    /// Read one raw reply of at most `max_len` bytes.
    fn read_bytes(&mut self, max_len:usize) -> Result<Vec<u8>>;

    /// Change the timeout applied to every subsequent read until changed again.
    fn set_timeout(&mut self, timeout:Duration) -> Result<()>;

}

pub(crate) fn strip_terminator(reply:&[u8]) -> String {
    String::from_utf8_lossy(reply).trim_end_matches(|c:char| c == '\n' || c == '\r').to_owned()
}
