
use lazy_static::lazy_static;
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::{Error, Result};

lazy_static! {
    static ref IDN_RE: Regex = Regex::new("^\\s*([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

// Reply to *IDN?, e.g. "RIGOL TECHNOLOGIES,DS1102E,DS1ET164267347,00.04.01.00.02"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial_num: String,
    pub fw_version: String,
}

fn match_str(opt_match:Option<Match>) -> String {
    opt_match.map(|m| m.as_str().trim().to_owned()).unwrap_or_default()
}

pub fn parse_idn(reply:&str) -> Result<Identity> {
    let caps:Captures = IDN_RE.captures(reply)
        .ok_or_else(|| Error::Parse{ command: "*IDN?".to_owned(), reply: reply.to_owned() })?;

    Ok(Identity {
        manufacturer: match_str(caps.get(1)),
        model:        match_str(caps.get(2)),
        serial_num:   match_str(caps.get(3)),
        fw_version:   match_str(caps.get(4)),
    })
}
