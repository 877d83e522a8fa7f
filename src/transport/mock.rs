//! Scripted stand-in for an instrument session.
//!
//! Replies are queued up front and handed out in order; every call made through the
//! [`Transport`] trait is recorded so tests can assert on the exact exchange. An empty
//! reply queue behaves like an instrument that never answers: the read fails with
//! [`Error::Timeout`].

use std::collections::VecDeque;
use std::time::Duration;

use crate::transport::{strip_terminator, Transport};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Write(String),
    Read,
    ReadBytes(usize),
    SetTimeout(Duration),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    replies: VecDeque<Vec<u8>>,
    calls: Vec<Call>,
    timeout: Option<Duration>,
}

impl MockTransport {

    pub fn new() -> Self { Self::default() }

    /// Queue a reply for the next read of either kind.
    pub fn push_reply<B: Into<Vec<u8>>>(&mut self, reply:B) -> &mut Self {
        self.replies.push_back(reply.into());
        self
    }

    pub fn with_reply<B: Into<Vec<u8>>>(mut self, reply:B) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn calls(&self) -> &[Call] { &self.calls }

    /// Commands written so far, in order.
    pub fn writes(&self) -> Vec<&str> {
        self.calls.iter().filter_map(|c| match c {
            Call::Write(cmd) => Some(cmd.as_str()),
            _                => None,
        }).collect()
    }

    pub fn timeout(&self) -> Option<Duration> { self.timeout }

    pub fn pending_replies(&self) -> usize { self.replies.len() }

}

impl Transport for MockTransport {

    fn write(&mut self, command:&str) -> Result<()> {
        self.calls.push(Call::Write(command.to_owned()));
        Ok(())
    }

    fn read(&mut self) -> Result<String> {
        self.calls.push(Call::Read);
        let reply = self.replies.pop_front().ok_or(Error::Timeout)?;
        Ok(strip_terminator(&reply))
    }

    fn read_bytes(&mut self, max_len:usize) -> Result<Vec<u8>> {
        self.calls.push(Call::ReadBytes(max_len));
        let mut reply = self.replies.pop_front().ok_or(Error::Timeout)?;
        reply.truncate(max_len);
        Ok(reply)
    }

    fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
        self.calls.push(Call::SetTimeout(timeout));
        self.timeout = Some(timeout);
        Ok(())
    }

}
