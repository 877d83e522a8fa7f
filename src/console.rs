//! Interactive command loop.
//!
//! One command per line:
//!
//! | input | action |
//! |-------|--------|
//! | `R`   | start acquisition |
//! | `S`   | stop acquisition |
//! | `G`   | stop, switch to RAW points, read channel 1, start again |
//! | `M`   | print the waveform point mode |
//! | `X`   | quit (case sensitive) |
//! | other | sent verbatim as SCPI, the reply is printed |
//!
//! The front panel is released after every command so the scope stays usable by hand.

use std::io::{BufRead, Write};
use std::time::Duration;

use log::debug;

use crate::config::{DEFAULT_PASSTHROUGH_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};
use crate::devices::ds1000e::{PointMode, DS1000E, MAX_WAVEFORM_READ};
use crate::transport::{strip_terminator, Transport};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow { Continue, Exit }

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Run,
    Stop,
    Grab,
    PointMode,
    Exit,
    Passthrough(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line:&'a str) -> Self {
        if line == "X"                          { Command::Exit }
        else if line.eq_ignore_ascii_case("R")  { Command::Run }
        else if line.eq_ignore_ascii_case("S")  { Command::Stop }
        else if line.eq_ignore_ascii_case("G")  { Command::Grab }
        else if line.eq_ignore_ascii_case("M")  { Command::PointMode }
        else { Command::Passthrough(line) }
    }
}

pub struct Console<T: Transport, R: BufRead, W: Write> {
    scope: DS1000E<T>,
    input: R,
    output: W,
    timeout: Duration,
    passthrough_timeout: Duration,
}

impl<T: Transport, R: BufRead, W: Write> Console<T, R, W> {

    pub fn new(scope:DS1000E<T>, input:R, output:W) -> Self {
        Self {
            scope,
            input,
            output,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            passthrough_timeout: Duration::from_millis(DEFAULT_PASSTHROUGH_TIMEOUT_MS),
        }
    }

    /// `timeout` is restored after every raw command, `passthrough_timeout` bounds the wait for its reply.
    pub fn with_timeouts(mut self, timeout:Duration, passthrough_timeout:Duration) -> Self {
        self.timeout = timeout;
        self.passthrough_timeout = passthrough_timeout;
        self
    }

    pub fn scope(&self) -> &DS1000E<T> { &self.scope }
    pub fn output(&self) -> &W { &self.output }

    /// Print the instrument identification and unlock the panel before taking commands.
    pub fn startup(&mut self) -> Result<()> {
        let idn:String = self.scope.ask("*IDN?")?;
        writeln!(self.output, "{}", idn)?;
        self.scope.release()
    }

    /// Process lines until `X` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                debug!("End of input");
                return Ok(());
            }

            let cmd:&str = line.trim_end_matches(|c:char| c == '\n' || c == '\r');
            if self.dispatch(cmd)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    pub fn dispatch(&mut self, line:&str) -> Result<Flow> {
        let cmd = Command::parse(line);
        debug!("Dispatching {:?}", cmd);

        if cmd == Command::Exit {
            writeln!(self.output, "Bye!")?;
            self.output.flush()?;
            return Ok(Flow::Exit);
        }

        let outcome = self.execute(cmd);
        let released = self.scope.release();
        self.output.flush()?;
        outcome.and(released).map(|_| Flow::Continue)
    }

    fn execute(&mut self, cmd:Command) -> Result<()> {
        match cmd {
            Command::Run => {
                self.scope.run()?;
                writeln!(self.output, "Running!")?;
            },
            Command::Stop => {
                writeln!(self.output, "Stop!")?;
                self.scope.stop()?;
            },
            Command::Grab => {
                writeln!(self.output, "Getting channel 1 data!")?;
                self.scope.stop()?;
                self.scope.set_point_mode(PointMode::Raw)?;
                let data:Vec<u8> = self.scope.get_channel_data(1)?;
                writeln!(self.output, "Read {} bytes", data.len())?;
                self.scope.run()?;
            },
            Command::PointMode => {
                let mode:Option<PointMode> = self.scope.get_point_mode()?;
                match mode {
                    Some(mode) => writeln!(self.output, "Point mode: {}", mode)?,
                    None       => writeln!(self.output, "Point mode: unknown")?,
                }
            },
            Command::Passthrough(raw) => self.passthrough(raw)?,
            Command::Exit => {},
        }
        Ok(())
    }

    // A raw command may have no reply at all, so a failed read is reported rather than fatal.
    // The read is sized for a full waveform so a typed :WAV:DATA? is drained in one go instead of
    // leaving the tail queued in front of the next reply.
    fn passthrough(&mut self, raw:&str) -> Result<()> {
        self.scope.write(raw)?;
        self.scope.set_timeout(self.passthrough_timeout)?;
        let reply = self.scope.read_bytes(MAX_WAVEFORM_READ);
        self.scope.set_timeout(self.timeout)?;

        match reply {
            Ok(reply) => writeln!(self.output, "{}", strip_terminator(&reply))?,
            Err(e)    => writeln!(self.output, "Error: {}", e)?,
        }
        Ok(())
    }

}
