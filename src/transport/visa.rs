//! VISA-backed transport.
//!
//! Built on `visa-rs`, which links against the system VISA library. The backend is only
//! compiled with the `visa` feature; without it [`VisaTransport::open`] reports
//! [`Error::VisaUnavailable`] so the rest of the crate (and its tests) builds anywhere.

#[cfg(not(feature = "visa"))]
use std::time::Duration;

#[cfg(not(feature = "visa"))]
use crate::transport::Transport;
#[cfg(not(feature = "visa"))]
use crate::{Error, Result};

#[cfg(feature = "visa")]
mod backend {

    use std::ffi::CString;
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use log::{debug, trace};
    use visa_rs::prelude::*;

    use crate::transport::{strip_terminator, Transport, TEXT_READ_LIMIT};
    use crate::{Error, Result};

    fn visa_err(e:visa_rs::Error) -> Error { Error::Visa(e.to_string()) }

    fn io_err(e:io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::TimedOut => Error::Timeout,
            _                       => Error::Io(e),
        }
    }

    pub struct VisaTransport {
        // Declared before `rm` so the instrument session closes before its resource manager
        instr: Instrument,
        _rm: DefaultRM,
        resource: String,
    }

    impl VisaTransport {

        pub fn open(resource:&str, timeout:Duration) -> Result<Self> {
            let rm = DefaultRM::new().map_err(visa_err)?;
            let name = CString::new(resource).map_err(|_| Error::Visa(format!("Resource string {:?} contains a NUL byte", resource)))?;
            let instr = rm.open(&name.into(), AccessMode::NO_LOCK, visa_rs::TIMEOUT_IMMEDIATE).map_err(visa_err)?;
            debug!("Opened VISA resource {}", resource);

            let mut ans = Self{ instr, _rm: rm, resource: resource.to_owned() };
            ans.set_timeout(timeout)?;
            Ok(ans)
        }

        pub fn resource(&self) -> &str { &self.resource }

    }

    impl Transport for VisaTransport {

        fn write(&mut self, command:&str) -> Result<()> {
            let mut line = String::with_capacity(command.len() + 1);
            line.push_str(command);
            line.push('\n');
            (&self.instr).write_all(line.as_bytes()).map_err(io_err)
        }

        fn read(&mut self) -> Result<String> {
            let reply = self.read_bytes(TEXT_READ_LIMIT)?;
            Ok(strip_terminator(&reply))
        }

        fn read_bytes(&mut self, max_len:usize) -> Result<Vec<u8>> {
            let mut buf:Vec<u8> = vec![0; max_len];
            let n:usize = (&self.instr).read(&mut buf).map_err(io_err)?;
            buf.truncate(n);
            trace!("Read {} bytes from {}", n, self.resource);
            Ok(buf)
        }

        fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
            let ms:u32 = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
            let attr = visa_rs::attribute::AttrTmoValue::new_checked(ms)
                .ok_or_else(|| Error::Visa(format!("Timeout of {} ms is out of range", ms)))?;
            self.instr.set_attr(attr).map_err(visa_err)
        }

    }

}

#[cfg(feature = "visa")]
pub use backend::VisaTransport;

#[cfg(not(feature = "visa"))]
pub struct VisaTransport {
    resource: String,
}

#[cfg(not(feature = "visa"))]
impl VisaTransport {

    pub fn open(resource:&str, _timeout:Duration) -> Result<Self> {
        log::error!("Cannot open {}: built without the `visa` feature", resource);
        Err(Error::VisaUnavailable)
    }

    pub fn resource(&self) -> &str { &self.resource }

}

#[cfg(not(feature = "visa"))]
impl Transport for VisaTransport {
    fn write(&mut self, _command:&str) -> Result<()>             { Err(Error::VisaUnavailable) }
    fn read(&mut self) -> Result<String>                         { Err(Error::VisaUnavailable) }
    fn read_bytes(&mut self, _max_len:usize) -> Result<Vec<u8>>  { Err(Error::VisaUnavailable) }
    fn set_timeout(&mut self, _timeout:Duration) -> Result<()>   { Err(Error::VisaUnavailable) }
}
