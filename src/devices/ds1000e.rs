
use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};

use crate::transport::Transport;
use crate::utils::{parse_idn, Identity};
use crate::{Error, Result};

pub const DEFAULT_SETTLE_DELAY_MS:u64 = 100;

// Largest :WAV:DATA? reply the scope produces (1M points plus the 10 byte block header)
pub const MAX_WAVEFORM_PAYLOAD:usize = 1_048_586;
pub const MAX_WAVEFORM_READ:usize    = 2_000_000;

pub struct DS1000E<T: Transport> {
	core: T,
	settle_delay: Duration,
}

/// Number of samples returned per channel by `:WAV:DATA?`.
///
/// - `Normal`: 600 points for channels, math and digital, 512 for FFT.
/// - `Raw`: 8K points per channel with normal memory, 512K with long memory; half-channel and
///   digital sources get 16K and 1M respectively. Math and FFT are the same as `Normal`.
/// - `Max`: behaves as `Normal` while running and as `Raw` while stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointMode { Raw, Normal, Max }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryDepth { Long, Normal }

#[derive(Debug, Serialize, Deserialize)]
pub struct State {
	pub identity: Identity,
	pub point_mode: Option<PointMode>,
	pub memory_depth: Option<MemoryDepth>,
	pub time_scale: f64,
	pub time_offset: f64,
	pub trigger_level: f64,
	pub ch1: ChannelState,
	pub ch2: ChannelState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelState {
	pub voltage_offset: f64,
	pub voltage_scale: f64,
	pub probe_attenuation: u32,
}

impl PointMode {

	pub fn token(self) -> &'static str {
		match self {
			PointMode::Raw    => "RAW",
			PointMode::Normal => "NORMAL",
			PointMode::Max    => "MAX",
		}
	}

	// The scope accepts MAX but reports MAXIMUM
	pub fn from_reply(reply:&str) -> Option<Self> {
		let reply = reply.trim();
		if reply.eq_ignore_ascii_case("RAW")          { Some(PointMode::Raw) }
		else if reply.eq_ignore_ascii_case("NORMAL")  { Some(PointMode::Normal) }
		else if reply.eq_ignore_ascii_case("MAXIMUM") { Some(PointMode::Max) }
		else { None }
	}

}

impl fmt::Display for PointMode {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.token()) }
}

impl MemoryDepth {

	pub fn token(self) -> &'static str {
		match self {
			MemoryDepth::Long   => "LONG",
			MemoryDepth::Normal => "NORMAL",
		}
	}

	pub fn from_reply(reply:&str) -> Option<Self> {
		match reply.trim() {
			"LONG"   => Some(MemoryDepth::Long),
			"NORMAL" => Some(MemoryDepth::Normal),
			_        => None,
		}
	}

}

impl fmt::Display for MemoryDepth {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.token()) }
}

// Waveform reads fall back to channel 1 instead of failing
fn data_channel(n:u8) -> u8 {
	if n == 1 || n == 2 { n }
	else {
		debug!("Channel {} has no waveform data, reading channel 1 instead", n);
		1
	}
}

fn parse_err(command:&str, reply:&str) -> Error {
	Error::Parse{ command: command.to_owned(), reply: reply.to_owned() }
}

// `f64::from_str` also takes "inf" and "NaN", neither of which the scope reports as a setting
fn parse_f64(command:&str, reply:&str) -> Result<f64> {
	match reply.trim().parse::<f64>() {
		Ok(x) if x.is_finite() => Ok(x),
		_                      => Err(parse_err(command, reply)),
	}
}

impl<T: Transport> DS1000E<T> {

	pub fn new(core:T) -> Self {
		Self{ core, settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS) }
	}

	/// How long `stop` waits after `:STOP` before returning. The scope rejects commands that
	/// arrive while it is still halting, so this should stay at 100 ms or more on real hardware.
	pub fn with_settle_delay(mut self, settle_delay:Duration) -> Self {
		self.settle_delay = settle_delay;
		self
	}

	pub fn settle_delay(&self) -> Duration { self.settle_delay }

	pub fn transport(&self) -> &T { &self.core }

	pub fn write(&mut self, command:&str) -> Result<()> {
		trace!("> {}", command);
		self.core.write(command)
	}

	pub fn read(&mut self) -> Result<String> {
		let reply:String = self.core.read()?;
		trace!("< {}", reply);
		Ok(reply)
	}

	pub fn read_bytes(&mut self, max_len:usize) -> Result<Vec<u8>> {
		let reply:Vec<u8> = self.core.read_bytes(max_len)?;
		trace!("< {} bytes", reply.len());
		Ok(reply)
	}

	pub fn ask(&mut self, command:&str) -> Result<String> {
		self.write(command)?;
		self.read()
	}

	pub fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
		debug!("Read timeout set to {:?}", timeout);
		self.core.set_timeout(timeout)
	}

	fn ask_f64(&mut self, command:&str) -> Result<f64> {
		let reply:String = self.ask(command)?;
		parse_f64(command, &reply)
	}

	pub fn identify(&mut self) -> Result<Identity> {
		let reply:String = self.ask("*IDN?")?;
		parse_idn(&reply)
	}

	pub fn stop(&mut self) -> Result<()> {
		self.write(":STOP")?;
		thread::sleep(self.settle_delay);
		Ok(())
	}

	// One-liners
	pub fn run(&mut self)           -> Result<()> { self.write(":RUN") }
	pub fn force_trigger(&mut self) -> Result<()> { self.write(":KEY:FORCE") }

	/// Hand the front panel back to the user. While "Rmt" is shown every key stays locked until
	/// force trigger is pressed, so the panel is released by sending exactly that key.
	pub fn release(&mut self) -> Result<()> { self.force_trigger() }

	pub fn set_point_mode(&mut self, mode:PointMode) -> Result<()> {
		self.write(&format!(":WAV:POIN:MODE {}", mode.token()))
	}

	/// `Ok(None)` when the scope answers with something other than RAW, NORMAL or MAXIMUM.
	pub fn get_point_mode(&mut self) -> Result<Option<PointMode>> {
		let reply:String = self.ask(":WAV:POIN:MODE?")?;
		let ans = PointMode::from_reply(&reply);
		if ans.is_none() { warn!("Unrecognized point mode reply {:?}", reply); }
		Ok(ans)
	}

	/// Raw reply to `:WAV:DATA?`, block header included. Channels other than 1 and 2 read channel 1.
	pub fn get_channel_data(&mut self, chan_num:u8) -> Result<Vec<u8>> {
		let cmd:String = format!(":WAV:DATA? CHAN{}", data_channel(chan_num));
		self.write(&cmd)?;

		let data:Vec<u8> = self.read_bytes(MAX_WAVEFORM_READ)?;
		debug!("{} returned {} bytes", cmd, data.len());
		Ok(data)
	}

	/// Seconds per division, e.g. "50ns", "2s", "100us". Passed to the scope unchecked.
	pub fn set_time_scale(&mut self, scale:&str) -> Result<()> { self.write(&format!(":TIM:SCAL {}", scale)) }
	pub fn get_time_scale(&mut self) -> Result<f64>            { self.ask_f64(":TIM:SCAL?") }

	pub fn set_time_offset(&mut self, offset:&str) -> Result<()> { self.write(&format!(":TIM:OFFS {}", offset)) }
	pub fn get_time_offset(&mut self) -> Result<f64>             { self.ask_f64(":TIM:OFFS?") }

	/// Vertical offset, e.g. "50mV", "1V".
	pub fn set_voltage_offset(&mut self, chan_num:u8, offset:&str) -> Result<()> {
		self.write(&format!(":CHAN{}:OFFS {}", chan_num, offset))
	}

	pub fn get_voltage_offset(&mut self, chan_num:u8) -> Result<f64> {
		self.ask_f64(&format!(":CHAN{}:OFFS?", chan_num))
	}

	/// Volts per division. The accepted range follows the probe attenuation:
	///
	/// | probe | range        |
	/// |-------|--------------|
	/// | 1X    | 2mV ~ 10V    |
	/// | 5X    | 10mV ~ 50V   |
	/// | 10X   | 20mV ~ 100V  |
	/// | 50X   | 100mV ~ 500V |
	/// | 100X  | 200mV ~ 1000V|
	/// | 500X  | 1V ~ 5000V   |
	/// | 1000X | 2V ~ 10000V  |
	///
	/// Out of range values are left for the scope to reject.
	pub fn set_voltage_scale(&mut self, chan_num:u8, scale:&str) -> Result<()> {
		self.write(&format!(":CHAN{}:SCAL {}", chan_num, scale))
	}

	pub fn get_voltage_scale(&mut self, chan_num:u8) -> Result<f64> {
		self.ask_f64(&format!(":CHAN{}:SCAL?", chan_num))
	}

	/// The firmware accepts 1, 5, 10, 50, 100, 500 and 1000.
	pub fn set_probe_attenuation(&mut self, chan_num:u8, attenuation:u32) -> Result<()> {
		self.write(&format!(":CHAN{}:PROB {}", chan_num, attenuation))
	}

	// Reported as a float ("1.000e+01"), truncated toward zero
	pub fn get_probe_attenuation(&mut self, chan_num:u8) -> Result<u32> {
		let cmd:String   = format!(":CHAN{}:PROB?", chan_num);
		let reply:String = self.ask(&cmd)?;
		let ans:f64      = parse_f64(&cmd, &reply)?.trunc();
		if ans < 1.0 || ans > f64::from(u32::MAX) {
			return Err(parse_err(&cmd, &reply));
		}
		Ok(ans as u32)
	}

	pub fn set_memory_depth(&mut self, depth:MemoryDepth) -> Result<()> {
		self.write(&format!(":ACQ:MEMD {}", depth.token()))
	}

	/// `Ok(None)` when the reply is neither LONG nor NORMAL.
	pub fn get_memory_depth(&mut self) -> Result<Option<MemoryDepth>> {
		let reply:String = self.ask(":ACQ:MEMD?")?;
		let ans = MemoryDepth::from_reply(&reply);
		if ans.is_none() { warn!("Unrecognized memory depth reply {:?}", reply); }
		Ok(ans)
	}

	/// Edge trigger level, e.g. "500mV". Valid between -6 and +6 times the voltage scale.
	pub fn set_trigger_level(&mut self, level:&str) -> Result<()> { self.write(&format!(":TRIG:EDGE:LEV {}", level)) }
	pub fn get_trigger_level(&mut self) -> Result<f64>            { self.ask_f64(":TRIG:EDGE:LEV?") }

	pub fn get_channel_state(&mut self, chan_num:u8) -> Result<ChannelState> {
		let voltage_offset:f64    = self.get_voltage_offset(chan_num)?;
		let voltage_scale:f64     = self.get_voltage_scale(chan_num)?;
		let probe_attenuation:u32 = self.get_probe_attenuation(chan_num)?;

		Ok(ChannelState{ voltage_offset, voltage_scale, probe_attenuation })
	}

	pub fn get_full_state(&mut self) -> Result<State> {
		let identity:Identity                 = self.identify()?;
		let point_mode:Option<PointMode>      = self.get_point_mode()?;
		let memory_depth:Option<MemoryDepth>  = self.get_memory_depth()?;
		let time_scale:f64                    = self.get_time_scale()?;
		let time_offset:f64                   = self.get_time_offset()?;
		let trigger_level:f64                 = self.get_trigger_level()?;

		let ch1 = self.get_channel_state(1)?;
		let ch2 = self.get_channel_state(2)?;

		Ok(State{ identity, point_mode, memory_depth, time_scale, time_offset, trigger_level, ch1, ch2 })
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::mock::{Call, MockTransport};

	fn scope(t:MockTransport) -> DS1000E<MockTransport> {
		DS1000E::new(t).with_settle_delay(Duration::ZERO)
	}

	#[test]
	fn point_mode_round_trips_through_device_tokens() {
		for (mode, device_token) in [(PointMode::Raw, "RAW"), (PointMode::Normal, "NORMAL"), (PointMode::Max, "MAXIMUM")] {
			let mut dev = scope(MockTransport::new().with_reply(format!("{}\n", device_token)));
			dev.set_point_mode(mode).unwrap();
			assert_eq!(dev.get_point_mode().unwrap(), Some(mode));
			assert_eq!(dev.transport().writes(), vec![format!(":WAV:POIN:MODE {}", mode.token()).as_str(), ":WAV:POIN:MODE?"]);
		}
	}

	#[test]
	fn point_mode_reply_is_case_insensitive() {
		let mut dev = scope(MockTransport::new().with_reply("maximum"));
		assert_eq!(dev.get_point_mode().unwrap(), Some(PointMode::Max));
	}

	#[test]
	fn set_point_mode_max_sends_max_not_maximum() {
		let mut dev = scope(MockTransport::new());
		dev.set_point_mode(PointMode::Max).unwrap();
		assert_eq!(dev.transport().writes(), vec![":WAV:POIN:MODE MAX"]);
	}

	#[test]
	fn unknown_point_mode_is_none() {
		let mut dev = scope(MockTransport::new().with_reply("MAX"));
		assert_eq!(dev.get_point_mode().unwrap(), None);
	}

	#[test]
	fn memory_depth_exact_match_or_none() {
		let mut dev = scope(MockTransport::new().with_reply("LONG").with_reply("NORMAL\n").with_reply("long").with_reply("DEEP"));
		assert_eq!(dev.get_memory_depth().unwrap(), Some(MemoryDepth::Long));
		assert_eq!(dev.get_memory_depth().unwrap(), Some(MemoryDepth::Normal));
		assert_eq!(dev.get_memory_depth().unwrap(), None);
		assert_eq!(dev.get_memory_depth().unwrap(), None);
	}

	#[test]
	fn set_memory_depth_uses_token() {
		let mut dev = scope(MockTransport::new());
		dev.set_memory_depth(MemoryDepth::Long).unwrap();
		dev.set_memory_depth(MemoryDepth::Normal).unwrap();
		assert_eq!(dev.transport().writes(), vec![":ACQ:MEMD LONG", ":ACQ:MEMD NORMAL"]);
	}

	#[test]
	fn channel_data_is_capped_and_unmodified() {
		for len in [0usize, 1, 600, MAX_WAVEFORM_PAYLOAD] {
			let payload:Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
			let mut dev = scope(MockTransport::new().with_reply(payload.clone()));
			assert_eq!(dev.get_channel_data(2).unwrap(), payload);
			assert_eq!(dev.transport().calls(), &[Call::Write(":WAV:DATA? CHAN2".into()), Call::ReadBytes(MAX_WAVEFORM_READ)]);
		}
		assert!(MAX_WAVEFORM_READ > MAX_WAVEFORM_PAYLOAD);
	}

	#[test]
	fn invalid_data_channel_reads_channel_one() {
		for chan in [0u8, 3, 255] {
			let mut dev = scope(MockTransport::new().with_reply(vec![1u8, 2, 3]));
			dev.get_channel_data(chan).unwrap();
			assert_eq!(dev.transport().writes(), vec![":WAV:DATA? CHAN1"]);
		}
	}

	#[test]
	fn scalar_getters_parse_exact_values() {
		let mut dev = scope(MockTransport::new()
			.with_reply("5.000e-08\n")
			.with_reply("-1.5e-03")
			.with_reply("0.25")
			.with_reply("2.000e+00")
			.with_reply(" -3.2 "));

		assert_eq!(dev.get_time_scale().unwrap(), 5.0e-8);
		assert_eq!(dev.get_time_offset().unwrap(), -1.5e-3);
		assert_eq!(dev.get_voltage_offset(1).unwrap(), 0.25);
		assert_eq!(dev.get_voltage_scale(2).unwrap(), 2.0);
		assert_eq!(dev.get_trigger_level().unwrap(), -3.2);

		assert_eq!(dev.transport().writes(), vec![":TIM:SCAL?", ":TIM:OFFS?", ":CHAN1:OFFS?", ":CHAN2:SCAL?", ":TRIG:EDGE:LEV?"]);
	}

	#[test]
	fn non_numeric_reply_is_a_parse_error() {
		let mut dev = scope(MockTransport::new().with_reply("ERROR"));
		match dev.get_time_scale() {
			Err(Error::Parse{ command, reply }) => {
				assert_eq!(command, ":TIM:SCAL?");
				assert_eq!(reply, "ERROR");
			},
			other => panic!("unexpected {:?}", other),
		}

		let getters:[fn(&mut DS1000E<MockTransport>) -> Result<f64>; 2] = [DS1000E::get_time_offset, DS1000E::get_trigger_level];
		for getter in getters {
			let mut dev = scope(MockTransport::new().with_reply("1,5V"));
			assert!(matches!(getter(&mut dev), Err(Error::Parse{ .. })));
		}
	}

	#[test]
	fn probe_attenuation_truncates() {
		let mut dev = scope(MockTransport::new().with_reply("10.0").with_reply("10.9").with_reply("1.000e+03"));
		assert_eq!(dev.get_probe_attenuation(1).unwrap(), 10);
		assert_eq!(dev.get_probe_attenuation(1).unwrap(), 10);
		assert_eq!(dev.get_probe_attenuation(2).unwrap(), 1000);
	}

	#[test]
	fn non_finite_words_are_not_numbers() {
		for reply in ["inf", "-infinity", "NaN", "nan\n"] {
			let mut dev = scope(MockTransport::new().with_reply(reply));
			assert!(matches!(dev.get_time_scale(), Err(Error::Parse{ .. })), "time scale accepted {:?}", reply);

			let mut dev = scope(MockTransport::new().with_reply(reply));
			assert!(matches!(dev.get_probe_attenuation(1), Err(Error::Parse{ .. })), "probe accepted {:?}", reply);
		}
	}

	#[test]
	fn probe_attenuation_out_of_range_is_a_parse_error() {
		for reply in ["-10", "-10.0", "0.5", "1e12"] {
			let mut dev = scope(MockTransport::new().with_reply(reply));
			match dev.get_probe_attenuation(2) {
				Err(Error::Parse{ command, .. }) => assert_eq!(command, ":CHAN2:PROB?"),
				other => panic!("{:?} gave {:?}", reply, other),
			}
		}

		// A negative offset is still a legal scalar
		let mut dev = scope(MockTransport::new().with_reply("-10"));
		assert_eq!(dev.get_voltage_offset(1).unwrap(), -10.0);
	}

	#[test]
	fn setters_pass_values_through_verbatim() {
		let mut dev = scope(MockTransport::new());
		dev.set_time_scale("50ns").unwrap();
		dev.set_time_offset("2s").unwrap();
		dev.set_voltage_offset(1, "500mV").unwrap();
		dev.set_voltage_scale(2, "not-a-voltage").unwrap();
		dev.set_probe_attenuation(1, 10).unwrap();
		dev.set_trigger_level("1V").unwrap();

		assert_eq!(dev.transport().writes(), vec![
			":TIM:SCAL 50ns",
			":TIM:OFFS 2s",
			":CHAN1:OFFS 500mV",
			":CHAN2:SCAL not-a-voltage",
			":CHAN1:PROB 10",
			":TRIG:EDGE:LEV 1V",
		]);
	}

	#[test]
	fn run_stop_and_release_commands() {
		let mut dev = scope(MockTransport::new());
		dev.run().unwrap();
		dev.stop().unwrap();
		dev.force_trigger().unwrap();
		dev.release().unwrap();
		assert_eq!(dev.transport().writes(), vec![":RUN", ":STOP", ":KEY:FORCE", ":KEY:FORCE"]);
	}

	#[test]
	fn stop_waits_for_the_settle_delay() {
		let mut dev = DS1000E::new(MockTransport::new()).with_settle_delay(Duration::from_millis(20));
		let start = std::time::Instant::now();
		dev.stop().unwrap();
		assert!(start.elapsed() >= Duration::from_millis(20));
		assert_eq!(DS1000E::new(MockTransport::new()).settle_delay(), Duration::from_millis(DEFAULT_SETTLE_DELAY_MS));
	}

	#[test]
	fn getters_propagate_transport_failures() {
		let mut dev = scope(MockTransport::new());
		assert!(matches!(dev.get_point_mode(), Err(Error::Timeout)));
		assert!(matches!(dev.get_channel_data(1), Err(Error::Timeout)));
	}

	#[test]
	fn full_state_queries_every_setting() {
		let mut t = MockTransport::new();
		t.push_reply("RIGOL TECHNOLOGIES,DS1102E,DS1ET164267347,00.04.01.00.02")
			.push_reply("NORMAL")
			.push_reply("LONG")
			.push_reply("1.000e-03")
			.push_reply("0.000e+00")
			.push_reply("1.2")
			.push_reply("0.0").push_reply("1.0").push_reply("10.0")
			.push_reply("-0.5").push_reply("0.2").push_reply("1.0");

		let mut dev = scope(t);
		let state = dev.get_full_state().unwrap();

		assert_eq!(state.identity.model, "DS1102E");
		assert_eq!(state.point_mode, Some(PointMode::Normal));
		assert_eq!(state.memory_depth, Some(MemoryDepth::Long));
		assert_eq!(state.time_scale, 1.0e-3);
		assert_eq!(state.trigger_level, 1.2);
		assert_eq!(state.ch1.probe_attenuation, 10);
		assert_eq!(state.ch2.voltage_offset, -0.5);
		assert_eq!(dev.transport().pending_replies(), 0);
		assert_eq!(dev.transport().writes(), vec![
			"*IDN?", ":WAV:POIN:MODE?", ":ACQ:MEMD?", ":TIM:SCAL?", ":TIM:OFFS?", ":TRIG:EDGE:LEV?",
			":CHAN1:OFFS?", ":CHAN1:SCAL?", ":CHAN1:PROB?",
			":CHAN2:OFFS?", ":CHAN2:SCAL?", ":CHAN2:PROB?",
		]);

		let json = serde_json::to_value(&state).unwrap();
		assert_eq!(json["point_mode"], "Normal");
		assert_eq!(json["ch1"]["probe_attenuation"], 10);
	}
}
