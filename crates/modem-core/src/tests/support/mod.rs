//! Test doubles and harnesses shared by the unit and behavioural suites.

mod modem;
mod transport;

pub use modem::{DialOutcome, MODEM_PATH, ModemHarness};
pub use transport::ScriptedTransport;
