//! Fixed messages of a readout session and the registers known to the tool.

use super::{build_request, Mode, ACK, CR, LF};
use crate::Error;
use lazy_static::lazy_static;
use std::{collections::HashMap, fmt, str::FromStr};

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

/// `/?!<CR><LF>`
pub const SIGN_ON: &[u8] = b"/?!\r\n";

/// `<SOH>B0<ETX><bcc>`
pub const END_SESSION: &[u8] = b"\x01B0\x03q";

/// Protocol control character for normal protocol procedure.
const PROTOCOL_NORMAL: u8 = b'0';
/// Mode control character for programming mode.
const MODE_PROGRAMMING: u8 = b'1';

/// `<ACK>0<baudrate code>1<CR><LF>`
pub fn option_select(baudrate_code: u8) -> std::result::Result<Vec<u8>, Error> {
    if super::baudrate(baudrate_code).is_none() {
        return Err(Error::InvalidArgument(format!(
            "unknown baud rate code {baudrate_code}"
        )));
    }
    Ok(vec![
        ACK,
        PROTOCOL_NORMAL,
        b'0' + baudrate_code,
        MODE_PROGRAMMING,
        CR,
        LF,
    ])
}

/// OBIS code of the tariff schedule with the given number (`0A.nn.64*FF`).
///
/// The number is hex encoded, schedule 12 is `0A.0C.64*FF`.
pub fn tariff_schedule_obis(number: u8) -> String {
    format!("0A.{number:02X}.64*FF")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum Register {
    TotalEnergy,
    VoltageA,
    VoltageB,
    VoltageC,
    ActivePowerA,
    ActivePowerB,
    ActivePowerC,
    ActivePowerSum,
    SerialNumber,
    Status,
    SeasonSchedule,
    SpecialDays,
}

impl Register {
    pub const ALL: [Register; 12] = [
        Register::TotalEnergy,
        Register::VoltageA,
        Register::VoltageB,
        Register::VoltageC,
        Register::ActivePowerA,
        Register::ActivePowerB,
        Register::ActivePowerC,
        Register::ActivePowerSum,
        Register::SerialNumber,
        Register::Status,
        Register::SeasonSchedule,
        Register::SpecialDays,
    ];

    pub fn obis(self) -> &'static str {
        match self {
            Register::TotalEnergy => "0F.08.80*FF",
            Register::VoltageA => "20.07.00*FF",
            Register::VoltageB => "34.07.00*FF",
            Register::VoltageC => "48.07.00*FF",
            Register::ActivePowerA => "24.07.00*FF",
            Register::ActivePowerB => "38.07.00*FF",
            Register::ActivePowerC => "4C.07.00*FF",
            Register::ActivePowerSum => "10.07.00*FF",
            Register::SerialNumber => "60.01.00*FF",
            Register::Status => "60.05.00*FF",
            Register::SeasonSchedule => "0D.00.00*FF",
            Register::SpecialDays => "0B.00.00*FF",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::TotalEnergy => "total-energy",
            Register::VoltageA => "voltage-a",
            Register::VoltageB => "voltage-b",
            Register::VoltageC => "voltage-c",
            Register::ActivePowerA => "active-power-a",
            Register::ActivePowerB => "active-power-b",
            Register::ActivePowerC => "active-power-c",
            Register::ActivePowerSum => "active-power-sum",
            Register::SerialNumber => "serial-number",
            Register::Status => "status",
            Register::SeasonSchedule => "season-schedule",
            Register::SpecialDays => "special-days",
        }
    }

    /// Registers whose content is a list of packed schedule entries.
    pub fn is_schedule(self) -> bool {
        matches!(self, Register::SeasonSchedule | Register::SpecialDays)
    }

    /// Precomputed read request for this register.
    pub fn request(self) -> &'static [u8] {
        &READ_REQUESTS[&self]
    }
}

lazy_static! {
    static ref READ_REQUESTS: HashMap<Register, Vec<u8>> = Register::ALL
        .iter()
        .map(|register| {
            let request = build_request(Mode::Read, register.obis(), b"")
                .expect("register table holds valid OBIS codes");
            (*register, request)
        })
        .collect();
}

impl FromStr for Register {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Register::ALL
            .into_iter()
            .find(|register| register.name() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown register '{s}'")))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
