//! Frame codec for IEC 61107 style meter readout.
//!
//! Nothing in here performs I/O: requests are built into byte vectors and
//! responses are decoded from byte slices handed in by a transport.

mod bcc;
pub mod commands;
pub mod obis;
mod request;
mod response;
mod schedule;
mod value;

pub use bcc::{calculate_bcc, verify_bcc};
pub use commands::Register;
pub use request::{build_request, Mode};
pub use response::{
    parse_response, DataMessage, IdentificationMessage, PasswordMessage, Response,
};
pub use schedule::decode_schedule;
pub use value::{read_value, Value};

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

// IEC 62056-21: the reaction time of a tariff device is at least 20ms
pub const MINIMUM_DELAY: std::time::Duration = std::time::Duration::from_millis(20);

/// Every session starts at this rate before the baud rate switch.
pub const INITIAL_BAUDRATE: u32 = 300;

/// Baud rate announced by the identification message or requested in the
/// option select message.
pub fn baudrate(code: u8) -> Option<u32> {
    match code {
        0 => Some(300),
        1 => Some(600),
        2 => Some(1200),
        3 => Some(2400),
        4 => Some(4800),
        5 => Some(9600),
        6 => Some(19200),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baudrate() {
        assert_eq!(baudrate(0), Some(INITIAL_BAUDRATE));
        assert_eq!(baudrate(5), Some(9600));
        assert_eq!(baudrate(7), None);
    }
}
