use super::{bcc::calculate_bcc, obis, ETX, SOH, STX};
use crate::Error;
use std::{fmt, str::FromStr};

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

/// Command sent to the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum Mode {
    Read,
    Write,
    PasswordCompare,
}

impl Mode {
    pub fn as_byte(self) -> u8 {
        match self {
            Mode::Read => b'R',
            Mode::Write => b'W',
            Mode::PasswordCompare => b'P',
        }
    }

    fn requires_payload(self) -> bool {
        matches!(self, Mode::Write | Mode::PasswordCompare)
    }

    fn requires_obis(self) -> bool {
        matches!(self, Mode::Read | Mode::Write)
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            b'R' => Ok(Mode::Read),
            b'W' => Ok(Mode::Write),
            b'P' => Ok(Mode::PasswordCompare),
            _ => Err(Error::InvalidArgument(format!(
                "mode must be in ('P', 'W', 'R'), not {:?}",
                value as char
            ))),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.as_bytes() {
            [b] => Mode::try_from(*b),
            _ => Err(Error::InvalidArgument(format!(
                "mode must be in ('P', 'W', 'R'), not '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Builds a complete request frame:
/// `SOH mode '1' STX obis '(' payload ')' ETX bcc`.
///
/// The block check character covers everything after the leading `SOH`.
pub fn build_request(
    mode: Mode,
    obis: &str,
    payload: &[u8],
) -> std::result::Result<Vec<u8>, Error> {
    if mode.requires_payload() && payload.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "data cannot be empty if mode is '{mode}'"
        )));
    }
    if mode.requires_obis() && obis.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "OBIS code is required if mode is '{mode}'"
        )));
    }
    if !mode.requires_obis() && !obis.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "mode cannot be '{mode}' if OBIS code was specified"
        )));
    }
    let address = if obis.is_empty() {
        String::new()
    } else {
        obis::compact(obis)?
    };

    let mut tx_buffer = Vec::with_capacity(address.len() + payload.len() + 8);
    tx_buffer.extend_from_slice(&[SOH, mode.as_byte(), b'1', STX]);
    tx_buffer.extend_from_slice(address.as_bytes());
    tx_buffer.push(b'(');
    tx_buffer.extend_from_slice(payload);
    tx_buffer.extend_from_slice(&[b')', ETX]);
    let bcc = calculate_bcc(&tx_buffer[1..]);
    tx_buffer.push(bcc);
    Ok(tx_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        assert_eq!(
            build_request(Mode::Read, "60.01.00*FF", b"").unwrap(),
            b"\x01R1\x02600100FF()\x03d"
        );
        assert_eq!(
            build_request(Mode::PasswordCompare, "", b"00000000").unwrap(),
            b"\x01P1\x02(00000000)\x03a"
        );
    }

    #[test]
    fn test_build_write_request() {
        let frame = build_request(Mode::Write, "0A.01.64*FF", b"070001").unwrap();
        assert_eq!(&frame[..13], b"\x01W1\x020A0164FF(");
        assert_eq!(
            frame[frame.len() - 1],
            calculate_bcc(&frame[1..frame.len() - 1])
        );
    }

    #[test]
    fn test_read_request_bcc() {
        for code in ["60.01.00*FF", "0F.08.80*FF", "4c.07.00*ff"] {
            let frame = build_request(Mode::Read, code, b"").unwrap();
            let (bcc, body) = frame.split_last().unwrap();
            assert_eq!(*bcc, calculate_bcc(&body[1..]));
        }
    }

    #[test]
    fn test_build_request_argument_errors() {
        assert!(matches!(
            build_request(Mode::Write, "60.01.00*FF", b""),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            build_request(Mode::PasswordCompare, "", b""),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            build_request(Mode::Write, "", b"1"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            build_request(Mode::Read, "", b""),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            build_request(Mode::PasswordCompare, "60.01.00*FF", b"00000000"),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            build_request(Mode::Read, "600100FF", b""),
            Err(Error::MalformedObis("600100FF".to_string()))
        );
    }

    #[test]
    fn test_payload_check_precedes_obis_check() {
        // Write without payload and without OBIS reports the missing payload
        match build_request(Mode::Write, "", b"") {
            Err(Error::InvalidArgument(msg)) => assert!(msg.starts_with("data cannot be empty")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("R".parse::<Mode>().unwrap(), Mode::Read);
        assert_eq!(Mode::try_from(b'P').unwrap(), Mode::PasswordCompare);
        assert!(matches!("L".parse::<Mode>(), Err(Error::InvalidArgument(_))));
        assert!(matches!("RW".parse::<Mode>(), Err(Error::InvalidArgument(_))));
        assert_eq!(Mode::Write.to_string(), "W");
    }
}
