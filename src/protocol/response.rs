use super::{bcc::verify_bcc, obis, CR, ETX, LF, SOH, STX};
use crate::Error;

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

const MAX_IDENTIFIER_LENGTH: usize = 16;

/// Answer to the sign on request: `/XXXZIdentifier\r\n`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct IdentificationMessage {
    pub vendor: String,
    pub baudrate_code: u8,
    pub identifier: String,
}

impl IdentificationMessage {
    pub fn decode(rx_buffer: &[u8]) -> std::result::Result<Self, Error> {
        match_identification(rx_buffer).ok_or_else(|| unexpected_frame(rx_buffer))
    }

    /// Highest baud rate the meter offers.
    pub fn baudrate(&self) -> Option<u32> {
        super::baudrate(self.baudrate_code)
    }
}

/// Operand sent by the meter after the option select: `SOH P0 STX (data) ETX bcc`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct PasswordMessage {
    pub data: Vec<u8>,
}

impl PasswordMessage {
    pub fn decode(rx_buffer: &[u8]) -> std::result::Result<Self, Error> {
        match match_password(rx_buffer) {
            Some(frame) => {
                frame.verify()?;
                Ok(Self {
                    data: frame.data.to_vec(),
                })
            }
            None => Err(unexpected_frame(rx_buffer)),
        }
    }
}

/// Register content: `STX address (field,field,...) ETX bcc`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct DataMessage {
    /// OBIS code of the register in dotted form
    pub address: String,
    pub fields: Vec<String>,
}

impl DataMessage {
    pub fn decode(rx_buffer: &[u8]) -> std::result::Result<Self, Error> {
        match match_data(rx_buffer) {
            Some((address, frame)) => {
                frame.verify()?;
                let fields = frame
                    .data
                    .split(|b| *b == b',')
                    .map(ascii_field)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Self {
                    address: obis::expand(ascii_field(address)?.as_str())?,
                    fields,
                })
            }
            None => Err(unexpected_frame(rx_buffer)),
        }
    }
}

/// A decoded meter response.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum Response {
    Identification(IdentificationMessage),
    Password(PasswordMessage),
    Data(DataMessage),
}

/// Classifies `rx_buffer` by its frame shape and decodes it.
///
/// Error frames sent by the meter are reported as [`Error::DeviceError`].
pub fn parse_response(rx_buffer: &[u8]) -> std::result::Result<Response, Error> {
    if let Some(message) = match_identification(rx_buffer) {
        return Ok(Response::Identification(message));
    }
    if match_password(rx_buffer).is_some() {
        return PasswordMessage::decode(rx_buffer).map(Response::Password);
    }
    if match_data(rx_buffer).is_some() {
        return DataMessage::decode(rx_buffer).map(Response::Data);
    }
    Err(unexpected_frame(rx_buffer))
}

/// Part of a frame protected by a block check character.
struct CheckedFrame<'a> {
    data: &'a [u8],
    span: &'a [u8],
    bcc: u8,
}

impl CheckedFrame<'_> {
    fn verify(&self) -> std::result::Result<(), Error> {
        verify_bcc(self.span, self.bcc)
    }
}

/// Splits `... '(' data ')' ETX bcc` starting at `open`, the index of the opening parenthesis.
fn enclosed(rx_buffer: &[u8], open: usize) -> Option<(&[u8], u8)> {
    let len = rx_buffer.len();
    if len < open + 4 || rx_buffer[open] != b'(' {
        return None;
    }
    match &rx_buffer[len - 3..] {
        [b')', ETX, bcc] => Some((&rx_buffer[open + 1..len - 3], *bcc)),
        _ => None,
    }
}

fn match_identification(rx_buffer: &[u8]) -> Option<IdentificationMessage> {
    let len = rx_buffer.len();
    if len < 8 || len > 7 + MAX_IDENTIFIER_LENGTH || rx_buffer[0] != b'/' {
        return None;
    }
    if rx_buffer[len - 2..] != [CR, LF] {
        return None;
    }
    let vendor = &rx_buffer[1..4];
    if !vendor[0].is_ascii_uppercase()
        || !vendor[1].is_ascii_uppercase()
        || !vendor[2].is_ascii_alphabetic()
    {
        return None;
    }
    let baudrate_code = rx_buffer[4];
    if !(b'0'..=b'5').contains(&baudrate_code) {
        return None;
    }
    let identifier = &rx_buffer[5..len - 2];
    if !identifier.iter().all(|b| is_identifier_byte(*b)) {
        return None;
    }
    Some(IdentificationMessage {
        vendor: String::from_utf8_lossy(vendor).into_owned(),
        baudrate_code: baudrate_code - b'0',
        identifier: String::from_utf8_lossy(identifier).into_owned(),
    })
}

// printable characters without the frame start and end markers
fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_graphic() && b != b'/' && b != b'!'
}

fn match_password(rx_buffer: &[u8]) -> Option<CheckedFrame<'_>> {
    if !rx_buffer.starts_with(&[SOH, b'P', b'0', STX]) {
        return None;
    }
    let (data, bcc) = enclosed(rx_buffer, 4)?;
    Some(CheckedFrame {
        data,
        span: &rx_buffer[1..rx_buffer.len() - 1],
        bcc,
    })
}

fn match_data(rx_buffer: &[u8]) -> Option<(&[u8], CheckedFrame<'_>)> {
    if rx_buffer.len() < 9 || rx_buffer[0] != STX {
        return None;
    }
    let address = &rx_buffer[1..9];
    if !address.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let (data, bcc) = enclosed(rx_buffer, 9)?;
    Some((
        address,
        CheckedFrame {
            data,
            span: &rx_buffer[1..rx_buffer.len() - 1],
            bcc,
        },
    ))
}

/// Error code of a `STX '(' digits ')' ETX x` frame. The trailing byte is not checked.
fn match_error(rx_buffer: &[u8]) -> Option<String> {
    if rx_buffer.first() != Some(&STX) {
        return None;
    }
    let (code, _) = enclosed(rx_buffer, 1)?;
    if code.is_empty() || !code.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(String::from_utf8_lossy(code).into_owned())
}

/// Failure for a buffer that does not have the expected shape: an error frame
/// from the meter wins over the format error.
fn unexpected_frame(rx_buffer: &[u8]) -> Error {
    match match_error(rx_buffer) {
        Some(code) => Error::DeviceError(code),
        None => Error::MalformedResponse(rx_buffer.to_vec()),
    }
}

fn ascii_field(field: &[u8]) -> std::result::Result<String, Error> {
    if !field.is_ascii() {
        return Err(Error::TypeMismatch(format!(
            "response field is not ASCII text: {field:02X?}"
        )));
    }
    Ok(String::from_utf8_lossy(field).into_owned())
}
