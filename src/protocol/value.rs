use super::DataMessage;
use crate::Error;
use std::fmt;

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

/// Register content interpreted as numbers or text.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "protocol_serde", serde(untagged))]
pub enum Value {
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
    Texts(Vec<String>),
}

impl Value {
    /// Interprets the fields of a data message.
    ///
    /// Only the first field is inspected: if it contains a decimal point, every
    /// field is parsed as a number, otherwise every field is kept as text. A
    /// register mixing both kinds therefore fails to parse or stays text.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> std::result::Result<Self, Error> {
        let numeric = fields
            .first()
            .is_some_and(|field| field.as_ref().contains('.'));
        match (fields, numeric) {
            ([field], true) => Ok(Value::Float(parse_float(field.as_ref())?)),
            (_, true) => Ok(Value::Floats(
                fields
                    .iter()
                    .map(|field| parse_float(field.as_ref()))
                    .collect::<std::result::Result<_, _>>()?,
            )),
            ([field], false) => Ok(Value::Text(field.as_ref().to_string())),
            (_, false) => Ok(Value::Texts(
                fields.iter().map(|field| field.as_ref().to_string()).collect(),
            )),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value}"),
            Value::Floats(values) => write!(f, "{values:?}"),
            Value::Texts(values) => write!(f, "{values:?}"),
        }
    }
}

fn parse_float(field: &str) -> std::result::Result<f64, Error> {
    field
        .parse()
        .map_err(|_| Error::InvalidValue(format!("'{field}' is not a number")))
}

/// Decodes a data response and interprets its fields, see [`Value::from_fields`].
pub fn read_value(rx_buffer: &[u8]) -> std::result::Result<Value, Error> {
    let message = DataMessage::decode(rx_buffer)?;
    Value::from_fields(&message.fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_value() {
        assert_eq!(
            read_value(b"\x02600100FF(60089784)\x03\x09").unwrap(),
            Value::Text("60089784".to_string())
        );
        assert_eq!(
            read_value(b"\x024C0700FF(00134.2)\x03X").unwrap(),
            Value::Float(134.2)
        );
        assert_eq!(
            read_value(b"\x020F0680FF(04.8190,04.8457,02.5359,00.0000,00.0000)\x03R").unwrap(),
            Value::Floats(vec![4.819, 4.8457, 2.5359, 0.0, 0.0])
        );
        assert_eq!(
            read_value(
                b"\x020A0164FF(070001,230002,000000,000000,000000,000000,000000,000000)\x03Y"
            )
            .unwrap(),
            Value::Texts(
                ["070001", "230002", "000000", "000000", "000000", "000000", "000000", "000000"]
                    .map(String::from)
                    .to_vec()
            )
        );
    }

    #[test]
    fn test_read_value_errors() {
        assert!(matches!(read_value(b""), Err(Error::MalformedResponse(_))));
        assert!(matches!(
            read_value(b"\x024C0700FF00134.2\x03X"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            read_value(
                b"\x020F0880FF(016442.17,012865.25,003576.92,000000.00,000000.00)\x03S"
            ),
            Err(Error::ChecksumMismatch {
                calculated: 0x5A,
                received: b'S'
            })
        ));
    }

    #[test]
    fn test_first_field_decides() {
        assert_eq!(
            Value::from_fields(&["12", "1.5"]).unwrap(),
            Value::Texts(vec!["12".to_string(), "1.5".to_string()])
        );
        assert!(matches!(
            Value::from_fields(&["1.5", "abc"]),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Text("x".to_string()).as_str(), Some("x"));
        assert_eq!(Value::Text("x".to_string()).as_f64(), None);
        assert_eq!(Value::Floats(vec![1.0, 2.5]).to_string(), "[1.0, 2.5]");
    }
}
