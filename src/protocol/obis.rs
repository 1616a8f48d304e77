//! OBIS register addresses as written by humans (`60.01.00*FF`) and as carried
//! inside frames (`600100FF`).

use crate::Error;

const DOTTED_LENGTH: usize = 11;
const COMPACT_LENGTH: usize = 8;
// separator positions in the dotted form
const SEPARATORS: [(usize, u8); 3] = [(2, b'.'), (5, b'.'), (8, b'*')];

/// Validates a dotted OBIS code and returns its compact, upper case form.
///
/// The whole string has to be three two-digit hex groups separated by `.`,
/// followed by `*FF`. Anything else, including a string that merely contains a
/// valid code, is rejected.
pub fn compact(code: &str) -> std::result::Result<String, Error> {
    let bytes = code.as_bytes();
    if bytes.len() != DOTTED_LENGTH {
        return Err(Error::MalformedObis(code.to_string()));
    }
    let mut compacted = String::with_capacity(COMPACT_LENGTH);
    for (i, b) in bytes.iter().enumerate() {
        match SEPARATORS.iter().find(|(pos, _)| *pos == i) {
            Some((_, separator)) if b == separator => {}
            None if b.is_ascii_hexdigit() => compacted.push(b.to_ascii_uppercase() as char),
            _ => return Err(Error::MalformedObis(code.to_string())),
        }
    }
    if !compacted.ends_with("FF") {
        return Err(Error::MalformedObis(code.to_string()));
    }
    Ok(compacted)
}

/// Reinserts the separators into a compact OBIS code (`0F0680FF` -> `0F.06.80*FF`).
///
/// Any hex digits are accepted in the last group, meters answer with whatever
/// address they hold.
pub fn expand(compact: &str) -> std::result::Result<String, Error> {
    if compact.len() != COMPACT_LENGTH || !compact.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::MalformedObis(compact.to_string()));
    }
    Ok(format!(
        "{}.{}.{}*{}",
        &compact[0..2],
        &compact[2..4],
        &compact[4..6],
        &compact[6..8]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact() {
        assert_eq!(compact("60.01.00*FF").unwrap(), "600100FF");
        assert_eq!(compact("0a.01.64*ff").unwrap(), "0A0164FF");
    }

    #[test]
    fn test_compact_rejects_partial_match() {
        for code in [
            "600100FF",
            "60.01.00*F",
            "60.01.00*FF ",
            " 60.01.00*FF",
            "60.01.00.FF",
            "60*01.00.FF",
            "6G.01.00*FF",
            "60.01.00*FFFF",
            "60.01.00*00",
            "60.01.00*FE",
            "",
        ] {
            assert_eq!(
                compact(code),
                Err(Error::MalformedObis(code.to_string())),
                "{code}"
            );
        }
    }

    #[test]
    fn test_compact_rejects_non_ascii() {
        assert!(compact("60.01.0é*F").is_err());
    }

    #[test]
    fn test_expand() {
        assert_eq!(expand("0F0680FF").unwrap(), "0F.06.80*FF");
        assert!(expand("0F0680F").is_err());
        assert!(expand("0F0680FZ").is_err());
        assert_eq!(expand("AABBCCDD").unwrap(), "AA.BB.CC*DD");
    }

    #[test]
    fn test_round_trip() {
        for code in ["60.01.00*FF", "0F.08.80*FF", "4C.07.00*FF", "0A.03.64*FF"] {
            assert_eq!(expand(&compact(code).unwrap()).unwrap(), code);
        }
    }
}
