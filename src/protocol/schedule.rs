use crate::Error;

/// Decodes packed schedule entries such as `070001` (07:00, tariff 1) into
/// their two digit groups.
///
/// Entries with the value zero mark unused slots and are dropped.
pub fn decode_schedule<S: AsRef<str>>(
    entries: &[S],
) -> std::result::Result<Vec<Vec<u8>>, Error> {
    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.as_ref();
        // a single "0" is valid too, so check for unused slots first
        if !entry.is_empty() && entry.bytes().all(|b| b == b'0') {
            continue;
        }
        if entry.is_empty()
            || entry.len() % 2 != 0
            || !entry.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::InvalidValue(format!(
                "'{entry}' is not a schedule entry"
            )));
        }
        result.push(
            entry
                .as_bytes()
                .chunks(2)
                .map(|pair| (pair[0] - b'0') * 10 + (pair[1] - b'0'))
                .collect(),
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_schedule() {
        let entries = [
            "070001", "230002", "000000", "000000", "000000", "000000", "000000", "000000",
        ];
        assert_eq!(
            decode_schedule(&entries).unwrap(),
            vec![vec![7, 0, 1], vec![23, 0, 2]]
        );
    }

    #[test]
    fn test_decode_schedule_keeps_order() {
        assert_eq!(
            decode_schedule(&["0101", "00", "9912"]).unwrap(),
            vec![vec![1, 1], vec![99, 12]]
        );
        assert!(decode_schedule::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_schedule_single_zero() {
        assert_eq!(
            decode_schedule(&["070001", "0"]).unwrap(),
            vec![vec![7, 0, 1]]
        );
        assert_eq!(decode_schedule(&["000", "0"]).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_decode_schedule_errors() {
        for entry in ["", "123", "12a4", "12.4"] {
            assert!(
                matches!(decode_schedule(&[entry]), Err(Error::InvalidValue(_))),
                "{entry}"
            );
        }
    }
}
