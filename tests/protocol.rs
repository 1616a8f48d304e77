use nevameter_lib::protocol::{
    build_request, calculate_bcc, decode_schedule, obis, parse_response, read_value,
    DataMessage, Mode, Response, Value,
};
use nevameter_lib::Error;

#[test]
fn read_and_password_requests() {
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
fn request_argument_errors() {
    assert!(matches!(
        build_request(Mode::Read, "600100FF", b""),
        Err(Error::MalformedObis(_))
    ));
    assert!(matches!(
        build_request(Mode::Read, "60.01.00*00", b""),
        Err(Error::MalformedObis(_))
    ));
    assert!(matches!(
        build_request(Mode::Write, "", b""),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        build_request(Mode::PasswordCompare, "60.01.00*FF", b"1"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!("L".parse::<Mode>(), Err(Error::InvalidArgument(_))));
}

#[test]
fn data_response_values() {
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
}

#[test]
fn corrupted_checksum_is_reported_as_such() {
    let rx = b"\x024C0700FF(00134.2)\x03X";
    let mut corrupted = rx.to_vec();
    corrupted[12] = b'5';
    assert!(matches!(
        read_value(&corrupted),
        Err(Error::ChecksumMismatch { .. })
    ));

    let mut corrupted = rx.to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x80;
    assert_eq!(
        read_value(&corrupted),
        Err(Error::ChecksumMismatch {
            calculated: b'X',
            received: b'X' ^ 0x80
        })
    );
    assert!(read_value(&corrupted).unwrap_err().is_retryable());
}

#[test]
fn malformed_responses() {
    assert_eq!(read_value(b""), Err(Error::MalformedResponse(vec![])));
    assert!(matches!(
        read_value(b"\x024C0700FF00134.2\x03X"),
        Err(Error::MalformedResponse(_))
    ));
}

#[test]
fn meter_error_frame() {
    let err = read_value(b"\x02(12)\x03\x10").unwrap_err();
    assert_eq!(err, Error::DeviceError("12".to_string()));
    assert!(!err.is_retryable());
}

#[test]
fn checksum_reference_values() {
    assert_eq!(calculate_bcc(b"60010AFF(0000000000000000)\x03"), b't');
    assert_eq!(calculate_bcc(b"R1\x0260010AFF()\x03"), 0x15);
}

#[test]
fn tariff_schedule_response() {
    let rx = b"\x020A0164FF(070001,230002,000000,000000,000000,000000,000000,000000)\x03Y";
    let message = match parse_response(rx).unwrap() {
        Response::Data(message) => message,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(message, DataMessage::decode(rx).unwrap());
    assert_eq!(message.address, "0A.01.64*FF");
    assert_eq!(
        decode_schedule(&message.fields).unwrap(),
        vec![vec![7, 0, 1], vec![23, 0, 2]]
    );
}

#[test]
fn obis_round_trip() {
    for code in ["60.01.00*FF", "0D.00.00*FF", "4C.07.00*FF"] {
        assert_eq!(obis::expand(&obis::compact(code).unwrap()).unwrap(), code);
    }
}
