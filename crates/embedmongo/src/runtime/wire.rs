//! Pre-encoded shutdown commands for the MongoDB wire protocol
//!
//! Both messages carry `{shutdown: 1, force: true}` against the `admin`
//! database. Old servers only understand `OP_QUERY` on `admin.$cmd`; current
//! servers removed it in favor of `OP_MSG`.

/// `OP_QUERY` opcode
pub const OP_QUERY: i32 = 2004;

/// `OP_MSG` opcode
pub const OP_MSG: i32 = 2013;

/// Length of the standard message header
pub const HEADER_LEN: usize = 16;

/// `OP_QUERY` against `admin.$cmd`, numberToReturn -1
#[rustfmt::skip]
pub const LEGACY_SHUTDOWN: [u8; 66] = [
    // header: messageLength, requestID, responseTo, opCode
    0x42, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0xd4, 0x07, 0x00, 0x00,
    // flags
    0x00, 0x00, 0x00, 0x00,
    // "admin.$cmd\0"
    b'a', b'd', b'm', b'i', b'n', b'.', b'$', b'c', b'm', b'd', 0x00,
    // numberToSkip
    0x00, 0x00, 0x00, 0x00,
    // numberToReturn
    0xff, 0xff, 0xff, 0xff,
    // {shutdown: int32 1, force: true}
    0x1b, 0x00, 0x00, 0x00,
    0x10, b's', b'h', b'u', b't', b'd', b'o', b'w', b'n', 0x00,
    0x01, 0x00, 0x00, 0x00,
    0x08, b'f', b'o', b'r', b'c', b'e', 0x00,
    0x01,
    0x00,
];

/// `OP_MSG` with a single body section
#[rustfmt::skip]
pub const SHUTDOWN: [u8; 63] = [
    // header: messageLength, requestID, responseTo, opCode
    0x3f, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0xdd, 0x07, 0x00, 0x00,
    // flagBits
    0x00, 0x00, 0x00, 0x00,
    // section kind 0
    0x00,
    // {shutdown: int32 1, force: true, $db: "admin"}
    0x2a, 0x00, 0x00, 0x00,
    0x10, b's', b'h', b'u', b't', b'd', b'o', b'w', b'n', 0x00,
    0x01, 0x00, 0x00, 0x00,
    0x08, b'f', b'o', b'r', b'c', b'e', 0x00,
    0x01,
    0x02, b'$', b'd', b'b', 0x00,
    0x06, 0x00, 0x00, 0x00,
    b'a', b'd', b'm', b'i', b'n', 0x00,
    0x00,
];

/// Little-endian `int32` at `offset`
pub fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Declared message length and opcode of a message header
pub fn header(bytes: &[u8]) -> Option<(i32, i32)> {
    Some((read_i32(bytes, 0)?, read_i32(bytes, 12)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_shutdown_framing() {
        assert_eq!(
            header(&LEGACY_SHUTDOWN),
            Some((LEGACY_SHUTDOWN.len() as i32, OP_QUERY))
        );
        // collection name, skip and return precede the document
        let doc_start = HEADER_LEN + 4 + b"admin.$cmd\0".len() + 8;
        let doc_len = read_i32(&LEGACY_SHUTDOWN, doc_start).unwrap() as usize;
        assert_eq!(doc_start + doc_len, LEGACY_SHUTDOWN.len());
        assert_eq!(read_i32(&LEGACY_SHUTDOWN, doc_start - 4), Some(-1));
    }

    #[test]
    fn test_msg_shutdown_framing() {
        assert_eq!(header(&SHUTDOWN), Some((SHUTDOWN.len() as i32, OP_MSG)));
        let doc_start = HEADER_LEN + 4 + 1;
        let doc_len = read_i32(&SHUTDOWN, doc_start).unwrap() as usize;
        assert_eq!(doc_start + doc_len, SHUTDOWN.len());
        assert_eq!(SHUTDOWN[SHUTDOWN.len() - 1], 0x00);
    }

    #[test]
    fn test_header_of_truncated_message() {
        assert_eq!(header(&SHUTDOWN[..10]), None);
    }
}
