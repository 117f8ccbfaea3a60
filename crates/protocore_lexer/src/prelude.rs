//! Prelude checks run once, before lexing begins: file size, UTF-16/BOM
//! detection, and UTF-8 validity.

use protocore_base::OpenError;

const MAX_FILE_SIZE: usize = i32::MAX as usize;
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Validates `bytes` as a Protobuf source file and returns its text with
/// a leading UTF-8 BOM stripped, or the `OpenError` that makes it
/// unusable.
pub fn check_prelude(path: &str, bytes: &[u8]) -> Result<String, OpenError> {
    if bytes.len() > MAX_FILE_SIZE {
        return Err(OpenError::TooLarge { path: path.to_string(), max: MAX_FILE_SIZE as i64 });
    }

    if bytes.len() >= 2 && (bytes[..2] == [0xFF, 0xFE] || bytes[..2] == [0xFE, 0xFF]) {
        return Err(OpenError::Utf16Detected { path: path.to_string() });
    }
    // A NUL in the first couple of bytes is the classic heuristic for
    // UTF-16 text that happens to lack a BOM (ASCII source bytes get
    // padded with a zero high byte).
    if bytes.len() >= 2 && (bytes[0] == 0 || bytes[1] == 0) {
        return Err(OpenError::Utf16Detected { path: path.to_string() });
    }

    let body = if bytes.starts_with(&UTF8_BOM) { &bytes[3..] } else { bytes };

    match std::str::from_utf8(body) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (bad_count, first_bad) = count_invalid_utf8(body);
            if bad_count * 5 >= body.len() {
                // >= 20% of bytes are part of invalid sequences.
                Err(OpenError::BinaryFile { path: path.to_string() })
            } else {
                Err(OpenError::InvalidUtf8Byte { path: path.to_string(), offset: first_bad })
            }
        }
    }
}

/// Counts bytes that are not part of any valid UTF-8 sequence, and the
/// offset of the first such byte.
fn count_invalid_utf8(bytes: &[u8]) -> (usize, usize) {
    let mut bad = 0usize;
    let mut first_bad = 0usize;
    let mut found_first = false;
    let mut i = 0usize;
    while i < bytes.len() {
        match std::str::from_utf8(&bytes[i..]) {
            Ok(_) => break,
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                i += valid_up_to;
                if !found_first {
                    first_bad = i;
                    found_first = true;
                }
                let error_len = e.error_len().unwrap_or(1);
                bad += error_len;
                i += error_len;
            }
        }
    }
    (bad, first_bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ascii_passes_through() {
        assert_eq!(check_prelude("t", b"syntax = \"proto3\";").unwrap(), "syntax = \"proto3\";");
    }

    #[test]
    fn strips_leading_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"message M {}");
        assert_eq!(check_prelude("t", &bytes).unwrap(), "message M {}");
    }

    #[test]
    fn rejects_oversized_files() {
        // We don't actually allocate 2GiB in a test; check the boundary
        // logic directly via a crafted size is impractical, so this test
        // instead documents the limit rather than exercising it at scale.
        assert_eq!(MAX_FILE_SIZE, i32::MAX as usize);
    }

    #[test]
    fn rejects_utf16_bom() {
        let bytes = [0xFFu8, 0xFE, b'a', 0];
        assert!(matches!(check_prelude("t", &bytes), Err(OpenError::Utf16Detected { .. })));
    }

    #[test]
    fn reports_binary_file_when_mostly_invalid() {
        let bytes: Vec<u8> = (0..20).map(|_| 0xFFu8).collect();
        assert!(matches!(check_prelude("t", &bytes), Err(OpenError::BinaryFile { .. }) | Err(OpenError::Utf16Detected { .. })));
    }

    #[test]
    fn reports_first_bad_byte_when_mostly_valid() {
        let mut bytes = b"message M { string field_one_quite_long_name = 1; }".to_vec();
        bytes.push(0xFF);
        match check_prelude("t", &bytes) {
            Err(OpenError::InvalidUtf8Byte { offset, .. }) => assert_eq!(offset, bytes.len() - 1),
            other => panic!("expected InvalidUtf8Byte, got {other:?}"),
        }
    }
}
