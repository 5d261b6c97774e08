use std::ffi::OsStr;

/// Non-ASCII characters that are kept as-is.
const KEPT_LETTERS: &str = "ÆæØøÅåÖöÜü";

/// Replace every character that is not printable ASCII (or one of a small set
/// of Nordic letters) with a `(0xNN)` notation. Existing `(0x..)` text is left
/// untouched, so the mapping is not reversible.
pub fn escape_non_printable(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let code = c as u32;
        if matches!(code, 9 | 10 | 13) || (32..127).contains(&code) || KEPT_LETTERS.contains(c) {
            out.push(c);
        } else {
            out.push_str(&format!("(0x{:02X})", code));
        }
    }
    out
}

/// Escape a name straight from the OS. Bytes that are not valid UTF-8 become
/// one `(0xNN)` each, so distinct raw names never collapse into the same text.
pub fn escape_os_str(name: &OsStr) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        escape_bytes(name.as_bytes())
    }
    #[cfg(not(unix))]
    {
        escape_non_printable(&name.to_string_lossy())
    }
}

pub fn escape_bytes(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(&escape_non_printable(valid));
                return out;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                out.push_str(&escape_non_printable(
                    std::str::from_utf8(valid).unwrap_or_default(),
                ));
                let invalid = err.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    out.push_str(&format!("(0x{:02X})", byte));
                }
                bytes = &rest[invalid..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_untouched() {
        assert_eq!(escape_non_printable("2005/IMG_0001.JPG"), "2005/IMG_0001.JPG");
        assert_eq!(escape_non_printable("Blåbær"), "Blåbær");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(escape_non_printable("caf\u{e9}.jpg"), "caf(0xE9).jpg");
        assert_eq!(escape_non_printable("a\u{7}b"), "a(0x07)b");
        assert_eq!(escape_non_printable("\u{1F600}"), "(0x1F600)");
    }

    #[test]
    fn test_escape_raw_bytes() {
        assert_eq!(escape_bytes(b"a\xff.jpg"), "a(0xFF).jpg");
        assert_eq!(escape_bytes(b"a\xfe.jpg"), "a(0xFE).jpg");
        assert_eq!(escape_bytes(b"caf\xc3\xa9\xc3"), "caf(0xE9)(0xC3)");
        assert_eq!(escape_bytes("Blåbær".as_bytes()), "Blåbær");
    }
}
