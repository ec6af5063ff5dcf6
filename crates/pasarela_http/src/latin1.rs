//! Lossless byte <-> text mapping for HTTP heads.
//!
//! Request and response heads are decoded as ISO-8859-1 so that every byte
//! maps to exactly one char and back. Header values that carry non-ASCII
//! bytes survive the round trip unchanged when re-serialized upstream.

/// Decode raw head bytes as ISO-8859-1.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a string produced by [`decode`] back into raw bytes.
///
/// Chars above U+00FF cannot come out of [`decode`]; they are replaced with
/// `?` rather than silently truncated.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};

    #[test]
    fn round_trips_every_byte_value() {
        let all: Vec<u8> = (0u8..=255).collect();
        assert_eq!(encode(&decode(&all)), all);
    }

    #[test]
    fn non_latin1_chars_become_question_marks() {
        assert_eq!(encode("a€b"), b"a?b");
    }
}
