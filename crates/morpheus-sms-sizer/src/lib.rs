//! C3: pure GSM-03.38 SMS character counting and multi-part sizing.
//!
//! Ported from the character tables in the original `src/render/main.py`
//! (`BASIC_CHARACTERS`/`EXTENSION_CHARACTERS`/`MULTIPART_LENGTHS`), expressed
//! as range/set membership instead of the exhaustive Python literal sets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `(parts, max_length)` ladder from spec.md §4.3.
const MULTIPART_LENGTHS: [(u32, u32); 9] = [
    (1, 160),
    (2, 306),
    (3, 459),
    (4, 612),
    (5, 765),
    (6, 918),
    (7, 1071),
    (8, 1224),
    (9, 1377),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsLength {
    pub length: u32,
    pub parts: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("message length {length} exceeds maximum multi-part SMS length {max_length}")]
pub struct MessageTooLong {
    pub length: u32,
    pub max_length: u32,
}

const EXTENSION_CHARACTERS: &[char] = &['\n', '[', '\\', ']', '^', '{', '|', '}', '~', '€'];

fn is_basic(c: char) -> bool {
    // GSM 03.38 default alphabet, restricted to the characters the upstream
    // SMS gateway actually accepts (spec.md §4.3); everything outside this
    // and `EXTENSION_CHARACTERS` is silently dropped from the length count.
    matches!(c,
        ' '..='?' | '@' | 'A'..='Z' | '_' | 'a'..='z'
        | '¡' | '£' | '¤' | '¥' | '§' | '¿'
        | 'Ä' | 'Å' | 'Æ' | 'Ç' | 'É' | 'Ñ' | 'Ö' | 'Ø' | 'Ü' | 'ß'
        | 'à' | 'ä' | 'å' | 'æ' | 'è' | 'é' | 'ì' | 'ñ' | 'ò' | 'ö' | 'ø' | 'ù' | 'ü'
        | 'ç' | '®'
        | 'Γ' | 'Δ' | 'Θ' | 'Λ' | 'Ξ' | 'Π' | 'Σ' | 'Φ' | 'Ψ' | 'Ω'
    )
}

/// Computes character length and multi-part count for `msg`.
///
/// Characters outside the GSM basic/extension sets are ignored, matching
/// the original implementation's "in theory stripped out" comment.
pub fn sms_length(msg: &str) -> Result<SmsLength, MessageTooLong> {
    let mut length: u32 = 0;
    for c in msg.chars() {
        if is_basic(c) {
            length += 1;
        } else if EXTENSION_CHARACTERS.contains(&c) {
            length += 2;
        }
    }

    for (parts, max_length) in MULTIPART_LENGTHS {
        if length <= max_length {
            return Ok(SmsLength { length, parts });
        }
    }

    Err(MessageTooLong {
        length,
        max_length: MULTIPART_LENGTHS.last().unwrap().1,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_part_ascii() {
        let r = sms_length("hello world").unwrap();
        assert_eq!(r.length, 11);
        assert_eq!(r.parts, 1);
    }

    #[test]
    fn extension_characters_count_double() {
        let r = sms_length("a\nb").unwrap();
        assert_eq!(r.length, 4);
        assert_eq!(r.parts, 1);
    }

    #[test]
    fn boundary_160_is_one_part() {
        let msg = "x".repeat(160);
        let r = sms_length(&msg).unwrap();
        assert_eq!(r.parts, 1);
    }

    #[test]
    fn boundary_161_is_two_parts() {
        let msg = "x".repeat(161);
        let r = sms_length(&msg).unwrap();
        assert_eq!(r.parts, 2);
    }

    #[test]
    fn over_1377_fails() {
        let msg = "x".repeat(1378);
        let err = sms_length(&msg).unwrap_err();
        assert_eq!(err.length, 1378);
        assert_eq!(err.max_length, 1377);
    }

    #[test]
    fn unsupported_characters_are_ignored() {
        // U+1F600 (emoji) is outside both GSM sets and contributes nothing.
        let r = sms_length("hi\u{1F600}").unwrap();
        assert_eq!(r.length, 2);
    }
}
