//! Base64 decoder for `bytes` fields (design §4.4).
//!
//! Buffered only (§1 Non-goals: "streaming base64" is out of scope): the
//! whole accumulated field must be in memory before decoding starts. Ported
//! by hand rather than via the `base64` crate because the design fully
//! specifies the algorithm, including its exact error taxonomy, as one of the
//! core's components.

use crate::error::{ErrorKind, ParserError};
use crate::sink::Sink;
use prost_reflect::FieldDescriptor;

/// ASCII → 6-bit value lookup table. `-1` marks a non-base64 character.
#[rustfmt::skip]
const DECODE_TABLE: [i8; 256] = {
    let mut table = [-1i8; 256];
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
};

const PAD: u8 = b'=';

/// Decodes `text` as base64 and forwards the decoded bytes to `sink` via
/// `put_string_chunk`, one, two, or three bytes per 4-character group.
pub(crate) fn decode_to_sink<S: Sink>(
    text: &[u8],
    field: &FieldDescriptor,
    pos: usize,
    sink: &mut S,
) -> Result<(), ParserError> {
    if text.len() % 4 != 0 {
        return Err(ParserError::new(
            ErrorKind::InvalidBase64Length(field.name().into()),
            pos,
        ));
    }

    for group in text.chunks_exact(4) {
        let pad_count = match (group[2] == PAD, group[3] == PAD) {
            (false, false) => 0,
            (false, true) => 1,
            (true, true) => 2,
            (true, false) => {
                return Err(ParserError::new(
                    ErrorKind::InvalidBase64Padding(field.name().into()),
                    pos,
                ))
            }
        };

        let mut sextets = [0i32; 4];
        for (i, &c) in group.iter().enumerate() {
            if c == PAD {
                if i < 4 - pad_count {
                    return Err(ParserError::new(
                        ErrorKind::InvalidBase64Padding(field.name().into()),
                        pos,
                    ));
                }
                sextets[i] = 0;
            } else {
                let v = DECODE_TABLE[c as usize];
                if v < 0 {
                    return Err(ParserError::new(
                        ErrorKind::InvalidBase64Chars(field.name().into()),
                        pos,
                    ));
                }
                sextets[i] = i32::from(v);
            }
        }

        let word = (sextets[0] << 18) | (sextets[1] << 12) | (sextets[2] << 6) | sextets[3];
        let bytes = [
            ((word >> 16) & 0xff) as u8,
            ((word >> 8) & 0xff) as u8,
            (word & 0xff) as u8,
        ];
        let out_len = 3 - pad_count;
        sink.put_string_chunk(field, &bytes[..out_len])
            .map_err(|e| ParserError::new(ErrorKind::SinkError(e.to_string().into()), pos))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_64_valid_entries() {
        assert_eq!(DECODE_TABLE.iter().filter(|&&v| v >= 0).count(), 64);
    }

    #[test]
    fn table_rejects_non_alphabet_bytes() {
        assert_eq!(DECODE_TABLE[b' ' as usize], -1);
        assert_eq!(DECODE_TABLE[b'=' as usize], -1);
    }

    // Decoding against a real field (including the "hello" worked example
    // from §8) is exercised in `tests/` integration tests, since building a
    // `FieldDescriptor` requires a full `DescriptorPool`.
}
