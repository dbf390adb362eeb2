//! Number parser (design §4.5): converts the accumulated text of a JSON
//! number literal into the scalar type declared by the target field.
//!
//! Integer fields reject exponent notation (`1e6`) even though JSON permits
//! it for numbers in general — an acknowledged limitation (§9) that must be
//! preserved rather than "fixed": this implementation rejects the same
//! inputs the grounding source does, no more and no less.

use prost_reflect::{FieldDescriptor, Kind};

use crate::error::{ErrorKind, ParserError};

/// The decoded scalar value of a number literal, already coerced to the
/// target field's declared type.
pub(crate) enum Number {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

fn is_integer_kind(kind: &Kind) -> bool {
    matches!(
        kind,
        Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Fixed32
            | Kind::Fixed64
            | Kind::Sfixed32
            | Kind::Sfixed64
    )
}

/// Parses `text` (the accumulated number literal, UTF-8 since the JSON
/// grammar restricts it to ASCII digits/`-`/`.`/`e`/`E`/`+`) per the target
/// field's kind.
pub(crate) fn parse(text: &[u8], field: &FieldDescriptor, pos: usize) -> Result<Number, ParserError> {
    let kind = field.kind();
    let s = core::str::from_utf8(text)
        .map_err(|_| ParserError::new(ErrorKind::NumberParseError(field.name().into()), pos))?;

    if is_integer_kind(&kind) && (s.contains(['e', 'E', '.'])) {
        return Err(ParserError::new(
            ErrorKind::NumberParseError(field.name().into()),
            pos,
        ));
    }

    let err_parse = || ParserError::new(ErrorKind::NumberParseError(field.name().into()), pos);
    let err_range = || ParserError::new(ErrorKind::NumberOutOfRange(field.name().into()), pos);

    match kind {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            let v: i64 = s.parse().map_err(|_| err_parse())?;
            let v = i32::try_from(v).map_err(|_| err_range())?;
            Ok(Number::I32(v))
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            let v: i64 = s.parse().map_err(|_| err_parse())?;
            Ok(Number::I64(v))
        }
        Kind::Uint32 | Kind::Fixed32 => {
            let v: u64 = s.parse().map_err(|_| err_parse())?;
            let v = u32::try_from(v).map_err(|_| err_range())?;
            Ok(Number::U32(v))
        }
        Kind::Uint64 | Kind::Fixed64 => {
            let v: u64 = s.parse().map_err(|_| err_parse())?;
            Ok(Number::U64(v))
        }
        Kind::Float => {
            let v: f64 = s.parse().map_err(|_| err_parse())?;
            if v.is_finite() && (v as f32).is_infinite() {
                return Err(err_range());
            }
            Ok(Number::F32(v as f32))
        }
        Kind::Double => {
            let v: f64 = s.parse().map_err(|_| err_parse())?;
            Ok(Number::F64(v))
        }
        _ => Err(ParserError::new(
            ErrorKind::NumberParseError(field.name().into()),
            pos,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_kind_detection() {
        assert!(is_integer_kind(&Kind::Int32));
        assert!(!is_integer_kind(&Kind::Double));
        assert!(!is_integer_kind(&Kind::String));
    }
}
