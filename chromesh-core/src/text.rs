//! Token-level parsers shared by the line-oriented formats
use nom::{
    branch::alt,
    character::complete::{multispace0, multispace1},
    combinator::{eof, peek},
    number::complete::float,
    IResult,
};

use crate::error::{IngestError, Result};

/// One whitespace-delimited float; the token must end at whitespace or EOF
fn coordinate(input: &str) -> IResult<&str, f32> {
    let (input, _) = multispace0(input)?;
    let (input, value) = float(input)?;
    let (input, _) = peek(alt((multispace1, eof)))(input)?;
    Ok((input, value))
}

fn vector3(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, x) = coordinate(input)?;
    let (input, y) = coordinate(input)?;
    let (input, z) = coordinate(input)?;
    Ok((input, [x, y, z]))
}

/// Parse the three leading coordinates of `input`, ignoring any trailing tokens
pub(crate) fn parse_vector3(input: &str, line: usize) -> Result<[f32; 3]> {
    match vector3(input) {
        Ok((_, v)) if v.iter().all(|c| c.is_finite()) => Ok(v),
        Ok(_) => Err(IngestError::at_line(
            line,
            format!("non-finite coordinate in '{}'", input.trim()),
        )),
        Err(_) => Err(IngestError::at_line(
            line,
            format!("expected three numeric coordinates, found '{}'", input.trim()),
        )),
    }
}

/// Split off a leading keyword that must be followed by whitespace.
///
/// `"v 1 2 3"` with keyword `"v"` gives `Some("1 2 3")`, while `"vn 0 0 1"`
/// gives `None`.
pub(crate) fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(|c: char| c.is_whitespace()) {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector3_ignores_extra_tokens() {
        assert_eq!(parse_vector3(" 1 -2.5 3e2 1.0", 1).unwrap(), [1.0, -2.5, 300.0]);
    }

    #[test]
    fn test_parse_vector3_rejects_garbage() {
        assert!(parse_vector3("1 2", 3).is_err());
        assert!(parse_vector3("1 2x 3", 3).is_err());
        let err = parse_vector3("a b c", 9).unwrap_err();
        assert!(err.to_string().contains("line 9"));
    }

    #[test]
    fn test_parse_vector3_rejects_non_finite() {
        for input in ["nan 0 0", "0 inf 0", "0 0 -infinity"] {
            let err = parse_vector3(input, 4).unwrap_err();
            assert!(err.to_string().contains("line 4"), "{}", input);
            assert!(err.to_string().contains("non-finite"), "{}", input);
        }
    }

    #[test]
    fn test_strip_keyword() {
        assert_eq!(strip_keyword("v 1 2 3", "v"), Some(" 1 2 3"));
        assert_eq!(strip_keyword("v\t1 2 3", "v"), Some("\t1 2 3"));
        assert_eq!(strip_keyword("vn 0 0 1", "v"), None);
        assert_eq!(strip_keyword("v", "v"), None);
    }
}
