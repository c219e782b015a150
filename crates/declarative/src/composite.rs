//! Composite key codec
//!
//! Relation resources (a user's membership in a project, say) have no
//! identifier of their own on the remote side. Their tracked id is the ordered
//! list of parent ids joined with [`DELIMITER`], e.g. `proj-1/user-2`.

use crate::error::{Error, Result};

/// Separator between composite key parts
pub const DELIMITER: char = '/';

/// Join parts into a composite key
///
/// Fails when a part is empty or contains the delimiter, since such a key
/// could not be split back into the same parts.
pub fn encode<S: AsRef<str>>(parts: &[S]) -> Result<String> {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        let part = part.as_ref();
        if part.is_empty() || part.contains(DELIMITER) {
            return Err(Error::Encoding {
                part: part.to_string(),
                delimiter: DELIMITER,
            });
        }
        if i > 0 {
            key.push(DELIMITER);
        }
        key.push_str(part);
    }
    Ok(key)
}

/// Split a composite key into exactly `expected_arity` parts
pub fn decode(key: &str, expected_arity: usize) -> Result<Vec<String>> {
    let parts: Vec<&str> = key.split(DELIMITER).collect();

    if parts.len() != expected_arity || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::MalformedCompositeKey {
            key: key.to_string(),
            expected: expected_arity,
            found: parts.iter().filter(|p| !p.is_empty()).count(),
        });
    }

    Ok(parts.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(&["proj-1", "user-2"]).unwrap(), "proj-1/user-2");
        assert_eq!(encode(&["only"]).unwrap(), "only");
    }

    #[test]
    fn test_encode_rejects_delimiter_in_part() {
        let err = encode(&["team/a", "user-2"]).unwrap_err();
        assert!(matches!(err, Error::Encoding { ref part, .. } if part == "team/a"));
    }

    #[test]
    fn test_encode_rejects_empty_part() {
        assert!(encode(&["", "user-2"]).is_err());
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("proj-1/user-2", 2).unwrap(), vec!["proj-1", "user-2"]);
    }

    #[test]
    fn test_decode_arity_mismatch() {
        let err = decode("a/b", 3).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCompositeKey {
                expected: 3,
                found: 2,
                ..
            }
        ));

        assert!(matches!(
            decode("a/b/c", 2),
            Err(Error::MalformedCompositeKey { found: 3, .. })
        ));
        assert!(decode("proj-1", 2).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_key() {
        assert!(decode("proj-1/", 2).is_err());
        assert!(decode("/user-2", 2).is_err());
    }

    #[test]
    fn test_round_trip() {
        for parts in [
            vec!["a", "b"],
            vec!["proj-1", "user-2", "role:admin"],
            vec!["x"],
        ] {
            let key = encode(&parts).unwrap();
            assert_eq!(decode(&key, parts.len()).unwrap(), parts);
        }
    }
}
