use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::{DecodeError, Result};
use crate::length::read_u8;
use crate::{HASH_MARKER, PASSWORD_HASH_LEN};

/// Server release that wrote the table; decides the width of the fixed
/// prefix in front of the host column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerVersion {
    /// 5.0 and 5.1
    Legacy,
    /// 5.5 and everything after
    #[default]
    Current,
}

impl ServerVersion {
    pub fn host_length_offset(self) -> usize {
        match self {
            ServerVersion::Legacy => 2,
            ServerVersion::Current => 3,
        }
    }
}

impl FromStr for ServerVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "5.0" | "5.1" => ServerVersion::Legacy,
            _ => ServerVersion::Current,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerVersion::Legacy => write!(f, "5.0/5.1"),
            ServerVersion::Current => write!(f, "5.5+"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub account: String,
    /// Empty when the row carries no `*`-prefixed hash.
    pub password_hash: String,
}

fn malformed(reason: impl Into<String>) -> DecodeError {
    DecodeError::MalformedRow {
        reason: reason.into(),
    }
}

// Single-byte-per-character columns.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// The 40 bytes after the last `*`, or `None` when the row has no marker.
/// A last marker with a short tail behind it fails the row.
fn last_password_hash(tail: &[u8]) -> Result<Option<&[u8]>> {
    let Some(marker) = tail.iter().rposition(|&byte| byte == HASH_MARKER) else {
        return Ok(None);
    };
    let begin = marker + 1;
    tail.get(begin..begin + PASSWORD_HASH_LEN)
        .map(Some)
        .ok_or_else(|| {
            malformed(format!(
                "password hash after marker at tail byte {marker} has {} of {PASSWORD_HASH_LEN} bytes",
                tail.len() - begin
            ))
        })
}

/// Pull the account name and password hash out of an assembled `user` table row.
///
/// Returns `Ok(None)` for rows with an empty account name.
pub fn extract(row: &[u8], version: ServerVersion) -> Result<Option<Credential>> {
    let host_len_at = version.host_length_offset();
    let host_len = read_u8(row, host_len_at)
        .map_err(|_| malformed(format!("no host length at byte {host_len_at}")))?;

    let user_len_at = host_len_at + usize::from(host_len) + 1;
    let user_len = read_u8(row, user_len_at)
        .map_err(|_| malformed(format!("no user length at byte {user_len_at}")))?;
    if user_len == 0 {
        return Ok(None);
    }

    let user_begin = user_len_at + 1;
    let user_end = user_begin + usize::from(user_len);
    let account = row.get(user_begin..user_end).ok_or_else(|| {
        malformed(format!(
            "user name of {user_len} bytes at byte {user_begin} overruns {}-byte row",
            row.len()
        ))
    })?;

    let password_hash = last_password_hash(&row[user_end..])?
        .map(latin1)
        .unwrap_or_default();

    Ok(Some(Credential {
        account: latin1(account),
        password_hash,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_A: &[u8; 40] = b"81F5E21E35407D884A6CD4A731AEBFB6AF209E1B";
    const HASH_B: &[u8; 40] = b"2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19";

    fn row(prefix: usize, host: &[u8], user: &[u8], tail: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; prefix];
        bytes.push(host.len() as u8);
        bytes.extend_from_slice(host);
        bytes.push(user.len() as u8);
        bytes.extend_from_slice(user);
        bytes.extend_from_slice(tail);
        bytes
    }

    #[test]
    fn version_selects_prefix_width() {
        assert_eq!("5.0".parse::<ServerVersion>().unwrap(), ServerVersion::Legacy);
        assert_eq!("5.1".parse::<ServerVersion>().unwrap(), ServerVersion::Legacy);
        assert_eq!("5.5".parse::<ServerVersion>().unwrap(), ServerVersion::Current);
        assert_eq!("8.0".parse::<ServerVersion>().unwrap(), ServerVersion::Current);
        assert_eq!(ServerVersion::default(), ServerVersion::Current);
        assert_eq!(ServerVersion::Legacy.host_length_offset(), 2);
        assert_eq!(ServerVersion::Current.host_length_offset(), 3);
    }

    #[test]
    fn extracts_root_from_legacy_row() {
        let filler = [b'A'; 40];
        let mut tail = vec![HASH_MARKER];
        tail.extend_from_slice(&filler);
        let bytes = row(2, b"", b"root", &tail);

        let credential = extract(&bytes, ServerVersion::Legacy).unwrap().unwrap();
        assert_eq!(credential.account, "root");
        assert_eq!(credential.password_hash, "A".repeat(40));
    }

    #[test]
    fn skips_host_column() {
        let mut tail = b"\x01\x02*".to_vec();
        tail.extend_from_slice(HASH_A);
        tail.extend_from_slice(b"\x01\x01\x02");
        let bytes = row(3, b"localhost", b"admin", &tail);

        let credential = extract(&bytes, ServerVersion::Current).unwrap().unwrap();
        assert_eq!(credential.account, "admin");
        assert_eq!(credential.password_hash.as_bytes(), HASH_A);
    }

    #[test]
    fn last_marker_wins() {
        let mut tail = vec![HASH_MARKER];
        tail.extend_from_slice(HASH_A);
        tail.push(HASH_MARKER);
        tail.extend_from_slice(HASH_B);
        let bytes = row(3, b"%", b"app", &tail);

        let credential = extract(&bytes, ServerVersion::Current).unwrap().unwrap();
        assert_eq!(credential.password_hash.as_bytes(), HASH_B);
    }

    #[test]
    fn short_hash_after_last_marker_fails_row() {
        let mut tail = vec![HASH_MARKER];
        tail.extend_from_slice(HASH_A);
        tail.extend_from_slice(b"*xyz");
        let bytes = row(3, b"%", b"app", &tail);

        assert!(matches!(
            extract(&bytes, ServerVersion::Current),
            Err(DecodeError::MalformedRow { .. })
        ));
    }

    #[test]
    fn marker_at_row_end_fails_row() {
        let bytes = row(3, b"%", b"app", b"\x01*");
        assert!(matches!(
            extract(&bytes, ServerVersion::Current),
            Err(DecodeError::MalformedRow { .. })
        ));
    }

    #[test]
    fn missing_hash_is_empty() {
        let bytes = row(3, b"%", b"nopass", b"\x01\x02\x01");
        let credential = extract(&bytes, ServerVersion::Current).unwrap().unwrap();
        assert_eq!(credential.account, "nopass");
        assert!(credential.password_hash.is_empty());
    }

    #[test]
    fn empty_account_is_absent() {
        let bytes = row(3, b"localhost", b"", b"*");
        assert_eq!(extract(&bytes, ServerVersion::Current).unwrap(), None);
    }

    #[test]
    fn short_rows_are_malformed() {
        assert!(matches!(
            extract(&[0, 0], ServerVersion::Current),
            Err(DecodeError::MalformedRow { .. })
        ));
        // host length points past the end
        assert!(matches!(
            extract(&[0, 0, 0, 9, b'h'], ServerVersion::Current),
            Err(DecodeError::MalformedRow { .. })
        ));
        // user name longer than the row
        assert!(matches!(
            extract(&[0, 0, 0, 0, 8, b'r', b'o'], ServerVersion::Current),
            Err(DecodeError::MalformedRow { .. })
        ));
    }

    #[test]
    fn bytes_decode_one_char_each() {
        let bytes = row(3, b"", &[b'j', 0xE9, b'r'], b"");
        let credential = extract(&bytes, ServerVersion::Current).unwrap().unwrap();
        assert_eq!(credential.account, "j\u{e9}r");
    }
}
