//! SASL mechanisms offered in Start-Ok.

use std::fmt;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::FieldTable;

/// Authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthMechanism {
    /// Username and password in one NUL-separated blob
    Plain,
    /// Username and password as a field table
    AmqPlain,
    /// Identity established by the transport (client certificate)
    External,
}

impl AuthMechanism {
    /// Name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::AmqPlain => "AMQPLAIN",
            Self::External => "EXTERNAL",
        }
    }

    /// First mechanism in `preferred` that the server lists in its
    /// space-separated `offered` string.
    pub fn select(preferred: &[AuthMechanism], offered: &str) -> Option<AuthMechanism> {
        preferred
            .iter()
            .copied()
            .find(|mech| offered.split_whitespace().any(|o| o == mech.as_str()))
    }

    /// SASL response for this mechanism
    pub fn response(&self, username: &str, password: &str) -> Bytes {
        match self {
            Self::Plain => {
                let mut buf = Vec::with_capacity(username.len() + password.len() + 2);
                buf.push(0);
                buf.extend_from_slice(username.as_bytes());
                buf.push(0);
                buf.extend_from_slice(password.as_bytes());
                Bytes::from(buf)
            },
            Self::AmqPlain => {
                // Table entries without the leading length
                let table = FieldTable::new()
                    .with("LOGIN", username)
                    .with("PASSWORD", password);
                let mut buf = BytesMut::new();
                table.encode_entries(&mut buf);
                buf.freeze()
            },
            Self::External => Bytes::new(),
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "AMQPLAIN" => Ok(Self::AmqPlain),
            "EXTERNAL" => Ok(Self::External),
            other => Err(format!("unknown auth mechanism: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_follows_client_preference() {
        let preferred = [AuthMechanism::AmqPlain, AuthMechanism::Plain];
        assert_eq!(
            AuthMechanism::select(&preferred, "PLAIN AMQPLAIN"),
            Some(AuthMechanism::AmqPlain)
        );
        assert_eq!(
            AuthMechanism::select(&preferred, "PLAIN EXTERNAL"),
            Some(AuthMechanism::Plain)
        );
    }

    #[test]
    fn test_select_no_common_mechanism() {
        assert_eq!(
            AuthMechanism::select(&[AuthMechanism::Plain], "EXTERNAL"),
            None
        );
        assert_eq!(AuthMechanism::select(&[AuthMechanism::Plain], ""), None);
    }

    #[test]
    fn test_select_requires_whole_word() {
        // "PLAIN" must not match inside "AMQPLAIN"
        assert_eq!(
            AuthMechanism::select(&[AuthMechanism::Plain], "AMQPLAIN"),
            None
        );
    }

    #[test]
    fn test_plain_response() {
        let response = AuthMechanism::Plain.response("guest", "secret");
        assert_eq!(&response[..], b"\0guest\0secret");
    }

    #[test]
    fn test_amqplain_response() {
        let response = AuthMechanism::AmqPlain.response("u", "p");
        // "LOGIN" S "u" then "PASSWORD" S "p", keys in sorted order
        let mut expected = Vec::new();
        expected.push(5);
        expected.extend_from_slice(b"LOGIN");
        expected.push(b'S');
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.push(b'u');
        expected.push(8);
        expected.extend_from_slice(b"PASSWORD");
        expected.push(b'S');
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.push(b'p');
        assert_eq!(&response[..], &expected[..]);
    }

    #[test]
    fn test_external_response_is_empty() {
        assert!(AuthMechanism::External.response("u", "p").is_empty());
    }

    #[test]
    fn test_parse() {
        assert_eq!("plain".parse::<AuthMechanism>(), Ok(AuthMechanism::Plain));
        assert_eq!(
            "AMQPLAIN".parse::<AuthMechanism>(),
            Ok(AuthMechanism::AmqPlain)
        );
        assert!("CRAM-MD5".parse::<AuthMechanism>().is_err());
    }
}
