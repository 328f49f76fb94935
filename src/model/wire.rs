//! Network wire protocol
//!
//! Bridges and the relay exchange plain ASCII lines. A line holding a decimal
//! number is an absolute seek position in seconds, a line holding `true` or
//! `false` is a pause state. The relay never looks inside a line; only the
//! bridges decode them.

use std::fmt;

/// A playback event as carried on the network.
#[derive(Debug, Clone, PartialEq)]
pub enum NetMessage {
    /// Seek to an absolute position, in seconds.
    Seek(f64),
    /// Set the pause state.
    Pause(bool),
    /// Anything else. Receivers log and drop these.
    Unrecognized(String),
}

impl NetMessage {
    /// Decode one line. The trailing newline (and a carriage return, if a
    /// peer sent one) is ignored.
    ///
    /// Decoding is ordered: a number wins over a boolean, and whatever is
    /// left is `Unrecognized`.
    pub fn parse(line: &str) -> NetMessage {
        let text = line.trim_end_matches('\n').trim_end_matches('\r');

        if let Ok(time) = text.parse::<f64>() {
            if time.is_finite() {
                return NetMessage::Seek(time);
            }
        }

        match text {
            "true" => NetMessage::Pause(true),
            "false" => NetMessage::Pause(false),
            _ => NetMessage::Unrecognized(text.to_string()),
        }
    }

    /// Encode as a newline-terminated line, or `None` for `Unrecognized`.
    pub fn encode(&self) -> Option<String> {
        match self {
            NetMessage::Seek(_) | NetMessage::Pause(_) => Some(format!("{self}\n")),
            NetMessage::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for NetMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetMessage::Seek(time) => write!(f, "{time:.6}"),
            NetMessage::Pause(paused) => write!(f, "{paused}"),
            NetMessage::Unrecognized(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_seeks() {
        assert_eq!(NetMessage::parse("12.500000\n"), NetMessage::Seek(12.5));
        assert_eq!(NetMessage::parse("0\n"), NetMessage::Seek(0.0));
        assert_eq!(NetMessage::parse("3.25\r\n"), NetMessage::Seek(3.25));
    }

    #[test]
    fn one_and_zero_are_numbers_not_booleans() {
        assert_eq!(NetMessage::parse("1\n"), NetMessage::Seek(1.0));
        assert_eq!(NetMessage::parse("0\n"), NetMessage::Seek(0.0));
    }

    #[test]
    fn boolean_literals_are_pauses() {
        assert_eq!(NetMessage::parse("true\n"), NetMessage::Pause(true));
        assert_eq!(NetMessage::parse("false\n"), NetMessage::Pause(false));
    }

    #[test]
    fn everything_else_is_unrecognized() {
        assert_eq!(
            NetMessage::parse("hello\n"),
            NetMessage::Unrecognized("hello".into())
        );
        assert_eq!(
            NetMessage::parse("NaN\n"),
            NetMessage::Unrecognized("NaN".into())
        );
        assert_eq!(
            NetMessage::parse("inf\n"),
            NetMessage::Unrecognized("inf".into())
        );
        assert_eq!(NetMessage::parse("\n"), NetMessage::Unrecognized("".into()));
    }

    #[test]
    fn encoding_uses_six_decimals_for_seeks() {
        assert_eq!(
            NetMessage::Seek(12.5).encode().as_deref(),
            Some("12.500000\n")
        );
        assert_eq!(NetMessage::Pause(true).encode().as_deref(), Some("true\n"));
        assert_eq!(NetMessage::Pause(false).encode().as_deref(), Some("false\n"));
        assert_eq!(NetMessage::Unrecognized("x".into()).encode(), None);
    }
}
