//! SMTP reply parsing.

use super::error::{ClientError, Result};

/// A complete, possibly multi-line, SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The three digit reply code.
    pub code: u16,
    /// Text of every line, without the code and separator.
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// All lines joined with newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, 200..=299)
    }

    /// 3xx, e.g. `354` after DATA.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        matches!(self.code, 300..=399)
    }

    /// Turns a reply into an error unless `accept` holds for it.
    pub(crate) fn require(self, command: &'static str, accept: fn(&Self) -> bool) -> Result<Self> {
        if accept(&self) {
            Ok(self)
        } else {
            Err(ClientError::Rejected {
                command,
                code: self.code,
                message: self.message(),
            })
        }
    }

    /// Parses `NNN<sep>text` where `sep` is `-` for continuation lines and
    /// a space (or nothing) for the final line.
    fn parse_line(line: &str) -> Result<(u16, bool, &str)> {
        let code = line
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ClientError::ParseError(format!("Invalid reply line: '{line}'")))?
            .parse::<u16>()
            .map_err(|e| ClientError::ParseError(e.to_string()))?;

        match line.as_bytes().get(3) {
            None => Ok((code, true, "")),
            Some(b' ') => Ok((code, true, &line[4..])),
            Some(b'-') => Ok((code, false, &line[4..])),
            Some(other) => Err(ClientError::ParseError(format!(
                "Invalid separator '{}' in reply line: '{line}'",
                char::from(*other)
            ))),
        }
    }

    /// Parses one complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes it occupied, or `None`
    /// when the buffer does not yet hold a complete reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if a line is malformed or the
    /// lines of a multi-line reply disagree on the code.
    pub fn parse(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        while let Some(end) = buffer[consumed..].iter().position(|b| *b == b'\n') {
            let raw = std::str::from_utf8(&buffer[consumed..consumed + end])?;
            consumed += end + 1;

            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }

            let (line_code, last, text) = Self::parse_line(raw)?;
            match code {
                Some(code) if code != line_code => {
                    return Err(ClientError::ParseError(format!(
                        "Reply code changed mid-reply: expected {code}, got {line_code}"
                    )));
                }
                _ => code = Some(line_code),
            }

            lines.push(text.to_string());

            if last {
                return Ok(Some((Self::new(line_code, lines), consumed)));
            }
        }

        Ok(None)
    }
}
