//! Message framing for the agent protocol.
//!
//! A message is an ASCII header terminated by a NUL byte (or a newline),
//! optionally followed by a raw attachment. The attachment length is not
//! carried in a separate field: the header itself ends with
//! `attach <count>`, and exactly `<count>` bytes follow the terminator.
//!
//! ```text
//! <header-text> attach <count>\0<count bytes of attachment>
//! ```
//!
//! [`find_marker`] recognises the trailing marker in a received header and
//! truncates the header in place. [`encode_message`] builds a well-formed
//! message for transmission.

use crate::error::{CommError, Result};

/// Keyword announcing an attachment.
pub const MARKER_KEYWORD: &[u8; 6] = b"attach";

/// Buffers shorter than this cannot hold a marker.
pub const MIN_MARKER_LEN: usize = 9;

/// Index of the last byte of [`MARKER_KEYWORD`] must be at least this large,
/// leaving room for one header byte and the separator before the keyword.
const MIN_KEYWORD_END: usize = 7;

/// Location and size of an attachment announced by a header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentMarker {
    /// Index of the NUL written over the byte before the keyword; the
    /// logical header is `buf[..header_end]`.
    pub header_end: usize,
    /// Number of attachment bytes that follow the header terminator.
    pub len: usize,
}

/// C `isspace` in the "C" locale.
const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Detect a trailing `attach <count>` marker in a received header.
///
/// `buf` holds the header including its terminator. Scanning runs backward
/// from the end: an optional trailing NUL, optional whitespace, a run of
/// decimal digits, whitespace, then the keyword `attach`. On a match the
/// byte immediately before the keyword is overwritten with NUL, truncating
/// the logical header, and the announced length is returned.
///
/// Any mismatch yields `None` and leaves `buf` untouched. Counts that do
/// not fit in `usize` are treated as no marker.
///
/// # Examples
///
/// ```
/// use agentwire::frame::find_marker;
///
/// let mut header = *b"status 0 attach 1234\0";
/// let marker = find_marker(&mut header).expect("marker present");
/// assert_eq!(marker.len, 1234);
/// assert_eq!(&header[..marker.header_end], b"status 0");
///
/// let mut plain = *b"hello world\0";
/// assert_eq!(find_marker(&mut plain), None);
/// ```
#[must_use]
pub fn find_marker(buf: &mut [u8]) -> Option<AttachmentMarker> {
    if buf.len() < MIN_MARKER_LEN {
        return None;
    }

    let mut pos = buf.len() - 1;
    if buf[pos] == 0 {
        pos -= 1;
    }

    while is_space(buf[pos]) {
        pos -= 1;
        if pos == 0 {
            return None;
        }
    }

    if !buf[pos].is_ascii_digit() {
        return None;
    }
    let digits_end = pos + 1;

    while buf[pos].is_ascii_digit() {
        if pos == 0 {
            return None;
        }
        pos -= 1;
    }

    if !is_space(buf[pos]) || pos == 0 {
        return None;
    }
    let digits_start = pos + 1;

    pos -= 1;
    while is_space(buf[pos]) {
        pos -= 1;
        if pos == 0 {
            return None;
        }
    }

    if pos < MIN_KEYWORD_END {
        return None;
    }

    let keyword_start = pos + 1 - MARKER_KEYWORD.len();
    if &buf[keyword_start..=pos] != MARKER_KEYWORD {
        return None;
    }

    let len = parse_count(&buf[digits_start..digits_end])?;
    let header_end = keyword_start - 1;
    buf[header_end] = 0;

    Some(AttachmentMarker { header_end, len })
}

fn parse_count(digits: &[u8]) -> Option<usize> {
    digits.iter().try_fold(0usize, |acc, digit| {
        acc.checked_mul(10)?.checked_add(usize::from(digit - b'0'))
    })
}

/// Build a NUL-terminated message, appending an attachment marker and the
/// attachment bytes when `attachment` is given.
///
/// The encoded header is checked with [`find_marker`] so that the peer
/// sees exactly the framing that was intended.
///
/// # Errors
///
/// Returns [`CommError::InvalidArgument`] if `header` contains a NUL or a
/// newline, if a header sent without attachment already ends with a
/// marker (the peer would wait for attachment bytes that never arrive), or
/// if a header sent with an attachment is too short for the marker to be
/// recognised.
///
/// # Examples
///
/// ```
/// use agentwire::frame::encode_message;
///
/// let wire = encode_message("put /tmp/file", Some(&b"HELLO"[..])).expect("valid header");
/// assert_eq!(wire, b"put /tmp/file attach 5\0HELLO");
///
/// let wire = encode_message("ping", None).expect("valid header");
/// assert_eq!(wire, b"ping\0");
///
/// assert!(encode_message("", Some(&b"HELLO"[..])).is_err());
/// ```
pub fn encode_message(header: &str, attachment: Option<&[u8]>) -> Result<Vec<u8>> {
    if header.bytes().any(|b| b == 0 || b == b'\n') {
        return Err(CommError::InvalidArgument(
            "header must not contain NUL or newline",
        ));
    }

    let Some(attachment) = attachment else {
        let mut wire = Vec::with_capacity(header.len() + 1);
        wire.extend_from_slice(header.as_bytes());
        wire.push(0);
        if find_marker(&mut wire.clone()).is_some() {
            return Err(CommError::InvalidArgument(
                "header without attachment ends with an attachment marker",
            ));
        }
        return Ok(wire);
    };

    let marker = format!(" attach {}", attachment.len());
    let mut wire = Vec::with_capacity(header.len() + marker.len() + 1 + attachment.len());
    wire.extend_from_slice(header.as_bytes());
    wire.extend_from_slice(marker.as_bytes());
    wire.push(0);

    let expected = AttachmentMarker {
        header_end: header.len(),
        len: attachment.len(),
    };
    if find_marker(&mut wire.clone()) != Some(expected) {
        return Err(CommError::InvalidArgument(
            "header is too short to carry an attachment marker",
        ));
    }

    wire.extend_from_slice(attachment);
    Ok(wire)
}
