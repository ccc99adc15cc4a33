//! Stdin decoding for piped prompts.
//!
//! Detects BOMs for UTF-8 and both UTF-16 orders, plus a heuristic for
//! BOM-less UTF-16LE (PowerShell piping to a native executable often emits
//! that). Everything else is read as UTF-8, lossily.

use std::io::{self, IsTerminal as _, Read as _};

/// Read all of stdin when it is piped; a terminal yields an empty string.
pub fn read_all_stdin() -> io::Result<String> {
  let mut stdin = io::stdin();
  if stdin.is_terminal() {
    return Ok(String::new());
  }
  let mut buf = Vec::new();
  stdin.read_to_end(&mut buf)?;
  Ok(decode(&buf))
}

/// Decode raw piped bytes into text.
pub fn decode(buf: &[u8]) -> String {
  if buf.is_empty() {
    return String::new();
  }
  if buf.starts_with(&[0xef, 0xbb, 0xbf]) {
    return String::from_utf8_lossy(&buf[3..]).into_owned();
  }
  if buf.starts_with(&[0xff, 0xfe]) {
    return decode_utf16::<true>(&buf[2..]);
  }
  if buf.starts_with(&[0xfe, 0xff]) {
    return decode_utf16::<false>(&buf[2..]);
  }
  if looks_like_utf16le(buf) {
    return decode_utf16::<true>(buf);
  }
  String::from_utf8_lossy(buf).into_owned()
}

fn decode_utf16<const LE: bool>(buf: &[u8]) -> String {
  let units: Vec<u16> = buf
    .chunks_exact(2)
    .map(|pair| {
      if LE {
        u16::from_le_bytes([pair[0], pair[1]])
      } else {
        u16::from_be_bytes([pair[0], pair[1]])
      }
    })
    .collect();
  String::from_utf16_lossy(&units)
}

/// UTF-16LE ASCII text carries 0x00 in the odd byte positions. For short
/// samples the odd/even distribution is checked; longer samples just count
/// zero bytes.
fn looks_like_utf16le(buf: &[u8]) -> bool {
  let sample = &buf[..buf.len().min(256)];

  if sample.len() <= 64 {
    let mut odd_zeros = 0usize;
    let mut odd_total = 0usize;
    let mut even_zeros = 0usize;
    let mut even_total = 0usize;
    for (i, byte) in sample.iter().enumerate() {
      if i % 2 == 0 {
        even_total += 1;
        if *byte == 0 {
          even_zeros += 1;
        }
      } else {
        odd_total += 1;
        if *byte == 0 {
          odd_zeros += 1;
        }
      }
    }
    if odd_total == 0 {
      return false;
    }
    let odd_ratio = odd_zeros as f64 / odd_total as f64;
    let even_ratio = if even_total > 0 {
      even_zeros as f64 / even_total as f64
    } else {
      0.0
    };
    odd_ratio > 0.6 && even_ratio < 0.2
  } else {
    let zeros = sample.iter().filter(|byte| **byte == 0).count();
    zeros as f64 / sample.len() as f64 > 0.2
  }
}
