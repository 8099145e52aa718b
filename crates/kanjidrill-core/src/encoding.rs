// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Best-effort detection of the byte encoding of an uploaded CSV file.
//!
//! Only two outcomes are distinguished: UTF-8 and Shift_JIS. The classifier
//! never fails, and it can be wrong: a UTF-8 file containing four-byte
//! sequences (emoji, rare ideographs) looks like Shift_JIS, and a Shift_JIS
//! file whose data happens to form valid UTF-8 looks like UTF-8. A wrong guess
//! shows up downstream as garbled text, never as an error.

use std::fmt::Display;
use std::fmt::Formatter;

use encoding_rs::Encoding;
use encoding_rs::SHIFT_JIS;
use encoding_rs::UTF_8;


/// The UTF-8 byte order mark.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncodingTag {
    Utf8,
    /// Shift_JIS, the legacy double-byte encoding.
    LegacyDbcs,
}

impl EncodingTag {
    pub fn encoding(self) -> &'static Encoding {
        match self {
            EncodingTag::Utf8 => UTF_8,
            EncodingTag::LegacyDbcs => SHIFT_JIS,
        }
    }
}

impl Display for EncodingTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encoding().name())
    }
}

/// Guess the encoding of `bytes`.
pub fn detect(bytes: &[u8]) -> EncodingTag {
    if bytes.starts_with(&UTF8_BOM) {
        return EncodingTag::Utf8;
    }
    // The header row is ASCII in both encodings, so only the data is scanned.
    let data = match skip_first_line(bytes) {
        Some(data) => data,
        None => return EncodingTag::LegacyDbcs,
    };
    if scan_is_utf8(data) {
        EncodingTag::Utf8
    } else {
        EncodingTag::LegacyDbcs
    }
}

/// Return everything after the first line terminator, or `None` if there is
/// no terminator at all.
fn skip_first_line(bytes: &[u8]) -> Option<&[u8]> {
    let pos = bytes.iter().position(|&b| b == b'\n' || b == b'\r')?;
    let end = if bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n') {
        pos + 2
    } else {
        pos + 1
    };
    Some(&bytes[end..])
}

fn is_continuation(b: u8) -> bool {
    (0x80..=0xBF).contains(&b)
}

fn is_legacy_lead(b: u8) -> bool {
    (0x81..=0x9F).contains(&b) || (0xE0..=0xFC).contains(&b)
}

fn is_legacy_trail(b: u8) -> bool {
    (0x40..=0x7E).contains(&b) || (0x80..=0xFC).contains(&b)
}

/// Walk the data byte by byte. The first byte pattern that is not well-formed
/// one-, two- or three-byte UTF-8 decides against UTF-8.
fn scan_is_utf8(data: &[u8]) -> bool {
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        let next = data.get(i + 1).copied();
        let after = data.get(i + 2).copied();
        if b <= 0x7F {
            i += 1;
            continue;
        }
        if (0xC0..=0xDF).contains(&b) && next.is_some_and(is_continuation) {
            i += 2;
            continue;
        }
        if (0xE0..=0xEF).contains(&b)
            && next.is_some_and(is_continuation)
            && after.is_some_and(is_continuation)
        {
            i += 3;
            continue;
        }
        if is_legacy_lead(b) && next.is_some_and(is_legacy_trail) {
            log::debug!("Legacy double-byte pair at data offset {i}");
        }
        return false;
    }
    true
}

/// Decode `bytes` under the detected encoding.
///
/// A leading BOM is stripped. Malformed sequences become U+FFFD, so a wrong
/// guess yields garbled rows instead of a failed import.
pub fn decode(bytes: &[u8]) -> (EncodingTag, String) {
    let tag = detect(bytes);
    log::debug!("Detected encoding: {tag}");
    let body = match tag {
        EncodingTag::Utf8 => bytes.strip_prefix(&UTF8_BOM[..]).unwrap_or(bytes),
        EncodingTag::LegacyDbcs => bytes,
    };
    let (text, had_errors) = tag.encoding().decode_without_bom_handling(body);
    if had_errors {
        log::warn!("Malformed {tag} sequences were replaced while decoding.");
    }
    (tag, text.into_owned())
}
