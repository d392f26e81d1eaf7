//! Character set detection for plain text inputs.

use encoding_rs::{Encoding, GB18030, UTF_8, WINDOWS_1252};
use log::debug;

/// Decoded text plus the encoding it was read with
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub had_bom: bool,
}

/// Decode bytes: BOM first, then strict UTF-8, then GB18030, then windows-1252.
///
/// Line endings are normalised to `\n`.
pub fn decode(bytes: &[u8]) -> DecodedText {
    let (text, encoding, had_bom) = if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        (text.into_owned(), encoding, true)
    } else if let Ok(text) = std::str::from_utf8(bytes) {
        (text.to_string(), UTF_8, false)
    } else {
        let (text, had_errors) = GB18030.decode_without_bom_handling(bytes);
        if had_errors {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text.into_owned(), WINDOWS_1252, false)
        } else {
            (text.into_owned(), GB18030, false)
        }
    };
    debug!("Decoded {} bytes as {}", bytes.len(), encoding.name());

    DecodedText {
        text: normalize_newlines(&text),
        encoding,
        had_bom,
    }
}

pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
