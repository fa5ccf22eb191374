use std::fmt;

/// Text held in the device's native 16-bit representation (UTF-16, big-endian).
///
/// Strings are stored exactly as the modem layer expects to consume them, so
/// every Rust string survives an encode/decode round trip unchanged.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct UnicodeText(Vec<u8>);

impl UnicodeText {
    pub fn encode(text: &str) -> Self {
        let bytes = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        UnicodeText(bytes)
    }

    /// Decodes back to a `String`. Unpaired surrogates become U+FFFD.
    pub fn decode(&self) -> String {
        let units = self
            .0
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

}

impl fmt::Display for UnicodeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decode())
    }
}

impl fmt::Debug for UnicodeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnicodeText({:?})", self.decode())
    }
}
