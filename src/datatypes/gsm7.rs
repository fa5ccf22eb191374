// ABOUTME: GSM 03.38 default alphabet mapping and 7-bit septet packing for SMS user data
// ABOUTME: Converts text to septets (with the escape extension table) and packs them into octets

/// Escape septet that introduces a character from the extension table.
pub const ESCAPE: u8 = 0x1B;

/// Septet sent in place of characters the default alphabet cannot carry.
pub const REPLACEMENT: u8 = 0x3F;

/// Maximum number of septets in a single SMS-SUBMIT user data field.
pub const MAX_SEPTETS: usize = 160;

#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const EXTENSION: [(char, u8); 10] = [
    ('\u{0C}', 0x0A),
    ('^', 0x14),
    ('{', 0x28),
    ('}', 0x29),
    ('\\', 0x2F),
    ('[', 0x3C),
    ('~', 0x3D),
    (']', 0x3E),
    ('|', 0x40),
    ('€', 0x65),
];

fn basic_septet(c: char) -> Option<u8> {
    if c == '\u{1B}' {
        return None;
    }
    BASIC.iter().position(|&b| b == c).map(|i| i as u8)
}

fn extension_septet(c: char) -> Option<u8> {
    EXTENSION
        .iter()
        .find(|(ext, _)| *ext == c)
        .map(|(_, septet)| *septet)
}

/// Maps text to unpacked septets. Unsupported characters become `?`.
pub fn to_septets(text: &str) -> Vec<u8> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(septet) = basic_septet(c) {
            septets.push(septet);
        } else if let Some(septet) = extension_septet(c) {
            septets.push(ESCAPE);
            septets.push(septet);
        } else {
            septets.push(REPLACEMENT);
        }
    }
    septets
}

/// Maps unpacked septets back to text.
pub fn from_septets(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(septet) = iter.next() {
        if septet == ESCAPE {
            match iter.next() {
                Some(code) => {
                    let c = EXTENSION
                        .iter()
                        .find(|(_, ext)| *ext == code)
                        .map(|(c, _)| *c)
                        .unwrap_or(' ');
                    text.push(c);
                }
                None => text.push(' '),
            }
        } else {
            text.push(BASIC[(septet & 0x7F) as usize]);
        }
    }
    text
}

/// Packs septets into octets, least significant bit first.
pub fn pack(septets: &[u8]) -> Vec<u8> {
    let mut octets = Vec::with_capacity((septets.len() * 7).div_ceil(8));
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &septet in septets {
        acc |= u32::from(septet & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            octets.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }

    if bits > 0 {
        octets.push(acc as u8);
    }

    octets
}

/// Unpacks `count` septets from packed octets.
pub fn unpack(octets: &[u8], count: usize) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &octet in octets {
        acc |= u32::from(octet) << bits;
        bits += 8;
        while bits >= 7 && septets.len() < count {
            septets.push((acc & 0x7F) as u8);
            acc >>= 7;
            bits -= 7;
        }
    }

    septets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_hellohello() {
        let packed = pack(&to_septets("hellohello"));
        assert_eq!(hex::encode_upper(&packed), "E8329BFD4697D9EC37");
    }

    #[test]
    fn unpack_reverses_pack() {
        let text = "Hello, world! @£$ 123";
        let septets = to_septets(text);
        let packed = pack(&septets);
        let unpacked = unpack(&packed, septets.len());
        assert_eq!(from_septets(&unpacked), text);
    }

    #[test]
    fn extension_characters_take_two_septets() {
        assert_eq!(to_septets("€"), vec![ESCAPE, 0x65]);
        assert_eq!(to_septets("{x}"), vec![ESCAPE, 0x28, 0x78, ESCAPE, 0x29]);
        assert_eq!(to_septets("a[b]").len(), 6);
    }

    #[test]
    fn unsupported_characters_are_replaced() {
        assert_eq!(to_septets("Жa"), vec![REPLACEMENT, 0x61]);
    }

    #[test]
    fn escape_is_not_a_basic_character() {
        assert_eq!(to_septets("\u{1B}"), vec![REPLACEMENT]);
    }

    #[test]
    fn eight_septets_fill_seven_octets() {
        let packed = pack(&[0x7F; 8]);
        assert_eq!(packed.len(), 7);
        assert!(packed.iter().all(|&b| b == 0xFF));
    }
}
