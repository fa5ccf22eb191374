// ABOUTME: TS 23.038 data coding scheme and message class for outbound short messages
// ABOUTME: Builds the TP-DCS octet from an alphabet and an optional message class

/// Alphabet used for the user data of a short message
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum DataCoding {
    /// GSM 7-bit default alphabet, uncompressed
    #[default]
    DefaultNoCompression,
}

impl DataCoding {
    fn alphabet_bits(&self) -> u8 {
        match self {
            DataCoding::DefaultNoCompression => 0b0000,
        }
    }

    /// TP-DCS octet using the general data coding group.
    ///
    /// When a class is given, bit 4 is set and bits 1..0 carry the class.
    pub fn dcs(&self, class: Option<MessageClass>) -> u8 {
        match class {
            Some(class) => 0x10 | self.alphabet_bits() | class as u8,
            None => self.alphabet_bits(),
        }
    }
}

/// Message class for SMS delivery
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MessageClass {
    /// Flash SMS (displayed immediately, not stored)
    Class0 = 0,
    /// Normal message, stored by the mobile equipment
    Class1 = 1,
    /// SIM-specific message
    Class2 = 2,
    /// Terminal equipment specific message
    Class3 = 3,
}
