// ABOUTME: TS 23.040 address encoding for destination numbers and service centre numbers
// ABOUTME: Validates dialable digits and writes the length, type octet and swapped semi-octets

use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use bytes::{BufMut, BytesMut};
use std::fmt;
use thiserror::Error;

/// Maximum number of digits an address field can carry.
pub const MAX_ADDRESS_DIGITS: usize = 20;

/// Errors raised while validating a phone number for the wire
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,

    #[error("Address too long: {actual} digits, maximum is {max}")]
    TooLong { max: usize, actual: usize },

    #[error("Invalid character {0:?} in address")]
    InvalidCharacter(char),
}

/// A dialable phone number with its type-of-address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    ton: TypeOfNumber,
    npi: NumericPlanIndicator,
    digits: String,
}

fn nibble(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        '*' => Some(0x0A),
        '#' => Some(0x0B),
        'a' => Some(0x0C),
        'b' => Some(0x0D),
        'c' => Some(0x0E),
        _ => None,
    }
}

impl Address {
    /// Parses a number. A leading `+` marks it as international.
    pub fn parse(number: &str) -> Result<Self, AddressError> {
        let number = number.trim();
        let (ton, digits) = match number.strip_prefix('+') {
            Some(rest) => (TypeOfNumber::International, rest),
            None => (TypeOfNumber::Unknown, number),
        };

        if digits.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(bad) = digits.chars().find(|&c| nibble(c).is_none()) {
            return Err(AddressError::InvalidCharacter(bad));
        }

        let count = digits.chars().count();
        if count > MAX_ADDRESS_DIGITS {
            return Err(AddressError::TooLong {
                max: MAX_ADDRESS_DIGITS,
                actual: count,
            });
        }

        Ok(Address {
            ton,
            npi: NumericPlanIndicator::Isdn,
            digits: digits.to_string(),
        })
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Type-of-address octet (bit 7 always set).
    pub fn type_octet(&self) -> u8 {
        0x80 | ((self.ton as u8) << 4) | self.npi as u8
    }

    /// Digits as swapped semi-octets, padded with `F` when odd.
    pub fn semi_octets(&self) -> Vec<u8> {
        let nibbles: Vec<u8> = self.digits.chars().filter_map(nibble).collect();
        nibbles
            .chunks(2)
            .map(|pair| {
                let low = pair[0];
                let high = pair.get(1).copied().unwrap_or(0x0F);
                (high << 4) | low
            })
            .collect()
    }

    /// Writes the TP-Destination-Address: digit count, type, semi-octets.
    pub fn encode_destination(&self, buf: &mut BytesMut) {
        buf.put_u8(self.digits.len() as u8);
        buf.put_u8(self.type_octet());
        buf.put_slice(&self.semi_octets());
    }

    /// Writes the SMSC information: octet count (including type), type, semi-octets.
    pub fn encode_service_centre(&self, buf: &mut BytesMut) {
        let octets = self.semi_octets();
        buf.put_u8(octets.len() as u8 + 1);
        buf.put_u8(self.type_octet());
        buf.put_slice(&octets);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ton == TypeOfNumber::International {
            write!(f, "+{}", self.digits)
        } else {
            f.write_str(&self.digits)
        }
    }
}
