// ABOUTME: SMS-SUBMIT TPDU (3GPP TS 23.040 section 9.2.2.2) built from an outbound message
// ABOUTME: Encodes the SMSC header, destination, coding and packed 7-bit user data to hex for AT+CMGS

use crate::client::types::OutboundMessage;
use crate::datatypes::{
    Address, AddressError, DataCoding, MessageClass, NumericPlanIndicator, TypeOfNumber, gsm7,
};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// TP-MTI = SMS-SUBMIT, no validity period, no reply path, no UDH.
pub const FIRST_OCTET_SUBMIT: u8 = 0x01;

const TP_UDHI: u8 = 0x40;
const TP_VPF_MASK: u8 = 0x18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PduError {
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("User data needs {septets} septets, maximum is {}", gsm7::MAX_SEPTETS)]
    UserDataTooLong { septets: usize },

    #[error("Truncated PDU: missing {0}")]
    Truncated(&'static str),

    #[error("Unsupported PDU: {0}")]
    Unsupported(&'static str),
}

/// A PDU ready for `AT+CMGS`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPdu {
    /// Full PDU (SMSC information included) as uppercase hex
    pub hex: String,
    /// Octets after the SMSC information; the `AT+CMGS` argument
    pub tpdu_length: usize,
}

/// SMS-SUBMIT message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmsSubmit {
    /// `None` sends a zero-length SMSC field so the modem uses its stored one
    pub service_centre: Option<Address>,
    pub message_reference: u8,
    pub destination: Address,
    pub protocol_id: u8,
    pub data_coding: u8,
    /// Unpacked septets
    pub user_data: Vec<u8>,
}

impl SmsSubmit {
    /// Builds the TPDU for `message` with the fixed submit fields.
    pub fn from_message(message: &OutboundMessage) -> Result<Self, PduError> {
        let service_centre = message
            .smsc
            .as_deref()
            .filter(|smsc| !smsc.is_empty())
            .map(Address::parse)
            .transpose()?;

        let destination = Address::parse(&message.number())?;

        let user_data = gsm7::to_septets(&message.text());
        if user_data.len() > gsm7::MAX_SEPTETS {
            return Err(PduError::UserDataTooLong {
                septets: user_data.len(),
            });
        }

        Ok(SmsSubmit {
            service_centre,
            message_reference: 0,
            destination,
            protocol_id: 0,
            data_coding: message.coding.dcs(Some(message.class)),
            user_data,
        })
    }

    /// Writes the full PDU and returns the TPDU length.
    pub fn encode(&self, buf: &mut BytesMut) -> usize {
        match &self.service_centre {
            Some(smsc) => smsc.encode_service_centre(buf),
            None => buf.put_u8(0x00),
        }
        let tpdu_start = buf.len();

        buf.put_u8(FIRST_OCTET_SUBMIT);
        buf.put_u8(self.message_reference);
        self.destination.encode_destination(buf);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.user_data.len() as u8);
        buf.put_slice(&gsm7::pack(&self.user_data));

        buf.len() - tpdu_start
    }

    pub fn to_hex(&self) -> EncodedPdu {
        let mut buf = BytesMut::with_capacity(64 + self.user_data.len());
        let tpdu_length = self.encode(&mut buf);
        EncodedPdu {
            hex: hex::encode_upper(&buf),
            tpdu_length,
        }
    }

    /// Text carried in the user data.
    pub fn text(&self) -> String {
        gsm7::from_septets(&self.user_data)
    }

    /// Parses a full PDU as written by `encode`. Only the subset this crate
    /// produces is accepted: no validity period, no UDH, 7-bit user data.
    pub fn decode(pdu: &[u8]) -> Result<Self, PduError> {
        let mut buf = Cursor::new(pdu);

        let smsc_len = take_u8(&mut buf, "SMSC length")? as usize;
        let service_centre = if smsc_len == 0 {
            None
        } else {
            let type_octet = take_u8(&mut buf, "SMSC type")?;
            let digits = take_semi_octets(&mut buf, (smsc_len - 1) * 2, "SMSC digits")?;
            Some(address_from_wire(type_octet, &digits)?)
        };

        let first = take_u8(&mut buf, "first octet")?;
        if first & 0x03 != FIRST_OCTET_SUBMIT {
            return Err(PduError::Unsupported("not an SMS-SUBMIT"));
        }
        if first & (TP_UDHI | TP_VPF_MASK) != 0 {
            return Err(PduError::Unsupported("validity period or user data header"));
        }

        let message_reference = take_u8(&mut buf, "message reference")?;
        let digit_count = take_u8(&mut buf, "destination length")? as usize;
        let type_octet = take_u8(&mut buf, "destination type")?;
        let digits = take_semi_octets(&mut buf, digit_count, "destination digits")?;
        let destination = address_from_wire(type_octet, &digits)?;

        let protocol_id = take_u8(&mut buf, "protocol identifier")?;
        let data_coding = take_u8(&mut buf, "data coding")?;
        if data_coding & 0x0C != DataCoding::DefaultNoCompression.dcs(None) {
            return Err(PduError::Unsupported("non-default alphabet"));
        }

        let septets = take_u8(&mut buf, "user data length")? as usize;
        let packed_len = (septets * 7).div_ceil(8);
        if buf.remaining() < packed_len {
            return Err(PduError::Truncated("user data"));
        }
        let user_data = gsm7::unpack(&buf.chunk()[..packed_len], septets);

        Ok(SmsSubmit {
            service_centre,
            message_reference,
            destination,
            protocol_id,
            data_coding,
            user_data,
        })
    }

    /// Message class encoded in the DCS, if any.
    pub fn message_class(&self) -> Option<MessageClass> {
        if self.data_coding & 0x10 == 0 {
            return None;
        }
        Some(match self.data_coding & 0x03 {
            0 => MessageClass::Class0,
            1 => MessageClass::Class1,
            2 => MessageClass::Class2,
            _ => MessageClass::Class3,
        })
    }
}

fn take_u8(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, PduError> {
    if !buf.has_remaining() {
        return Err(PduError::Truncated(field));
    }
    Ok(buf.get_u8())
}

fn take_semi_octets(
    buf: &mut Cursor<&[u8]>,
    digit_count: usize,
    field: &'static str,
) -> Result<String, PduError> {
    let octets = digit_count.div_ceil(2);
    if buf.remaining() < octets {
        return Err(PduError::Truncated(field));
    }

    let mut digits = String::with_capacity(digit_count);
    for _ in 0..octets {
        let byte = buf.get_u8();
        for nibble in [byte & 0x0F, byte >> 4] {
            let c = match nibble {
                0..=9 => (b'0' + nibble) as char,
                0x0A => '*',
                0x0B => '#',
                0x0C => 'a',
                0x0D => 'b',
                0x0E => 'c',
                _ => continue,
            };
            digits.push(c);
        }
    }
    digits.truncate(digit_count);
    Ok(digits)
}

fn address_from_wire(type_octet: u8, digits: &str) -> Result<Address, PduError> {
    let ton = TypeOfNumber::try_from((type_octet >> 4) & 0x07)
        .map_err(|_| PduError::Unsupported("reserved type of number"))?;
    NumericPlanIndicator::try_from(type_octet & 0x0F)
        .map_err(|_| PduError::Unsupported("reserved numbering plan"))?;

    // Only the international flag survives; the numbering plan is always ISDN here
    let number = match ton {
        TypeOfNumber::International => format!("+{digits}"),
        TypeOfNumber::Alphanumeric => return Err(PduError::Unsupported("alphanumeric address")),
        _ => digits.to_string(),
    };
    Ok(Address::parse(&number)?)
}
