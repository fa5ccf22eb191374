// ABOUTME: Protocol data units handed to the modem in PDU mode
// ABOUTME: Only SMS-SUBMIT is needed for outbound single-message submission

mod submit;

pub use submit::{EncodedPdu, FIRST_OCTET_SUBMIT, PduError, SmsSubmit};
