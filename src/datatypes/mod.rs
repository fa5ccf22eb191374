mod address;
mod data_coding;
mod device_error;
pub mod gsm7;
mod numeric_plan_indicator;
mod type_of_number;
mod unicode;

pub use address::{Address, AddressError, MAX_ADDRESS_DIGITS};
pub use data_coding::{DataCoding, MessageClass};
pub use device_error::{CmeError, CmsError, DeviceErrorCode};
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use type_of_number::TypeOfNumber;
pub use unicode::UnicodeText;
