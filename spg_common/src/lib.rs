mod minor_units;

pub mod helpers;
pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use minor_units::{MinorUnits, MinorUnitsConversionError, DEFAULT_CURRENCY_CODE, DEFAULT_CURRENCY_CODE_LOWER};
pub use secret::Secret;
