//! Domain value types shared by all providers.

pub mod frequency;
pub mod price_field;
pub mod ticker;

pub use frequency::Frequency;
pub use price_field::{resolve_field, FieldToken, PriceField};
pub use ticker::{SecurityKind, Ticker};
