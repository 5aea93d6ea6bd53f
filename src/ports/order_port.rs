//! Order placement port.

use crate::domain::error::TraderError;

pub trait OrderPort {
    fn open_long(&self, symbol: &str, size: f64, price: f64) -> Result<(), TraderError>;

    fn close_long(&self, symbol: &str, size: f64, price: f64) -> Result<(), TraderError>;
}
