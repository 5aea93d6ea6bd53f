//! Paper-trading order sink: records and logs orders without placing them.

use std::sync::Mutex;

use tracing::info;

use crate::domain::error::TraderError;
use crate::ports::order_port::OrderPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    OpenLong,
    CloseLong,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedOrder {
    pub side: OrderSide,
    pub symbol: String,
    pub size: f64,
    pub price: f64,
}

#[derive(Debug, Default)]
pub struct SimulatedOrderAdapter {
    orders: Mutex<Vec<SimulatedOrder>>,
}

impl SimulatedOrderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<SimulatedOrder> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn record(&self, side: OrderSide, symbol: &str, size: f64, price: f64) -> Result<(), TraderError> {
        info!(?side, symbol, size, price, "simulated order");
        self.orders
            .lock()
            .map_err(|_| TraderError::Io(std::io::Error::other("order book lock poisoned")))?
            .push(SimulatedOrder {
                side,
                symbol: symbol.to_string(),
                size,
                price,
            });
        Ok(())
    }
}

impl OrderPort for SimulatedOrderAdapter {
    fn open_long(&self, symbol: &str, size: f64, price: f64) -> Result<(), TraderError> {
        self.record(OrderSide::OpenLong, symbol, size, price)
    }

    fn close_long(&self, symbol: &str, size: f64, price: f64) -> Result<(), TraderError> {
        self.record(OrderSide::CloseLong, symbol, size, price)
    }
}
