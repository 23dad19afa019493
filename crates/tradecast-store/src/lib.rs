//! Trade storage for tradecast.
//!
//! Defines the put/scan seam over the external storage engine, an
//! in-memory implementation with the same key ordering, and the trade
//! scanner that turns a stored range into an acknowledged event stream.

pub mod error;
pub mod scanner;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use scanner::{ScanEvent, ScanHandle, TradeScanner};
pub use store::{MemoryStore, TradeCursor, TradePut, TradeStore};
