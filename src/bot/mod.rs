/// Command and message handlers
pub mod handlers;
/// Retrying wrappers around Telegram API calls
pub mod resilient;
/// Telegram implementation of the relay chat transport
pub mod transport;

pub use transport::TelegramTransport;
