// Outbound delivery and the chat command handler
pub mod bot;
pub mod telegram;

pub use bot::{CommandBot, StatusSource, UpdateCursor};
pub use telegram::{TelegramCredentials, TelegramNotifier};
