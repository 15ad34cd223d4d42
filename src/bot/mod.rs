pub mod command;
pub mod dispatcher;
pub mod telegram;
pub mod transport;
pub mod webhook;
pub mod worker;

pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use telegram::{Telegram, Update};
pub use transport::ChatTransport;
pub use webhook::AppState;
pub use worker::UpdateWorker;
