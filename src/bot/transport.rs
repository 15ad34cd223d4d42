use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// HTML caption.
    pub caption: Option<String>,
    /// Rendered as a single row under the photo.
    pub buttons: Vec<Button>,
}

/// Outbound side of the chat. The dispatcher never talks to Telegram directly.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// HTML text.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Text with a persistent reply keyboard of `labels`.
    async fn send_keyboard(&self, chat_id: i64, text: &str, labels: &[&str]) -> Result<()>;

    /// Text with one inline button per row.
    async fn send_menu(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, photo: Photo) -> Result<()>;

    async fn send_photo_group(&self, chat_id: i64, photos: Vec<Photo>) -> Result<()>;

    async fn send_document(&self, chat_id: i64, file_name: &str, bytes: Vec<u8>) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}

#[cfg(test)]
pub mod recording {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{Button, ChatTransport, Photo};

    #[derive(Debug, Clone)]
    pub enum Sent {
        Text { chat_id: i64, text: String },
        Keyboard { chat_id: i64, text: String },
        Menu { chat_id: i64, buttons: Vec<Button> },
        Photo { chat_id: i64, photo: Photo },
        Group { chat_id: i64, names: Vec<String> },
        Document { chat_id: i64, file_name: String, bytes: Vec<u8> },
        CallbackAnswer(String),
    }

    /// Keeps every outbound call; can be told to fail the next sends.
    #[derive(Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<Sent>>,
        failures: AtomicUsize,
    }

    impl RecordingTransport {
        pub fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Text { text, .. } | Sent::Keyboard { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn photos(&self) -> Vec<Photo> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Photo { photo, .. } => Some(photo),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }

        fn record(&self, sent: Sent) -> Result<()> {
            let pending = self.failures.load(Ordering::SeqCst);
            if pending > 0 {
                self.failures.store(pending - 1, Ordering::SeqCst);
                return Err(anyhow!("transport unavailable"));
            }
            self.sent.lock().unwrap().push(sent);
            Ok(())
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
            self.record(Sent::Text {
                chat_id,
                text: text.to_string(),
            })
        }

        async fn send_keyboard(&self, chat_id: i64, text: &str, _labels: &[&str]) -> Result<()> {
            self.record(Sent::Keyboard {
                chat_id,
                text: text.to_string(),
            })
        }

        async fn send_menu(&self, chat_id: i64, _text: &str, buttons: &[Button]) -> Result<()> {
            self.record(Sent::Menu {
                chat_id,
                buttons: buttons.to_vec(),
            })
        }

        async fn send_photo(&self, chat_id: i64, photo: Photo) -> Result<()> {
            self.record(Sent::Photo { chat_id, photo })
        }

        async fn send_photo_group(&self, chat_id: i64, photos: Vec<Photo>) -> Result<()> {
            self.record(Sent::Group {
                chat_id,
                names: photos.into_iter().map(|p| p.file_name).collect(),
            })
        }

        async fn send_document(&self, chat_id: i64, file_name: &str, bytes: Vec<u8>) -> Result<()> {
            self.record(Sent::Document {
                chat_id,
                file_name: file_name.to_string(),
                bytes,
            })
        }

        async fn answer_callback(&self, callback_id: &str) -> Result<()> {
            self.record(Sent::CallbackAnswer(callback_id.to_string()))
        }
    }
}
