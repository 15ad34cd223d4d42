use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::transport::{Button, ChatTransport, Photo};
use crate::config::TelegramConfig;

/// Telegram caps media groups at ten items.
const MEDIA_GROUP_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// What the dispatcher needs from an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub callback_id: Option<String>,
}

impl Update {
    pub fn inbound(&self) -> Option<Inbound> {
        if let Some(message) = &self.message {
            let username = message
                .from
                .as_ref()
                .and_then(|u| u.username.clone())
                .or_else(|| message.chat.username.clone());

            return Some(Inbound {
                chat_id: message.chat.id,
                username,
                text: message.text.clone()?,
                callback_id: None,
            });
        }

        let query = self.callback_query.as_ref()?;
        Some(Inbound {
            chat_id: query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id),
            username: query.from.username.clone(),
            text: query.data.clone()?,
            callback_id: Some(query.id.clone()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client.
#[derive(Clone)]
pub struct Telegram {
    client: reqwest::Client,
    base_url: String,
}

impl Telegram {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
        })
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }
        self.call("setWebhook", body).await
    }

    async fn call(&self, method: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?;

        check(method, response).await
    }

    async fn upload(&self, method: &str, form: Form) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("telegram {method} upload failed"))?;

        check(method, response).await
    }
}

async fn check(method: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let parsed: ApiResponse = response
        .json()
        .await
        .with_context(|| format!("telegram {method} returned {status} with an unreadable body"))?;

    if !parsed.ok {
        return Err(anyhow!(
            "telegram {method} failed: {}",
            parsed.description.unwrap_or_else(|| status.to_string())
        ));
    }

    debug!(method, "telegram call ok");
    Ok(())
}

fn inline_row(buttons: &[Button]) -> Value {
    buttons
        .iter()
        .map(|b| json!({ "text": b.label, "callback_data": b.data }))
        .collect()
}

fn photo_part(photo: &Photo) -> Result<Part> {
    Ok(Part::bytes(photo.bytes.clone())
        .file_name(photo.file_name.clone())
        .mime_str("image/jpeg")?)
}

#[async_trait]
impl ChatTransport for Telegram {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
                "disable_notification": true,
            }),
        )
        .await
    }

    async fn send_keyboard(&self, chat_id: i64, text: &str, labels: &[&str]) -> Result<()> {
        let row: Vec<Value> = labels.iter().map(|l| json!({ "text": l })).collect();
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "disable_notification": true,
                "reply_markup": { "keyboard": [row], "resize_keyboard": true },
            }),
        )
        .await
    }

    async fn send_menu(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<()> {
        let rows: Vec<Value> = buttons
            .iter()
            .map(|b| inline_row(std::slice::from_ref(b)))
            .collect();
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "reply_markup": { "inline_keyboard": rows },
            }),
        )
        .await
    }

    async fn send_photo(&self, chat_id: i64, photo: Photo) -> Result<()> {
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("disable_notification", "true")
            .part("photo", photo_part(&photo)?);

        if let Some(caption) = &photo.caption {
            form = form
                .text("caption", caption.clone())
                .text("parse_mode", "HTML");
        }
        if !photo.buttons.is_empty() {
            let markup = json!({ "inline_keyboard": [inline_row(&photo.buttons)] });
            form = form.text("reply_markup", markup.to_string());
        }

        self.upload("sendPhoto", form).await
    }

    async fn send_photo_group(&self, chat_id: i64, photos: Vec<Photo>) -> Result<()> {
        for chunk in photos.chunks(MEDIA_GROUP_LIMIT) {
            if let [single] = chunk {
                self.send_photo(chat_id, single.clone()).await?;
                continue;
            }

            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .text("disable_notification", "true");
            let mut media = Vec::with_capacity(chunk.len());

            for (i, photo) in chunk.iter().enumerate() {
                let attach = format!("photo{i}");
                let mut item = json!({ "type": "photo", "media": format!("attach://{attach}") });
                if let Some(caption) = &photo.caption {
                    item["caption"] = json!(caption);
                    item["parse_mode"] = json!("HTML");
                }
                media.push(item);
                form = form.part(attach, photo_part(photo)?);
            }

            form = form.text("media", Value::Array(media).to_string());
            self.upload("sendMediaGroup", form).await?;
        }
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "document",
                Part::bytes(bytes)
                    .file_name(file_name.to_string())
                    .mime_str("application/zip")?,
            );
        self.upload("sendDocument", form).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_update_uses_sender_username() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"message":{"message_id":5,
                "chat":{"id":77,"username":"chat_name"},
                "from":{"id":77,"username":"owner","first_name":"O"},
                "text":"/find"}}"#,
        )
        .unwrap();

        assert_eq!(
            update.inbound(),
            Some(Inbound {
                chat_id: 77,
                username: Some("owner".into()),
                text: "/find".into(),
                callback_id: None,
            })
        );
    }

    #[test]
    fn callback_update_uses_callback_data() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":2,"callback_query":{"id":"cb1",
                "from":{"id":9,"username":"owner"},
                "data":"/like a.jpg",
                "message":{"message_id":3,"chat":{"id":77}}}}"#,
        )
        .unwrap();

        let inbound = update.inbound().unwrap();
        assert_eq!(inbound.chat_id, 77);
        assert_eq!(inbound.text, "/like a.jpg");
        assert_eq!(inbound.callback_id.as_deref(), Some("cb1"));
    }

    #[test]
    fn updates_without_text_are_ignored() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":3,"message":{"message_id":5,"chat":{"id":1}}}"#,
        )
        .unwrap();
        assert!(update.inbound().is_none());
    }
}
