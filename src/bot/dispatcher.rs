use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::command::{
    callback_arg, format_date, parse_date, Command, KEY_FOLDERS, KEY_LIKES, KEY_MORE,
};
use super::telegram::{Inbound, Update};
use super::transport::{Button, ChatTransport, Photo};
use crate::error::BotError;
use crate::index::ImageIndex;
use crate::likes::{LikeOutcome, LikesStore};
use crate::loader::ContentLoader;
use crate::model::{FolderScope, ImageRecord};

const DAY_GROUP_LIMIT: usize = 10;

const HELP: &str = "Commands:\n\
/find [dd.mm.yyyy | name] - a random photo, a photo of that day, or a photo by name\n\
/date dd.mm.yyyy - every photo of that day\n\
/folders - pick the folder to browse\n\
/changedir <folder> - switch folder\n\
/like <name> - add a photo to likes\n\
/unlike <name> - remove a photo from likes\n\
/likes - liked photos\n\
/archive - liked originals as a zip\n\
/delete <name> - delete a photo from the disk\n\
/help - this list";

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub allowed_username: String,
    pub default_folder: String,
    pub open_in_browser_url: Option<String>,
}

/// Turns inbound chat commands into index, loader and likes calls and sends
/// the results back through the transport.
pub struct Dispatcher {
    index: ImageIndex,
    loader: ContentLoader,
    likes: Arc<LikesStore>,
    transport: Arc<dyn ChatTransport>,
    settings: DispatcherSettings,
    scope: RwLock<FolderScope>,
}

impl Dispatcher {
    pub fn new(
        index: ImageIndex,
        loader: ContentLoader,
        likes: Arc<LikesStore>,
        transport: Arc<dyn ChatTransport>,
        settings: DispatcherSettings,
    ) -> Self {
        let scope = FolderScope::single(settings.default_folder.clone());
        Self {
            index,
            loader,
            likes,
            transport,
            settings,
            scope: RwLock::new(scope),
        }
    }

    pub async fn scope(&self) -> FolderScope {
        self.scope.read().await.clone()
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let Some(inbound) = update.inbound() else {
            return Ok(());
        };

        if let Some(callback_id) = &inbound.callback_id {
            if let Err(err) = self.transport.answer_callback(callback_id).await {
                warn!(error = %err, "failed to answer callback");
            }
        }

        if !self.is_allowed(&inbound) {
            warn!(
                chat_id = inbound.chat_id,
                username = inbound.username.as_deref().unwrap_or(""),
                text = inbound.text.as_str(),
                "message from a user without access"
            );
            return self.transport.send_text(inbound.chat_id, "No access").await;
        }

        let Some(command) = Command::parse(&inbound.text) else {
            return Ok(());
        };

        info!(chat_id = inbound.chat_id, command = ?command, "incoming command");
        self.run(inbound.chat_id, command).await
    }

    /// Active scope, loading any folder a failed startup or switch left empty.
    async fn loaded_scope(&self) -> Result<FolderScope, BotError> {
        let scope = self.scope().await;
        for folder in scope.folders() {
            self.index.ensure_folder_loaded(folder).await?;
        }
        Ok(scope)
    }

    fn is_allowed(&self, inbound: &Inbound) -> bool {
        inbound
            .username
            .as_deref()
            .map(|name| name.eq_ignore_ascii_case(&self.settings.allowed_username))
            .unwrap_or(false)
    }

    pub async fn run(&self, chat_id: i64, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                self.transport
                    .send_keyboard(
                        chat_id,
                        "This bot sends photos from the disk, finds them by name or date, \
                         keeps likes and builds a public folder with the originals.",
                        &[KEY_MORE, KEY_FOLDERS, KEY_LIKES],
                    )
                    .await?;
                self.transport.send_text(chat_id, HELP).await
            }
            Command::Help => self.transport.send_text(chat_id, HELP).await,
            Command::MissingArgument(usage) => {
                self.transport
                    .send_text(chat_id, &format!("Usage: {usage}"))
                    .await
            }
            Command::Find(query) => self.find(chat_id, query).await,
            Command::Day(raw) => self.day(chat_id, &raw).await,
            Command::Folders => self.folders(chat_id).await,
            Command::ChangeDir(folder) => self.change_dir(chat_id, &folder).await,
            Command::Like(name) => self.like(chat_id, &name).await,
            Command::Unlike(name) => self.unlike(chat_id, &name).await,
            Command::Likes => self.show_likes(chat_id).await,
            Command::Archive => self.archive(chat_id).await,
            Command::Delete(name) => self.delete(chat_id, &name).await,
        }
    }

    async fn find(&self, chat_id: i64, query: Option<String>) -> Result<()> {
        let scope = match self.loaded_scope().await {
            Ok(scope) => scope,
            Err(err) => return self.report(chat_id, &err).await,
        };

        let Some(query) = query else {
            return match self.index.random_image(&scope).await {
                Ok(record) => self.send_record(chat_id, &scope, &record).await,
                Err(err) => self.report(chat_id, &err).await,
            };
        };

        if let Some(date) = parse_date(&query) {
            return match self.index.random_image_on_date(&scope, date).await {
                Some(record) => self.send_record(chat_id, &scope, &record).await,
                None => self.no_photos_on(chat_id, date).await,
            };
        }

        match self.index.find_by_name(&scope, &query).await {
            Some(record) => self.send_record(chat_id, &scope, &record).await,
            None => self.report(chat_id, &BotError::NoMatch(query)).await,
        }
    }

    async fn day(&self, chat_id: i64, raw: &str) -> Result<()> {
        let Some(date) = parse_date(raw) else {
            return self
                .transport
                .send_text(chat_id, "Usage: /date dd.mm.yyyy")
                .await;
        };

        let scope = match self.loaded_scope().await {
            Ok(scope) => scope,
            Err(err) => return self.report(chat_id, &err).await,
        };
        let mut records = self.index.images_on_date(&scope, date).await;
        if records.is_empty() {
            return self.no_photos_on(chat_id, date).await;
        }
        records.truncate(DAY_GROUP_LIMIT);

        let thumbnails = self.loader.load_thumbnails(&records).await;
        let photos: Vec<Photo> = records
            .iter()
            .zip(thumbnails)
            .filter_map(|(record, bytes)| {
                Some(Photo {
                    file_name: record.name.clone(),
                    bytes: bytes.ok()?,
                    caption: Some(escape_html(&record.name)),
                    buttons: Vec::new(),
                })
            })
            .collect();

        if photos.is_empty() {
            return self.unavailable(chat_id).await;
        }
        self.transport.send_photo_group(chat_id, photos).await
    }

    async fn folders(&self, chat_id: i64) -> Result<()> {
        let folders = match self.index.list_folders().await {
            Ok(folders) => folders,
            Err(err) => return self.report(chat_id, &err.into()).await,
        };

        if folders.is_empty() {
            return self.transport.send_text(chat_id, "No folders found").await;
        }

        let buttons: Vec<Button> = folders
            .iter()
            .filter_map(|f| {
                let arg = callback_arg("/changedir", &f.name);
                let shortened = arg != f.name;
                if shortened && folders.iter().filter(|o| o.name.starts_with(arg)).count() > 1 {
                    warn!(folder = f.name.as_str(), "folder name too long for a menu button");
                    return None;
                }
                Some(Button::new(f.name.clone(), format!("/changedir {arg}")))
            })
            .collect();
        self.transport
            .send_menu(chat_id, "Pick a folder", &buttons)
            .await
    }

    async fn change_dir(&self, chat_id: i64, requested: &str) -> Result<()> {
        let folder = match self.load_folder(requested).await {
            Ok(folder) => folder,
            Err(err) => return self.report(chat_id, &err).await,
        };

        let target = FolderScope::single(folder.as_str());
        if self.scope().await != target {
            *self.scope.write().await = target.clone();
            info!(folder = folder.as_str(), "active folder changed");
        }

        let count = self.index.count(&target).await;
        self.transport
            .send_keyboard(
                chat_id,
                &format!("Folder changed to {folder} ({count} photos loaded)"),
                &[KEY_MORE, KEY_FOLDERS, KEY_LIKES],
            )
            .await
    }

    /// Loads `requested`, or the only folder whose name starts with it when a
    /// menu button carried a shortened name.
    async fn load_folder(&self, requested: &str) -> Result<String, BotError> {
        match self.index.ensure_folder_loaded(requested).await {
            Ok(_) => return Ok(requested.to_string()),
            Err(err) if !err.is_not_found() => return Err(err.into()),
            Err(_) => {}
        }

        let folders = self.index.list_folders().await?;
        let mut matching = folders
            .into_iter()
            .filter(|f| f.name.starts_with(requested));

        match (matching.next(), matching.next()) {
            (Some(folder), None) => {
                self.index.ensure_folder_loaded(&folder.name).await?;
                Ok(folder.name)
            }
            _ => Err(BotError::NoMatch(requested.to_string())),
        }
    }

    async fn like(&self, chat_id: i64, name: &str) -> Result<()> {
        let scope = match self.loaded_scope().await {
            Ok(scope) => scope,
            Err(err) => return self.report(chat_id, &err).await,
        };
        let Some(record) = self.index.get_image(&scope, name).await else {
            return self
                .report(chat_id, &BotError::NoMatch(name.to_string()))
                .await;
        };

        let outcome = match self.likes.add_like(chat_id, &record).await {
            Ok(outcome) => outcome,
            Err(err) => return self.report(chat_id, &err).await,
        };

        let name = escape_html(&record.name);
        let text = match (outcome, self.likes.public_folder_url(chat_id).await) {
            (LikeOutcome::Added, Ok(url)) => {
                format!("{name} added to <a href=\"{url}\">likes</a>")
            }
            (LikeOutcome::Added, Err(_)) => format!("{name} added to likes"),
            (LikeOutcome::AlreadyLiked, _) => format!("{name} is already in likes"),
        };
        self.transport.send_text(chat_id, &text).await
    }

    async fn unlike(&self, chat_id: i64, name: &str) -> Result<()> {
        match self.likes.remove_like(chat_id, name).await {
            Ok(entry) => {
                self.transport
                    .send_text(
                        chat_id,
                        &format!("{} removed from likes", escape_html(&entry.image_name)),
                    )
                    .await
            }
            Err(err) => self.report(chat_id, &err).await,
        }
    }

    async fn show_likes(&self, chat_id: i64) -> Result<()> {
        let thumbnails = match self.likes.like_thumbnails(chat_id).await {
            Ok(thumbnails) => thumbnails,
            Err(err) => return self.report(chat_id, &err).await,
        };

        if thumbnails.is_empty() {
            return self.transport.send_text(chat_id, "Likes are empty").await;
        }

        let photos = thumbnails
            .into_iter()
            .map(|(name, bytes)| Photo {
                caption: Some(escape_html(&name)),
                file_name: name,
                bytes,
                buttons: Vec::new(),
            })
            .collect();
        self.transport.send_photo_group(chat_id, photos).await?;

        match self.likes.public_folder_url(chat_id).await {
            Ok(url) => {
                self.transport
                    .send_text(chat_id, &format!("<a href=\"{url}\">Folder on the disk</a>"))
                    .await
            }
            Err(err) => self.report(chat_id, &err).await,
        }
    }

    async fn archive(&self, chat_id: i64) -> Result<()> {
        match self.likes.export_originals_archive(chat_id).await {
            Ok(bytes) => {
                self.transport
                    .send_document(chat_id, "likes.zip", bytes)
                    .await
            }
            Err(BotError::NoMatch(_)) => self.transport.send_text(chat_id, "Likes are empty").await,
            Err(err) => self.report(chat_id, &err).await,
        }
    }

    async fn delete(&self, chat_id: i64, name: &str) -> Result<()> {
        let scope = match self.loaded_scope().await {
            Ok(scope) => scope,
            Err(err) => return self.report(chat_id, &err).await,
        };
        match self.index.delete_image(&scope, name).await {
            Ok(record) => {
                self.transport
                    .send_text(chat_id, &format!("{} deleted", escape_html(&record.name)))
                    .await
            }
            Err(err) => self.report(chat_id, &err).await,
        }
    }

    async fn send_record(
        &self,
        chat_id: i64,
        scope: &FolderScope,
        record: &ImageRecord,
    ) -> Result<()> {
        let bytes = match self.loader.load_thumbnail(record).await {
            Ok(bytes) => bytes,
            Err(err) => return self.report(chat_id, &err.into()).await,
        };

        let date = record.captured_at.date();
        let mut buttons = vec![Button::new(
            "More from this day",
            format!("/find {}", format_date(date)),
        )];

        // A shortened name must still lead back to this record.
        let like = callback_arg("/like", &record.name);
        let resolved = self.index.get_image(scope, like).await;
        if resolved.is_some_and(|r| r.path == record.path) {
            buttons.push(Button::new("🖤", format!("/like {like}")));
        } else {
            debug!(name = record.name.as_str(), "name too long for a like button");
        }

        let photo = Photo {
            file_name: record.name.clone(),
            bytes,
            caption: Some(self.caption(record)),
            buttons,
        };
        self.transport.send_photo(chat_id, photo).await?;
        info!(chat_id, name = record.name.as_str(), "photo sent");
        Ok(())
    }

    fn caption(&self, record: &ImageRecord) -> String {
        let name = escape_html(&record.name);
        let title = match &self.settings.open_in_browser_url {
            Some(prefix) => format!("<a href=\"{prefix}{name}\">{name}</a>"),
            None => name,
        };
        format!(
            "{title} <b>{}</b>",
            record.captured_at.format("%d.%m.%Y %H:%M")
        )
    }

    async fn no_photos_on(&self, chat_id: i64, date: NaiveDate) -> Result<()> {
        self.transport
            .send_text(chat_id, &format!("No photos for {}", format_date(date)))
            .await
    }

    async fn unavailable(&self, chat_id: i64) -> Result<()> {
        self.transport
            .send_text(chat_id, "The disk is unavailable right now, try again later")
            .await
    }

    /// Empty results and failures get different replies.
    async fn report(&self, chat_id: i64, err: &BotError) -> Result<()> {
        if err.is_empty_result() {
            debug!(chat_id, error = %err, "empty result");
        }

        let text = match err {
            BotError::Disk(disk) => {
                warn!(chat_id, error = %disk, "disk call failed");
                return self.unavailable(chat_id).await;
            }
            BotError::EmptyFolder(folder) => format!("No photos in {} yet", escape_html(folder)),
            BotError::NoMatch(query) => format!("Nothing matches {}", escape_html(query)),
            BotError::FolderProvisioningIncomplete(_) => {
                "The likes folder is not ready yet, try again".to_string()
            }
            BotError::Archive(reason) => {
                warn!(chat_id, reason = reason.as_str(), "archive failed");
                "Could not build the archive".to_string()
            }
        };
        self.transport.send_text(chat_id, &text).await
    }
}

pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
