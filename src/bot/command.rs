use chrono::NaiveDate;

pub const KEY_MORE: &str = "More";
pub const KEY_FOLDERS: &str = "Folders";
pub const KEY_LIKES: &str = "Likes";

/// Telegram rejects inline buttons whose callback data is longer.
pub const CALLBACK_DATA_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Random photo, photo of a day (`dd.mm.yyyy`) or name search.
    Find(Option<String>),
    /// Every photo of one day.
    Day(String),
    Folders,
    ChangeDir(String),
    Like(String),
    Unlike(String),
    Likes,
    Archive,
    Delete(String),
    /// A known command without its required argument.
    MissingArgument(&'static str),
}

impl Command {
    /// Parses message text (`/cmd arg...`) or callback data (`/cmd arg...`).
    /// Text that is not a command is a name search.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (text, None),
        };
        let head = head.to_lowercase();
        let head = head.split('@').next().unwrap_or_default();
        let arg = rest.map(str::to_string);

        let command = match head {
            "/start" => Command::Start,
            "/help" => Command::Help,
            "/find" => Command::Find(arg),
            "/date" => required(arg, "/date dd.mm.yyyy", Command::Day),
            "/folders" => Command::Folders,
            "/changedir" if arg.is_none() => Command::Folders,
            "/changedir" => required(arg, "/changedir <folder>", Command::ChangeDir),
            "/like" => required(arg, "/like <name>", Command::Like),
            "/unlike" => required(arg, "/unlike <name>", Command::Unlike),
            "/likes" | "/openlikes" => Command::Likes,
            "/archive" => Command::Archive,
            "/delete" => required(arg, "/delete <name>", Command::Delete),
            _ if head.starts_with('/') => Command::Help,
            _ => return Some(keyboard(text)),
        };

        Some(command)
    }
}

fn required(
    arg: Option<String>,
    usage: &'static str,
    build: impl FnOnce(String) -> Command,
) -> Command {
    match arg {
        Some(arg) => build(arg),
        None => Command::MissingArgument(usage),
    }
}

/// Reply-keyboard labels, in English or Russian; anything else is a search.
fn keyboard(text: &str) -> Command {
    let lower = text.to_lowercase();
    match lower.as_str() {
        "more" | "ещё" | "еще" => Command::Find(None),
        "folders" | "сменить папку" | "сменить" => Command::Folders,
        "likes" | "избранные" | "🖤" => Command::Likes,
        _ => Command::Find(Some(text.to_string())),
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(token, "%d.%m.%Y").ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Longest prefix of `arg`, cut at a char boundary, that fits in callback data
/// after `command` and a space.
pub fn callback_arg<'a>(command: &str, arg: &'a str) -> &'a str {
    let budget = CALLBACK_DATA_LIMIT.saturating_sub(command.len() + 1);
    if arg.len() <= budget {
        return arg;
    }

    let mut end = budget;
    while !arg.is_char_boundary(end) {
        end -= 1;
    }
    arg[..end].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/FIND"), Some(Command::Find(None)));
        assert_eq!(
            Command::parse("/find  IMG 12 "),
            Some(Command::Find(Some("IMG 12".into())))
        );
        assert_eq!(
            Command::parse("/like IMG_1.jpg"),
            Some(Command::Like("IMG_1.jpg".into()))
        );
        assert_eq!(Command::parse("/likes@disk_bot"), Some(Command::Likes));
        assert_eq!(Command::parse("/openlikes x"), Some(Command::Likes));
    }

    #[test]
    fn changedir_keeps_folder_names() {
        assert_eq!(
            Command::parse("/changedir Camera_Uploads"),
            Some(Command::ChangeDir("Camera_Uploads".into()))
        );
        assert_eq!(
            Command::parse("/changedir Summer 2019"),
            Some(Command::ChangeDir("Summer 2019".into()))
        );
        assert_eq!(Command::parse("/changedir"), Some(Command::Folders));
    }

    #[test]
    fn missing_arguments_are_reported() {
        assert_eq!(
            Command::parse("/like"),
            Some(Command::MissingArgument("/like <name>"))
        );
        assert_eq!(
            Command::parse("/date"),
            Some(Command::MissingArgument("/date dd.mm.yyyy"))
        );
    }

    #[test]
    fn keyboard_labels_and_plain_text() {
        assert_eq!(Command::parse("Ещё"), Some(Command::Find(None)));
        assert_eq!(Command::parse("Сменить папку"), Some(Command::Folders));
        assert_eq!(Command::parse("🖤"), Some(Command::Likes));
        assert_eq!(Command::parse(KEY_MORE), Some(Command::Find(None)));
        assert_eq!(
            Command::parse("sunset"),
            Some(Command::Find(Some("sunset".into())))
        );
        assert_eq!(Command::parse("/whatever"), Some(Command::Help));
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn callback_args_fit_the_limit() {
        assert_eq!(callback_arg("/like", "a.jpg"), "a.jpg");

        let cyrillic = "Путешествие по Золотому кольцу России 2019";
        let cut = callback_arg("/changedir", cyrillic);
        assert!(cyrillic.starts_with(cut));
        assert!(cut.len() < cyrillic.len());
        assert!(format!("/changedir {cut}").len() <= CALLBACK_DATA_LIMIT);

        let long = "x".repeat(100);
        assert_eq!(format!("/like {}", callback_arg("/like", &long)).len(), CALLBACK_DATA_LIMIT);
    }

    #[test]
    fn dates_use_day_month_year() {
        assert_eq!(
            parse_date("14.07.2019 extra"),
            NaiveDate::from_ymd_opt(2019, 7, 14)
        );
        assert_eq!(parse_date("2019-07-14"), None);
        assert_eq!(
            format_date(NaiveDate::from_ymd_opt(2019, 7, 4).unwrap()),
            "04.07.2019"
        );
    }
}
