//! Slash-command parsing and the permission table.

use crate::bot::access::Permission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Profile,
    Cancel,
    Chat,
    EndChat,
    Contact,
    Feedback,
    Language,
    SetLanguage(String),
    RemindMe(String),
    MyInfo,
    Settings,
    UserInfo(String),
    Broadcast(String),
    Users,
    Promote(String),
    Demote(String),
    Stats,
    Owner,
    Status,
    Unknown(String),
    /// `/cmd@some_other_bot` in a group.
    ForOtherBot,
}

impl Command {
    /// Parse `/name[@bot] [args]`. Returns `None` if `text` is not a command.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim().to_string()),
            None => (rest, String::new()),
        };
        if head.is_empty() {
            return None;
        }

        let name = match head.split_once('@') {
            Some((name, target)) => {
                // Without a resolved username every addressed command is taken as ours.
                let ours = bot_username.is_none_or(|me| me.eq_ignore_ascii_case(target));
                if !ours {
                    return Some(Command::ForOtherBot);
                }
                name
            }
            None => head,
        };

        let command = match name.to_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "profile" => Command::Profile,
            "cancel" => Command::Cancel,
            "chat" => Command::Chat,
            "endchat" => Command::EndChat,
            "contact" => Command::Contact,
            "feedback" => Command::Feedback,
            "language" => Command::Language,
            "setlanguage" => Command::SetLanguage(args),
            "remindme" => Command::RemindMe(args),
            "myinfo" => Command::MyInfo,
            "settings" => Command::Settings,
            "userinfo" => Command::UserInfo(args),
            "broadcast" => Command::Broadcast(args),
            "users" => Command::Users,
            "promote" => Command::Promote(args),
            "demote" => Command::Demote(args),
            "stats" => Command::Stats,
            "owner" => Command::Owner,
            "status" => Command::Status,
            other => Command::Unknown(format!("/{other}")),
        };
        Some(command)
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Start => "/start",
            Command::Help => "/help",
            Command::Profile => "/profile",
            Command::Cancel => "/cancel",
            Command::Chat => "/chat",
            Command::EndChat => "/endchat",
            Command::Contact => "/contact",
            Command::Feedback => "/feedback",
            Command::Language => "/language",
            Command::SetLanguage(_) => "/setlanguage",
            Command::RemindMe(_) => "/remindme",
            Command::MyInfo => "/myinfo",
            Command::Settings => "/settings",
            Command::UserInfo(_) => "/userinfo",
            Command::Broadcast(_) => "/broadcast",
            Command::Users => "/users",
            Command::Promote(_) => "/promote",
            Command::Demote(_) => "/demote",
            Command::Stats => "/stats",
            Command::Owner => "/owner",
            Command::Status => "/status",
            Command::Unknown(name) => name,
            Command::ForOtherBot => "",
        }
    }

    pub fn permission(&self) -> Permission {
        match self {
            Command::UserInfo(_) => Permission::Moderator,
            Command::Broadcast(_)
            | Command::Users
            | Command::Promote(_)
            | Command::Demote(_)
            | Command::Stats => Permission::Admin,
            Command::Owner | Command::Status => Permission::Owner,
            _ => Permission::Everyone,
        }
    }

    /// Not listed in /help.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            Command::Owner | Command::Status | Command::Users | Command::Promote(_) | Command::Demote(_)
        )
    }

    /// Text written to the command log.
    pub fn log_label(&self) -> String {
        match self {
            Command::Promote(args) | Command::Demote(args) => {
                let target = args.split_whitespace().next().unwrap_or("N/A");
                format!("{} {}", self.name(), target)
            }
            _ if self.is_hidden() => format!("{} (hidden)", self.name()),
            _ => self.name().to_string(),
        }
    }
}
