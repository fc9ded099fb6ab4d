//! Localized headings.

pub struct Strings {
    pub welcome: &'static str,
    pub help: &'static str,
    pub admin_commands: &'static str,
    pub moderator_commands: &'static str,
    pub user_commands: &'static str,
}

const EN: Strings = Strings {
    welcome: "👋 Hello {}! Welcome to our bot!",
    help: "🤖 <b>Available Commands:</b>",
    admin_commands: "👑 <b>Admin Commands:</b>",
    moderator_commands: "🔧 <b>Moderator Commands:</b>",
    user_commands: "👤 <b>User Commands:</b>",
};

const ES: Strings = Strings {
    welcome: "👋 ¡Hola {}! ¡Bienvenido a nuestro bot!",
    help: "🤖 <b>Comandos disponibles:</b>",
    admin_commands: "👑 <b>Comandos de administrador:</b>",
    moderator_commands: "🔧 <b>Comandos de moderador:</b>",
    user_commands: "👤 <b>Comandos de usuario:</b>",
};

/// Supported language codes with their picker flag.
pub const LANGUAGES: &[(&str, &str)] = &[("en", "🇺🇸"), ("es", "🇪🇸")];

pub fn is_supported(code: &str) -> bool {
    LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// Strings for `code`, else for `fallback`, else English.
pub fn strings(code: &str, fallback: &str) -> &'static Strings {
    match code {
        "en" => &EN,
        "es" => &ES,
        _ if code != fallback => strings(fallback, "en"),
        _ => &EN,
    }
}

/// Fill the `{}` placeholder of the welcome line.
pub fn welcome(code: &str, fallback: &str, name: &str) -> String {
    strings(code, fallback).welcome.replacen("{}", name, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chain() {
        assert!(strings("es", "en").help.contains("Comandos"));
        assert!(strings("fr", "es").help.contains("Comandos"));
        assert!(strings("fr", "de").help.contains("Available"));
    }

    #[test]
    fn test_welcome_placeholder() {
        assert_eq!(welcome("en", "en", "Ada"), "👋 Hello Ada! Welcome to our bot!");
    }

    #[test]
    fn test_supported() {
        assert!(is_supported("es"));
        assert!(!is_supported("fr"));
    }
}
