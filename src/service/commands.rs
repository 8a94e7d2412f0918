//! Four-letter administrative commands.
//!
//! A client sends exactly four ASCII bytes; the service answers with plain
//! text and closes the connection.

use std::collections::BTreeSet;
use std::fmt;

/// Commands answered by the embedded service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FourLetterWord {
    /// Full server status including connected clients.
    Stat,
    /// Server status without the client list.
    Srvr,
    /// Liveness check answered with `imok`.
    Ruok,
    /// Configuration dump.
    Conf,
}

impl FourLetterWord {
    pub const ALL: [FourLetterWord; 4] = [
        FourLetterWord::Stat,
        FourLetterWord::Srvr,
        FourLetterWord::Ruok,
        FourLetterWord::Conf,
    ];

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"stat" => Some(FourLetterWord::Stat),
            b"srvr" => Some(FourLetterWord::Srvr),
            b"ruok" => Some(FourLetterWord::Ruok),
            b"conf" => Some(FourLetterWord::Conf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FourLetterWord::Stat => "stat",
            FourLetterWord::Srvr => "srvr",
            FourLetterWord::Ruok => "ruok",
            FourLetterWord::Conf => "conf",
        }
    }
}

impl fmt::Display for FourLetterWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of commands the service is allowed to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandWhitelist {
    All,
    Only(BTreeSet<FourLetterWord>),
}

impl CommandWhitelist {
    /// Parse a whitelist property value. Unknown words are ignored; a missing
    /// value allows `srvr` only.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return CommandWhitelist::Only(BTreeSet::from([FourLetterWord::Srvr]));
        };
        if value.trim() == "*" {
            return CommandWhitelist::All;
        }
        let words = value
            .split(',')
            .filter_map(|word| FourLetterWord::parse(word.trim().as_bytes()))
            .collect();
        CommandWhitelist::Only(words)
    }

    pub fn allows(&self, command: FourLetterWord) -> bool {
        match self {
            CommandWhitelist::All => true,
            CommandWhitelist::Only(words) => words.contains(&command),
        }
    }
}

/// Response sent for a command outside the whitelist.
pub fn not_whitelisted_response(command: FourLetterWord) -> String {
    format!(
        "{} is not executed because it is not in the whitelist.\n",
        command
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_words_only() {
        assert_eq!(FourLetterWord::parse(b"stat"), Some(FourLetterWord::Stat));
        assert_eq!(FourLetterWord::parse(b"ruok"), Some(FourLetterWord::Ruok));
        assert_eq!(FourLetterWord::parse(b"STAT"), None);
        assert_eq!(FourLetterWord::parse(b"sta"), None);
    }

    #[test]
    fn default_whitelist_is_srvr_only() {
        let whitelist = CommandWhitelist::parse(None);
        assert!(whitelist.allows(FourLetterWord::Srvr));
        assert!(!whitelist.allows(FourLetterWord::Stat));
    }

    #[test]
    fn star_allows_everything() {
        let whitelist = CommandWhitelist::parse(Some(" * "));
        assert!(FourLetterWord::ALL.iter().all(|w| whitelist.allows(*w)));
    }

    #[test]
    fn explicit_list_ignores_unknown_words() {
        let whitelist = CommandWhitelist::parse(Some("stat, ruok,dump"));
        assert!(whitelist.allows(FourLetterWord::Stat));
        assert!(whitelist.allows(FourLetterWord::Ruok));
        assert!(!whitelist.allows(FourLetterWord::Conf));
    }

    #[test]
    fn rejection_message_names_command() {
        assert_eq!(
            not_whitelisted_response(FourLetterWord::Stat),
            "stat is not executed because it is not in the whitelist.\n"
        );
    }
}
