//! Command parser for the : command system

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Wallet
    Connect,
    Account(String),

    // Registry actions
    Register(String),
    Submit,
    Verify(usize),

    // Views
    Refresh,
    Quit,

    // Unknown command
    Unknown(String),
}

/// Parse a command string (without the leading :)
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let mut parts = input.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let args = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.to_lowercase().as_str() {
        "connect" | "conn" => Command::Connect,
        "account" | "acct" | "use" => match args {
            Some(addr) => Command::Account(addr),
            None => Command::Unknown(input.to_string()),
        },
        // The name may contain spaces, so take the whole remainder
        "register" | "reg" => match args {
            Some(name) => Command::Register(name),
            None => Command::Unknown(input.to_string()),
        },
        "submit" | "attend" => Command::Submit,
        "verify" | "v" => {
            let index = args
                .as_deref()
                .map(|s| s.trim_start_matches('#'))
                .and_then(|s| s.parse().ok());
            match index {
                Some(index) => Command::Verify(index),
                None => Command::Unknown(input.to_string()),
            }
        }
        "refresh" | "reload" => Command::Refresh,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Unknown(input.to_string()),
    }
}
