pub mod router;

use derive_more::{Display, Error};

use crate::model::{Direction, TargetPrice};

pub const USAGE: &str = "Welcome to the Crypto Price Alert Bot! 🤖\n\n\
Commands:\n\
/alert <symbol> <price> <above/below>\n\
Example: /alert bitcoin 30000 above\n\n\
/myalerts - View your active alerts\n\
/cancel - Cancel all your alerts";

/// User-facing rejection of a command. `Display` is the reply text.
#[derive(Debug, Display, Error, PartialEq)]
pub enum CommandError {
    #[display("❌ Invalid format. Use: /alert <symbol> <price> <above/below>")]
    Format,
    #[display("❌ Invalid price value")]
    InvalidPrice,
    #[display("❌ Invalid cryptocurrency symbol")]
    InvalidSymbol,
    #[display("❌ /{command} takes no arguments")]
    UnexpectedArguments { command: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Alert {
        symbol: String,
        target_price: TargetPrice,
        direction: Direction,
    },
    MyAlerts,
    Cancel,
}

/// Parse a chat message.
///
/// `Ok(None)` means the text is not a command this bot answers to, including
/// `/cmd@OtherBot` in group chats. Syntax is fully checked here so nothing
/// downstream runs for a malformed `/alert`.
pub fn parse(text: &str, bot_username: &str) -> Result<Option<Command>, CommandError> {
    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };
    let Some(name) = head.strip_prefix('/') else {
        return Ok(None);
    };
    // Group chats address commands as `/cmd@BotName`.
    let name = match name.split_once('@') {
        Some((name, target)) if target.eq_ignore_ascii_case(bot_username) => name,
        Some(_) => return Ok(None),
        None => name,
    };
    let args: Vec<&str> = tokens.collect();

    let command = match name {
        "start" | "help" => Command::Start,
        "myalerts" => no_arguments("myalerts", &args, Command::MyAlerts)?,
        "cancel" => no_arguments("cancel", &args, Command::Cancel)?,
        "alert" => parse_alert(&args)?,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn no_arguments(
    name: &'static str,
    args: &[&str],
    command: Command,
) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::UnexpectedArguments { command: name })
    }
}

fn parse_alert(args: &[&str]) -> Result<Command, CommandError> {
    let [symbol, price, direction] = args else {
        return Err(CommandError::Format);
    };

    let direction = Direction::parse(direction).ok_or(CommandError::Format)?;
    let target_price = price
        .parse::<f64>()
        .ok()
        .and_then(TargetPrice::new)
        .ok_or(CommandError::InvalidPrice)?;

    Ok(Command::Alert {
        symbol: symbol.to_lowercase(),
        target_price,
        direction,
    })
}
