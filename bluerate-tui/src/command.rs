use bluerate_common::ChartMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch,                    // /fetch
    Amount(f64),              // /amount <dollars>
    AmountAndFetch(f64),      // bare number
    Mode(ChartMode),          // /mode <structured|screenshot>
    Help,                     // /help
    Quit,                     // /quit or /exit
    Invalid(String),
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return match parse_amount(trimmed) {
            Ok(dollars) => Command::AmountAndFetch(dollars),
            Err(msg) if looks_numeric(trimmed) => Command::Invalid(msg),
            Err(_) => Command::Unknown(trimmed.to_string()),
        };
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match verb {
        "/fetch" => Command::Fetch,
        "/amount" => match rest {
            None => Command::Invalid("usage: /amount <dollars>".into()),
            Some(text) => match parse_amount(text) {
                Ok(dollars) => Command::Amount(dollars),
                Err(msg) => Command::Invalid(msg),
            },
        },
        "/mode" => match rest.map(str::parse::<ChartMode>) {
            None => Command::Invalid("usage: /mode <structured|screenshot>".into()),
            Some(Ok(mode)) => Command::Mode(mode),
            Some(Err(e)) => Command::Invalid(e.to_string()),
        },
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Dollar amounts: finite, not negative, `,` allowed as a thousands separator.
pub fn parse_amount(text: &str) -> Result<f64, String> {
    let cleaned = text.trim().trim_start_matches('$').replace(',', "");
    let dollars: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{text}' is not a dollar amount"))?;
    if !dollars.is_finite() {
        return Err(format!("'{text}' is not a dollar amount"));
    }
    if dollars < 0.0 {
        return Err("the dollar amount cannot be negative".into());
    }
    Ok(dollars)
}

fn looks_numeric(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | '$'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_sets_amount_and_fetches() {
        assert_eq!(parse_command("100"), Command::AmountAndFetch(100.0));
        assert_eq!(parse_command(" $1,250.5 "), Command::AmountAndFetch(1250.5));
        assert_eq!(parse_command("0"), Command::AmountAndFetch(0.0));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(parse_command("-5"), Command::Invalid(_)));
        assert!(matches!(parse_command("/amount -1"), Command::Invalid(_)));
    }

    #[test]
    fn verbs() {
        assert_eq!(parse_command("/fetch"), Command::Fetch);
        assert_eq!(parse_command("/amount 42"), Command::Amount(42.0));
        assert_eq!(
            parse_command("/mode image"),
            Command::Mode(ChartMode::Screenshot)
        );
        assert!(matches!(parse_command("/mode pie"), Command::Invalid(_)));
        assert!(matches!(parse_command("/amount"), Command::Invalid(_)));
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/help"), Command::Help);
    }

    #[test]
    fn free_text_is_unknown() {
        assert_eq!(parse_command("hello"), Command::Unknown("hello".into()));
        assert_eq!(parse_command("/convert x"), Command::Unknown("/convert x".into()));
        assert!(matches!(parse_command("12abc"), Command::Invalid(_)));
        assert!(matches!(parse_command("inf"), Command::Unknown(_)));
    }
}
