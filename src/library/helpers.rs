//! Various small helper functions

use std::num::ParseIntError;
use std::time::Duration;

/// Splits the input string into two parts at the first occurence of the separator
///
/// Returns `None` if the separator is missing or either side would be empty.
pub fn split_into_two<'a>(input: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    match input.split_once(separator) {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => Some((left, right)),
        _ => None,
    }
}

/// Uppercases the first character of the input, leaving the remainder untouched
pub fn capitalize(input: &str) -> String {
    let mut characters = input.chars();

    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

/// Name of the machine this process is running on
///
/// Reads the `HOSTNAME` environment variable and falls back to `/etc/hostname`.
pub fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
}

/// Identifier unique to this process on this machine
pub fn process_identity() -> String {
    let host = hostname().unwrap_or_else(|| "localhost".into());
    format!("{}-{}", host, std::process::id())
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn split_at_first_separator() {
        assert_eq!(split_into_two("a:b:c", ":"), Some(("a", "b:c")));
    }

    #[test]
    fn refuse_empty_halves() {
        assert_eq!(split_into_two(":b", ":"), None);
        assert_eq!(split_into_two("a:", ":"), None);
        assert_eq!(split_into_two("ab", ":"), None);
    }

    #[test]
    fn capitalize_words() {
        assert_eq!(capitalize("user"), "User");
        assert_eq!(capitalize("Sync"), "Sync");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn parse_seconds_from_string() {
        assert_eq!(parse_seconds("5"), Ok(Duration::from_secs(5)));
        assert!(parse_seconds("five").is_err());
    }

    #[test]
    fn derive_process_identity() {
        let identity = process_identity();
        assert!(identity.ends_with(&format!("-{}", std::process::id())));
    }
}
