//! Env file parsing for the spawned debugger process
//!
//! Uses dotenv syntax: `KEY=VALUE`, `export KEY=VALUE`, single or double
//! quoted values, `#` comments.

use std::collections::HashMap;
use std::path::Path;

use super::{Error, Result};

/// Read the variables of an env file
pub fn load(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::env_file(path, e.to_string()))?;
    parse(&content).map_err(|message| Error::env_file(path, message))
}

/// Parse env file text
///
/// Errors name the offending line when it can be located.
pub fn parse(content: &str) -> std::result::Result<HashMap<String, String>, String> {
    dotenvy::from_read_iter(content.as_bytes())
        .map(|item| item.map_err(|e| describe(content, e)))
        .collect()
}

fn describe(content: &str, err: dotenvy::Error) -> String {
    match err {
        // The fragment is the whole line or just the value part
        dotenvy::Error::LineParse(fragment, _) => {
            let fragment = fragment.trim_end();
            let line = content
                .lines()
                .position(|l| !fragment.is_empty() && l.contains(fragment));
            match line {
                Some(idx) => format!("line {}: cannot parse '{}'", idx + 1, fragment),
                None => format!("cannot parse '{}'", fragment),
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let vars = parse("# database\nDB_HOST=localhost\n\nDB_PORT=5432\n").unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["DB_HOST"], "localhost");
        assert_eq!(vars["DB_PORT"], "5432");
    }

    #[test]
    fn test_quoted_value_keeps_equals_and_spaces() {
        let vars = parse("DSN=\"user=go password=secret\"\r\nNAME='a b'\n").unwrap();
        assert_eq!(vars["DSN"], "user=go password=secret");
        assert_eq!(vars["NAME"], "a b");
    }

    #[test]
    fn test_export_prefix() {
        let vars = parse("export GOFLAGS=-mod=vendor\n").unwrap();
        assert_eq!(vars["GOFLAGS"], "-mod=vendor");
    }

    #[test]
    fn test_missing_separator_reports_line() {
        let err = parse("A=1\nBROKEN LINE\n").unwrap_err();
        assert!(err.contains("line 2"), "{}", err);
    }

    #[test]
    fn test_unterminated_quote_reports_line() {
        let err = parse("A=1\nB=2\nC=\"open\n").unwrap_err();
        assert!(err.starts_with("line 3") || err.starts_with("cannot parse"), "{}", err);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/dlvctl/.env")).unwrap_err();
        assert!(matches!(err, Error::EnvFile { .. }));
    }
}
