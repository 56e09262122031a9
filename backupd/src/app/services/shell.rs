// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// Single-quotes a value for a POSIX shell command line.
pub fn sh_escape(value: &str) -> String {
    let mut out = String::from("'");
    out.push_str(&value.replace('\'', r"'\''"));
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_escapes_quotes() {
        assert_eq!(sh_escape("/var/backups/db.tgz"), "'/var/backups/db.tgz'");
        assert_eq!(sh_escape("it's"), "'it'\\''s'");
    }
}
