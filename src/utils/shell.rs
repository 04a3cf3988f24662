//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for POSIX `sh` execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote an argument for `cmd.exe /C`.
///
/// cmd has no single-quote form; arguments with spaces or metacharacters are
/// wrapped in double quotes and embedded double quotes are doubled.
///
/// Quotes do not stop cmd from expanding `%VAR%`, so each `%` is emitted
/// outside the quotes as `^%`. The program still receives one argument.
pub fn quote_cmd_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }

    const CMD_META: &[char] = &[' ', '\t', '"', '&', '|', '<', '>', '^', '(', ')', '%', '!'];

    if !arg.contains(CMD_META) {
        return arg.to_string();
    }

    let escaped = arg.replace('"', "\"\"").replace('%', "\"^%\"");
    format!("\"{}\"", escaped)
}

/// Quote an argument for PowerShell `-Command`.
///
/// Single-quoted strings are literal in PowerShell; embedded single quotes
/// are doubled.
pub fn quote_powershell_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const PS_META: &[char] = &[
        ' ', '\t', '\'', '"', '$', '`', '&', '|', '<', '>', ';', '(', ')', '{', '}', '@', '#',
        ',',
    ];

    if !arg.contains(PS_META) {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', "''"))
}
