use crate::error::RenderError;

/// Float literal valid in Lua and PHP source: shortest round-trip digits,
/// always carrying a fractional part or exponent so it reads back as a
/// float.
pub fn float_literal(f: f64) -> Result<String, RenderError> {
    if !f.is_finite() {
        return Err(RenderError::NonFinite(f));
    }
    Ok(format!("{f:?}"))
}

/// Escape `s` for a quoted literal delimited by `quote`.
///
/// Backslash and the delimiter are always escaped. With `control` set,
/// newline, carriage return and tab become `\n`, `\r`, `\t`.
pub fn escape_quoted(s: &str, quote: char, control: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            '\n' if control => out.push_str("\\n"),
            '\r' if control => out.push_str("\\r"),
            '\t' if control => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
