use std::borrow::Cow;

/// Characters that pass through a POSIX shell unmolested as a single word.
fn is_safe_arg_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '@' | '%' | ':' | ',' | '.' | '/' | '=' | '+' | '_' | '-'
        )
}

/// Quote `s` so it survives as exactly one shell argument. Strings made
/// entirely of safe characters come back unchanged; everything else is
/// wrapped in single quotes, with each embedded `'` spelled as `'\''`
/// (close the quote, escape a literal quote, reopen).
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    if !s.is_empty() && s.chars().all(is_safe_arg_char) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    Cow::Owned(out)
}
