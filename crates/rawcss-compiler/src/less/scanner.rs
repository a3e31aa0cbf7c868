//! Comment removal
//!
//! Comments are replaced before parsing so the parser never sees them.
//! Newlines inside comments are kept, so line numbers stay accurate.

use crate::error::CompileError;

pub(crate) fn strip_comments(source: &str) -> Result<String, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let end = string_end(&chars, i).ok_or_else(|| CompileError::syntax(line, "unterminated string"))?;
                for &ch in &chars[i..end] {
                    if ch == '\n' {
                        line += 1;
                    }
                    out.push(ch);
                }
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start_line = line;
                let mut j = i + 2;
                loop {
                    if j + 1 >= chars.len() {
                        return Err(CompileError::syntax(start_line, "unterminated comment"));
                    }
                    if chars[j] == '*' && chars[j + 1] == '/' {
                        break;
                    }
                    if chars[j] == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    j += 1;
                }
                out.push(' ');
                i = j + 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' if ends_with_url(&out) => {
                let end = paren_end(&chars, i).ok_or_else(|| CompileError::syntax(line, "unterminated url()"))?;
                for &ch in &chars[i..end] {
                    if ch == '\n' {
                        line += 1;
                    }
                    out.push(ch);
                }
                i = end;
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Index just past the closing quote of the string starting at `start`
pub(crate) fn string_end(chars: &[char], start: usize) -> Option<usize> {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the `)` matching the `(` at `start`, skipping strings
pub(crate) fn paren_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '"' | '\'' => i = string_end(chars, i)?,
            ')' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

pub(crate) fn ends_with_url(out: &str) -> bool {
    let tail: Vec<char> = out.chars().rev().take(4).collect();
    if tail.len() < 3 {
        return false;
    }
    let word: String = tail[..3].iter().rev().collect();
    let boundary = tail.get(3).map_or(true, |c| !(c.is_alphanumeric() || *c == '-' || *c == '_'));
    word.eq_ignore_ascii_case("url") && boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_comments_keep_newlines() {
        let out = strip_comments("a/* x\ny */b").unwrap();
        assert_eq!(out, "a\n b");
    }

    #[test]
    fn line_comments_stop_at_newline() {
        assert_eq!(strip_comments("a // x\nb").unwrap(), "a \nb");
    }

    #[test]
    fn strings_and_urls_are_verbatim() {
        let source = "a{b:\"//not\";c:url(http://x/*y*/)}";
        assert_eq!(strip_comments(source).unwrap(), source);
    }

    #[test]
    fn custom_url_function_names_are_not_urls() {
        assert_eq!(strip_comments("myurl(a // b\n)").unwrap(), "myurl(a \n)");
    }

    #[test]
    fn unterminated_comment_reports_start_line() {
        let err = strip_comments("a\n/* never closed").unwrap_err();
        assert_eq!(err.line(), 2);
    }
}
