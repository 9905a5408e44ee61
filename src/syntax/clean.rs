//! Source cleaning.
//!
//! Removes everything that is not part of a declaration: `/* */` and `//`
//! comments, bracketed index blocks, `#` header lines and blank lines. The
//! result is a fixed point, so cleaning cleaned text changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// `[ Funcon name Alias other  Type name ... ]` tables of contents.
static INDEX_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\[\s*(?:(?:(?:Built-in|Auxiliary)\s+)?",
        r"(?:Funcon|Type|Datatype|Entity|Meta-variables|Assert)\s+[^\s\[\]]+",
        r"(?:\s+Alias\s+[^\s\[\]]+)*\s*)+\]"
    ))
    .expect("index block pattern is valid")
});

pub fn clean(text: &str) -> String {
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let without_comments = strip_comments(text);
    let without_headers = strip_headers(&without_comments);
    let without_index = INDEX_BLOCK.replace_all(&without_headers, " ");
    collapse_lines(&without_index)
}

/// Block comments nest and become a single space; line comments run to the
/// end of the line. Neither is recognised inside a string literal.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '"' || c == '\n' {
                in_string = false;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('*')) => {
                chars.next();
                let mut depth = 1usize;
                while depth > 0 {
                    match (chars.next(), chars.peek()) {
                        (Some('/'), Some('*')) => {
                            chars.next();
                            depth += 1;
                        }
                        (Some('*'), Some('/')) => {
                            chars.next();
                            depth -= 1;
                        }
                        (Some(_), _) => {}
                        (None, _) => break,
                    }
                }
                out.push(' ');
            }
            ('/', Some('/')) => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_headers(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
