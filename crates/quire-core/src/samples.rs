//! Lexical checks for fenced code samples embedded in chapter sources.

use serde::Serialize;

/// Problem found in a code sample. `line` is 1-based within the sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampleIssue {
    pub line: usize,
    pub message: String,
}

/// Checks the code of one fenced sample written in `language`.
pub trait SampleChecker {
    fn check(&self, language: &str, code: &str) -> Vec<SampleIssue>;
}

/// Verifies that brackets, braces and parentheses balance, skipping string
/// literals and comments.
#[derive(Clone, Copy, Debug, Default)]
pub struct DelimiterChecker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommentStyle {
    /// `//` line comments, `/* */` blocks and `'x'` character literals.
    Slash,
    /// `#` line comments, both quote kinds delimit strings.
    Hash,
}

fn comment_style(language: &str) -> CommentStyle {
    match language.to_ascii_lowercase().as_str() {
        "ruby" | "rb" | "python" | "py" | "sh" | "bash" | "shell" | "zsh" | "perl" | "r"
        | "yaml" | "yml" | "toml" | "elixir" | "crystal" => CommentStyle::Hash,
        _ => CommentStyle::Slash,
    }
}

impl SampleChecker for DelimiterChecker {
    fn check(&self, language: &str, code: &str) -> Vec<SampleIssue> {
        let style = comment_style(language);
        let chars: Vec<char> = code.chars().collect();
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut string: Option<(char, usize)> = None;
        let mut block_comment: Option<usize> = None;
        let mut line = 1usize;
        let mut index = 0usize;

        while index < chars.len() {
            let ch = chars[index];
            let next = chars.get(index + 1).copied();

            if ch == '\n' {
                line += 1;
                index += 1;
                continue;
            }

            if block_comment.is_some() {
                if ch == '*' && next == Some('/') {
                    block_comment = None;
                    index += 2;
                } else {
                    index += 1;
                }
                continue;
            }

            if let Some((quote, _)) = string {
                if ch == '\\' {
                    if next == Some('\n') {
                        line += 1;
                    }
                    index += 2;
                    continue;
                }
                if ch == quote {
                    string = None;
                }
                index += 1;
                continue;
            }

            match (style, ch) {
                (CommentStyle::Slash, '/') if next == Some('/') => {
                    index = skip_to_line_end(&chars, index);
                    continue;
                }
                (CommentStyle::Slash, '/') if next == Some('*') => {
                    block_comment = Some(line);
                    index += 2;
                    continue;
                }
                (CommentStyle::Slash, '\'') => {
                    index = skip_char_literal(&chars, index);
                    continue;
                }
                (CommentStyle::Slash, 'r' | 'b') => {
                    if let Some((hashes, quote)) = raw_string_prefix(&chars, index) {
                        let open_line = line;
                        match skip_raw_string(&chars, quote, hashes, &mut line) {
                            Some(end) => index = end,
                            None => {
                                string = Some(('"', open_line));
                                index = chars.len();
                            }
                        }
                        continue;
                    }
                }
                (CommentStyle::Hash, '#') => {
                    index = skip_to_line_end(&chars, index);
                    continue;
                }
                (CommentStyle::Hash, '\'') | (_, '"') => {
                    string = Some((ch, line));
                    index += 1;
                    continue;
                }
                _ => {}
            }

            match ch {
                '(' | '[' | '{' => stack.push((ch, line)),
                ')' | ']' | '}' => {
                    let expected_open = opening_for(ch);
                    match stack.pop() {
                        Some((open, _)) if open == expected_open => {}
                        Some((open, open_line)) => {
                            return vec![SampleIssue {
                                line,
                                message: format!(
                                    "unexpected `{ch}`, expected `{}` to close `{open}` from line {open_line}",
                                    closing_for(open)
                                ),
                            }];
                        }
                        None => {
                            return vec![SampleIssue {
                                line,
                                message: format!("unexpected `{ch}` with nothing to close"),
                            }];
                        }
                    }
                }
                _ => {}
            }
            index += 1;
        }

        let mut issues = Vec::new();
        if let Some(open_line) = block_comment {
            issues.push(SampleIssue {
                line: open_line,
                message: format!("unterminated block comment opened on line {open_line}"),
            });
        }
        if let Some((_, open_line)) = string {
            issues.push(SampleIssue {
                line: open_line,
                message: format!("unterminated string literal opened on line {open_line}"),
            });
        }
        for (open, open_line) in stack {
            issues.push(SampleIssue {
                line: open_line,
                message: format!("unclosed `{open}` opened on line {open_line}"),
            });
        }
        issues
    }
}

fn skip_to_line_end(chars: &[char], mut index: usize) -> usize {
    while index < chars.len() && chars[index] != '\n' {
        index += 1;
    }
    index
}

/// Skip `'x'` or `'\n'`; a lone quote (a lifetime or label) is stepped over.
fn skip_char_literal(chars: &[char], index: usize) -> usize {
    match (chars.get(index + 1), chars.get(index + 2)) {
        (Some('\\'), Some(_)) => {
            // The escaped character itself may be a quote.
            let mut cursor = index + 3;
            while cursor < chars.len() && cursor <= index + 12 && chars[cursor] != '\n' {
                if chars[cursor] == '\'' {
                    return cursor + 1;
                }
                cursor += 1;
            }
            index + 1
        }
        (Some(_), Some('\'')) => index + 3,
        _ => index + 1,
    }
}

/// Recognise `r"`, `r#"`, `br##"` and friends at `index`. Returns the number
/// of hashes and the position of the opening quote.
fn raw_string_prefix(chars: &[char], index: usize) -> Option<(usize, usize)> {
    if index > 0 {
        let previous = chars[index - 1];
        if previous.is_alphanumeric() || previous == '_' {
            return None;
        }
    }
    let mut cursor = index;
    if chars.get(cursor) == Some(&'b') {
        cursor += 1;
    }
    if chars.get(cursor) != Some(&'r') {
        return None;
    }
    cursor += 1;
    let mut hashes = 0usize;
    while chars.get(cursor) == Some(&'#') {
        hashes += 1;
        cursor += 1;
    }
    (chars.get(cursor) == Some(&'"')).then_some((hashes, cursor))
}

/// Position just past the raw string opened at `quote`, or `None` when it
/// never closes. Backslashes carry no meaning inside.
fn skip_raw_string(chars: &[char], quote: usize, hashes: usize, line: &mut usize) -> Option<usize> {
    let mut cursor = quote + 1;
    while cursor < chars.len() {
        match chars[cursor] {
            '\n' => *line += 1,
            '"' => {
                let closing = (1..=hashes).all(|offset| chars.get(cursor + offset) == Some(&'#'));
                if closing {
                    return Some(cursor + 1 + hashes);
                }
            }
            _ => {}
        }
        cursor += 1;
    }
    None
}

fn opening_for(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
