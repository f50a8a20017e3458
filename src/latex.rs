//! LaTeX draft checking and preview.
//!
//! The check is structural only: braces must balance and every
//! `\begin{env}` needs a matching `\end{env}`. It catches the mistakes
//! that make a renderer show nothing at all, and reports the first one
//! with a 1-based line number. Rendering itself happens in the browser
//! (KaTeX) from the page built by [`preview_html`].

use crate::export::escape_html;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// First structural problem found in a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatexIssue {
    /// A `}` with no open `{`.
    UnexpectedCloseBrace { line: usize },
    /// `{` opened on `line` never closed.
    UnclosedBrace { line: usize },
    /// `\end{found}` while `\begin{expected}` is open.
    MismatchedEnd {
        line: usize,
        expected: String,
        found: String,
    },
    /// `\end{env}` with no open environment.
    UnexpectedEnd { line: usize, env: String },
    /// `\begin{env}` on `line` never ended.
    UnclosedEnvironment { line: usize, env: String },
}

impl fmt::Display for LatexIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatexIssue::UnexpectedCloseBrace { line } => {
                write!(f, "line {line}: '}}' without a matching '{{'")
            }
            LatexIssue::UnclosedBrace { line } => write!(f, "line {line}: '{{' is never closed"),
            LatexIssue::MismatchedEnd {
                line,
                expected,
                found,
            } => write!(f, "line {line}: \\end{{{found}}} closes \\begin{{{expected}}}"),
            LatexIssue::UnexpectedEnd { line, env } => {
                write!(f, "line {line}: \\end{{{env}}} without \\begin{{{env}}}")
            }
            LatexIssue::UnclosedEnvironment { line, env } => {
                write!(f, "line {line}: \\begin{{{env}}} is never ended")
            }
        }
    }
}

static RE_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\{([^}]*)\}").unwrap());

/// Validate brace and environment balance.
pub fn check(source: &str) -> Result<(), LatexIssue> {
    check_braces(source)?;
    check_environments(source)
}

fn check_braces(source: &str) -> Result<(), LatexIssue> {
    let mut open: Vec<usize> = Vec::new();
    let mut escaped = false;

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        for c in line.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                // A comment runs to the end of the line.
                '%' => break,
                '{' => open.push(line_no),
                '}' => {
                    if open.pop().is_none() {
                        return Err(LatexIssue::UnexpectedCloseBrace { line: line_no });
                    }
                }
                _ => {}
            }
        }
        escaped = false;
    }

    match open.pop() {
        Some(line) => Err(LatexIssue::UnclosedBrace { line }),
        None => Ok(()),
    }
}

fn check_environments(source: &str) -> Result<(), LatexIssue> {
    let mut stack: Vec<(String, usize)> = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let code = strip_comment(line);
        for caps in RE_ENV.captures_iter(code) {
            let env = caps[2].trim().to_string();
            if &caps[1] == "begin" {
                stack.push((env, line_no));
                continue;
            }
            match stack.pop() {
                Some((open, _)) if open == env => {}
                Some((open, _)) => {
                    return Err(LatexIssue::MismatchedEnd {
                        line: line_no,
                        expected: open,
                        found: env,
                    })
                }
                None => return Err(LatexIssue::UnexpectedEnd { line: line_no, env }),
            }
        }
    }

    match stack.pop() {
        Some((env, line)) => Err(LatexIssue::UnclosedEnvironment { line, env }),
        None => Ok(()),
    }
}

/// Text before an unescaped `%`.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%' && (i == 0 || bytes[i - 1] != b'\\') {
            return &line[..i];
        }
    }
    line
}

/// A standalone page that typesets `source` with KaTeX auto-render.
///
/// The draft is HTML-escaped and placed inside `$$ … $$`, so a draft of
/// plain math (`\frac{a}{b}`) renders as display math. Newlines stay raw
/// text: auto-render only finds delimiters within a single text node.
pub fn preview_html(source: &str) -> String {
    let body = escape_html(source.trim());
    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset='utf-8'/>\n\
<title>LaTeX Preview</title>\n\
<link rel='stylesheet' href='https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.css'>\n\
<script defer src='https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.js'></script>\n\
<script defer src='https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/contrib/auto-render.min.js' \
onload=\"renderMathInElement(document.body, {{throwOnError: false}});\"></script>\n\
</head>\n\
<body style='background-color:#222; color:#EEE; font-family:Arial;'>\n\
<div id='latex-preview' style='width:80%; margin:0 auto; padding:10px;'>$${body}$$</div>\n\
</body>\n\
</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_math_passes() {
        assert!(check(r"\frac{a}{b} + \sqrt{x^{2}}").is_ok());
        assert!(check("").is_ok());
    }

    #[test]
    fn escaped_braces_are_ignored() {
        assert!(check(r"\{ x \mid x > 0 \}").is_ok());
    }

    #[test]
    fn comments_are_ignored() {
        assert!(check("x^2 % unbalanced { in a comment\n+ y").is_ok());
        assert!(check(r"50\% of {n}").is_ok());
    }

    #[test]
    fn unclosed_brace_reports_opening_line() {
        let err = check("a\n\\frac{a}{b\n+ c").unwrap_err();
        assert_eq!(err, LatexIssue::UnclosedBrace { line: 2 });
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn stray_close_brace() {
        assert_eq!(
            check("x}").unwrap_err(),
            LatexIssue::UnexpectedCloseBrace { line: 1 }
        );
    }

    #[test]
    fn environments_must_nest() {
        let ok = "\\begin{align}\n\\begin{cases} a \\end{cases}\n\\end{align}";
        assert!(check(ok).is_ok());

        let bad = "\\begin{align}\nx\n\\end{equation}";
        assert_eq!(
            check(bad).unwrap_err(),
            LatexIssue::MismatchedEnd {
                line: 3,
                expected: "align".into(),
                found: "equation".into(),
            }
        );
    }

    #[test]
    fn unended_environment() {
        let err = check("\\begin{matrix} 1 & 2").unwrap_err();
        assert_eq!(
            err,
            LatexIssue::UnclosedEnvironment {
                line: 1,
                env: "matrix".into()
            }
        );
    }

    #[test]
    fn preview_escapes_and_wraps() {
        let html = preview_html("a < b");
        assert!(html.contains("$$a &lt; b$$"));
        assert!(html.contains("katex"));
        assert!(html.contains("throwOnError: false"));
    }

    #[test]
    fn preview_keeps_multiline_draft_in_one_block() {
        let html = preview_html("\\begin{aligned}\na = b \\\\\nc = d\n\\end{aligned}");
        assert!(!html.contains("<br>"));
        assert!(html.contains("$$\\begin{aligned}\na = b \\\\\nc = d\n\\end{aligned}$$"));
    }
}
