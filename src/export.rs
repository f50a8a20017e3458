//! Transcript export to HTML and PDF.
//!
//! The HTML is a dark, self-contained page with one styled `<div>` per
//! turn. PDF export pipes that page through `wkhtmltopdf`; when the
//! renderer is not installed the caller gets [`ExportError::RendererUnavailable`]
//! and can fall back to HTML.
//!
//! File writes are atomic (temp file + rename) so an interrupted export
//! never leaves a truncated file behind.

use crate::error::ExportError;
use crate::session::{Role, Turn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Binary used for HTML → PDF rendering.
const PDF_RENDERER: &str = "wkhtmltopdf";

/// Output format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Pdf,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("html") | Some("htm") => Ok(ExportFormat::Html),
            Some("pdf") => Ok(ExportFormat::Pdf),
            _ => Err(ExportError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Escape `&`, `<`, `>`, and quotes. Whitespace is left as is.
pub fn escape_html(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    for c in content.chars() {
        push_escaped(&mut out, c);
    }
    out
}

/// Like [`escape_html`], then turn each line break into `<br>`.
///
/// `\n`, `\r\n` and a bare `\r` each count as one break.
pub fn escape_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                out.push_str("<br>");
            }
            '\n' => out.push_str("<br>"),
            c => push_escaped(&mut out, c),
        }
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        c => out.push(c),
    }
}

/// One styled message block.
pub fn message_html(role: Role, content: &str) -> String {
    let safe = escape_content(content);
    match role {
        Role::User => format!(
            "<div style='margin-bottom:10px; padding:8px; border-radius:5px;\
             background-color:#333; color:#EEE;'>\
             <strong style='color:#C8D8FF;'>👤 User:</strong> \
             <span>{safe}</span></div>"
        ),
        Role::Assistant => format!(
            "<div style='margin-bottom:10px; padding:8px; border-radius:5px;\
             background-color:#2A2A2A; color:#EEE;'>\
             <strong style='color:#6F6;'>🤖 Assistant:</strong> \
             <span>{safe}</span></div>"
        ),
    }
}

/// Concatenated message blocks, oldest first.
pub fn messages_html(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .map(|t| message_html(t.role, &t.content))
        .collect()
}

/// Scrollable container of fixed `height` pixels.
pub fn chat_container(content: &str, height: u32) -> String {
    let content = if content.is_empty() {
        "<p style='color:#AAA;'>No messages yet.</p>"
    } else {
        content
    };
    format!(
        "<div id='chat-container' style='height:{height}px; overflow-y:auto; \
         border:1px solid #444; background-color:#222; padding:10px;'>{content}</div>"
    )
}

/// The live chat view of a transcript.
pub fn chat_view_html(transcript: &[Turn], height: u32) -> String {
    chat_container(&messages_html(transcript), height)
}

/// A standalone page showing the live chat view, scrolled to the newest
/// message.
pub fn chat_view_page(transcript: &[Turn], height: u32) -> String {
    let view = chat_view_html(transcript, height);
    format!(
        "<html>\n\
<head>\n\
    <meta charset='utf-8'/>\n\
    <title>Chat</title>\n\
</head>\n\
<body style='background-color:#222; color:#EEE; font-family:Arial;'>\n\
    {view}\n\
    <script>\n\
        var c = document.getElementById('chat-container');\n\
        c.scrollTop = c.scrollHeight;\n\
    </script>\n\
</body>\n\
</html>\n"
    )
}

/// A complete standalone page around `messages_html`.
pub fn export_page(messages_html: &str) -> String {
    format!(
        "<html>\n\
<head>\n\
    <meta charset='utf-8'/>\n\
    <title>Chat Export</title>\n\
</head>\n\
<body style='background-color:#222; color:#EEE; font-family:Arial;'>\n\
    <div style='width:80%; margin:0 auto; padding:10px;'>\n\
        <h2 style='color:#FFF;'>Exported Chat Conversation</h2>\n\
        {messages_html}\n\
    </div>\n\
</body>\n\
</html>\n"
    )
}

/// Render the whole transcript as an export page.
pub fn export_html(transcript: &[Turn]) -> String {
    export_page(&messages_html(transcript))
}

/// Render `html` to PDF bytes with `wkhtmltopdf`.
pub async fn export_pdf(html: &str) -> Result<Vec<u8>, ExportError> {
    let mut child = tokio::process::Command::new(PDF_RENDERER)
        .args(["--quiet", "--encoding", "utf-8", "-", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ExportError::RendererUnavailable
            } else {
                ExportError::RenderFailed {
                    detail: e.to_string(),
                }
            }
        })?;

    // Feed stdin from its own task so a large page cannot deadlock
    // against a full stdout pipe.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = html.as_bytes().to_vec();
        tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ExportError::RenderFailed {
            detail: e.to_string(),
        })?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(ExportError::RenderFailed {
                    detail: format!("writing page: {e}"),
                })
            }
            Err(e) => {
                return Err(ExportError::RenderFailed {
                    detail: format!("writer task panicked: {e}"),
                })
            }
        }
    }

    if !output.status.success() || !output.stdout.starts_with(b"%PDF") {
        return Err(ExportError::RenderFailed {
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    debug!("Rendered {} PDF bytes", output.stdout.len());
    Ok(output.stdout)
}

/// Export `transcript` to `path`, picking the format from the extension.
pub async fn write_export(path: &Path, transcript: &[Turn]) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    let html = export_html(transcript);
    let bytes = match format {
        ExportFormat::Html => html.into_bytes(),
        ExportFormat::Pdf => export_pdf(&html).await?,
    };
    write_atomic(path, &bytes).await?;
    info!("Exported {} turns to {}", transcript.len(), path.display());
    Ok(format)
}

/// Write via a sibling temp file and rename into place.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let failed = |source| ExportError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_markup_and_newlines() {
        assert_eq!(
            escape_content("a < b & c\r\nnext \"q\""),
            "a &lt; b &amp; c<br>next &quot;q&quot;"
        );
    }

    #[test]
    fn chat_view_page_uses_height() {
        let page = chat_view_page(&[Turn::user("hi")], 250);
        assert!(page.contains("height:250px"));
        assert!(page.contains("id='chat-container'"));
        assert!(page.contains("scrollHeight"));
        assert!(chat_view_page(&[], 100).contains("No messages yet."));
    }

    #[test]
    fn bare_carriage_return_is_a_line_break() {
        assert_eq!(escape_content("a\rb\r\n\nc"), "a<br>b<br><br>c");
    }

    #[test]
    fn escape_html_keeps_newlines() {
        assert_eq!(escape_html("x & y\n'z'"), "x &amp; y\n&#39;z&#39;");
    }

    #[test]
    fn message_blocks_by_role() {
        let user = message_html(Role::User, "hi");
        assert!(user.contains("👤 User:"));
        assert!(user.contains("<span>hi</span>"));
        let bot = message_html(Role::Assistant, "line1\nline2");
        assert!(bot.contains("🤖 Assistant:"));
        assert!(bot.contains("line1<br>line2"));
    }

    #[test]
    fn empty_container_shows_placeholder() {
        let html = chat_container("", 1024);
        assert!(html.contains("No messages yet."));
        assert!(html.contains("height:1024px"));
        assert!(!chat_view_html(&[Turn::user("x")], 600).contains("No messages yet."));
    }

    #[test]
    fn export_page_wraps_messages() {
        let page = export_html(&[Turn::user("Q"), Turn::assistant("A")]);
        assert!(page.starts_with("<html>"));
        assert!(page.contains("<meta charset='utf-8'/>"));
        assert!(page.contains("Exported Chat Conversation"));
        let q = page.find("<span>Q</span>").unwrap();
        let a = page.find("<span>A</span>").unwrap();
        assert!(q < a);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("c.HTML")).unwrap(), ExportFormat::Html);
        assert_eq!(ExportFormat::from_path(Path::new("c.pdf")).unwrap(), ExportFormat::Pdf);
        assert!(ExportFormat::from_path(Path::new("c.docx")).is_err());
        assert!(ExportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn tmp_sibling_keeps_directory() {
        let p = Path::new("/tmp/out/chat.html");
        assert_eq!(tmp_sibling(p), PathBuf::from("/tmp/out/chat.html.tmp"));
    }

    #[tokio::test]
    async fn write_html_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.html");
        let format = write_export(&path, &[Turn::user("hello")]).await.unwrap();
        assert_eq!(format, ExportFormat::Html);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<span>hello</span>"));
        assert!(!tmp_sibling(&path).exists());
    }
}
