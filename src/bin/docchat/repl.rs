//! Interactive chat REPL with slash commands and a LaTeX draft mode.

use crate::{bold, combined_text, cyan, dim, green, print_notices, report_loaded};
use anyhow::Result;
use docchat::extract;
use docchat::latex;
use docchat::{Assistant, ChatModel, Language, Mode, ModelSelection, Notice, Role, Session};
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};

const HELP: &str = "\
/reset                 clear the conversation
/mode chat|latex       switch between chat and the LaTeX editor
/export <file>         save the conversation (.html or .pdf)
/models                list local Ollama models
/transcript            print the conversation so far
/view [file]           write the chat view page (default chat-view.html)
/pdf <path>            load another PDF
/image <path>          OCR another image
/analyze               structured analysis of the loaded documents
/verify                check the last answer against the documents
/language en|zh        switch the prompt language
/preview [file]        (latex) check the draft and write an HTML preview
/clear                 (latex) discard the draft
/help, /exit";

/// What the loop should do after a command.
enum Flow {
    Continue,
    Exit,
}

/// Interactive chat REPL over one [`Session`].
pub struct ChatRepl {
    assistant: Assistant,
    selection: ModelSelection,
    documents: Vec<String>,
    session: Session,
    editor: rustyline::DefaultEditor,
}

impl ChatRepl {
    pub fn new(
        assistant: Assistant,
        selection: ModelSelection,
        documents: Vec<String>,
    ) -> Result<Self> {
        let mut session = Session::new();
        session.initialize();
        Ok(Self {
            assistant,
            selection,
            documents,
            session,
            editor: rustyline::DefaultEditor::new()?,
        })
    }

    /// Run the interactive loop until `/exit` or Ctrl+D.
    pub async fn run(&mut self) -> Result<()> {
        let provider = self.assistant.provider(&self.selection);
        println!(
            "{} {}  {}",
            cyan("◆"),
            bold("docchat"),
            dim(&format!(
                "{}  ·  {} document(s)  ·  /help for commands, Ctrl+D to exit",
                provider.label(),
                self.documents.iter().filter(|d| !d.trim().is_empty()).count()
            ))
        );

        loop {
            let prompt = match self.session.mode() {
                Mode::Chat => "you> ",
                Mode::Latex => "tex> ",
            };
            let line = tokio::task::block_in_place(|| self.editor.readline(prompt));
            match line {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(trimmed);
                    let flow = if let Some(command) = trimmed.strip_prefix('/') {
                        self.command(command).await
                    } else {
                        self.input(&line).await;
                        Flow::Continue
                    };
                    print_notices(&mut self.session);
                    if matches!(flow, Flow::Exit) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        std::mem::take(&mut self.session).destroy();
        Ok(())
    }

    async fn input(&mut self, line: &str) {
        match self.session.mode() {
            Mode::Chat => {
                let text = combined_text(&self.documents);
                let exchange = self
                    .assistant
                    .submit(&mut self.session, line, &self.selection, text.as_deref())
                    .await;
                if let Some(exchange) = exchange {
                    print_reply(&exchange.assistant.content);
                }
            }
            Mode::Latex => {
                let mut draft = self.session.latex_text().to_string();
                if !draft.is_empty() {
                    draft.push('\n');
                }
                draft.push_str(line.trim_end());
                self.session.set_latex_text(draft);
            }
        }
    }

    async fn command(&mut self, command: &str) -> Flow {
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "exit" | "quit" => return Flow::Exit,
            "help" => println!("{HELP}"),
            "reset" => {
                self.session.reset();
                self.session.push_notice(Notice::info("Conversation cleared."));
            }
            "mode" => match arg {
                "chat" => self.session.set_mode(Mode::Chat),
                "latex" => self.session.set_mode(Mode::Latex),
                _ => self.session.push_notice(Notice::warning("Usage: /mode chat|latex")),
            },
            "export" => self.export(arg).await,
            "models" => {
                for name in self.assistant.list_local_models().await {
                    println!("  {name}");
                }
            }
            "transcript" => {
                if self.session.transcript().is_empty() {
                    println!("{}", dim("No messages yet."));
                }
                for turn in self.session.transcript() {
                    match turn.role {
                        Role::User => println!("{} {}", bold("you>"), turn.content),
                        Role::Assistant => print_reply(&turn.content),
                    }
                }
            }
            "view" => self.view(arg).await,
            "pdf" | "image" if arg.is_empty() => self
                .session
                .push_notice(Notice::warning(format!("Usage: /{name} <path>"))),
            "pdf" | "image" => {
                let config = self.assistant.config();
                let (text, notice) = if name == "pdf" {
                    extract::document_text(arg, config).await
                } else {
                    extract::image_text(arg, config).await
                };
                report_loaded(arg, &text, notice, false);
                self.documents.push(text);
            }
            "analyze" => {
                let content = combined_text(&self.documents).unwrap_or_default();
                match self.assistant.analyze(&self.selection, &content).await {
                    Ok(reply) => print_reply(&reply),
                    Err(e) => self.session.push_notice(Notice::error(e.to_string())),
                }
            }
            "verify" => self.verify().await,
            "language" => match arg.parse::<Language>() {
                Ok(language) => {
                    self.assistant.set_language(language);
                    self.session
                        .push_notice(Notice::info(format!("Prompt language: {}", language.tag())));
                }
                Err(e) => self.session.push_notice(Notice::warning(e.to_string())),
            },
            "preview" => self.preview(arg).await,
            "clear" => self.session.set_latex_text(""),
            _ => self.session.push_notice(Notice::warning(format!(
                "Unknown command '/{command}'. Type /help."
            ))),
        }
        Flow::Continue
    }

    async fn export(&mut self, arg: &str) {
        if arg.is_empty() {
            self.session
                .push_notice(Notice::warning("Usage: /export <file.html|file.pdf>"));
            return;
        }
        let path = Path::new(arg);
        match docchat::write_export(path, self.session.transcript()).await {
            Ok(_) => println!("{} {}", green("✔"), bold(arg)),
            Err(e) => self.session.push_notice(Notice::error(e.to_string())),
        }
    }

    async fn view(&mut self, arg: &str) {
        let path = if arg.is_empty() {
            PathBuf::from("chat-view.html")
        } else {
            PathBuf::from(arg)
        };
        let height = self.assistant.config().chat_height;
        let html = docchat::export::chat_view_page(self.session.transcript(), height);
        match docchat::export::write_atomic(&path, html.as_bytes()).await {
            Ok(()) => println!("{} {}", green("✔"), bold(&path.display().to_string())),
            Err(e) => self.session.push_notice(Notice::error(e.to_string())),
        }
    }

    async fn verify(&mut self) {
        let Some(answer) = self.session.last_answer().map(|t| t.content.clone()) else {
            self.session
                .push_notice(Notice::warning("Nothing to verify yet; ask a question first."));
            return;
        };
        let source = combined_text(&self.documents).unwrap_or_default();
        match self.assistant.verify(&self.selection, &answer, &source).await {
            Ok(reply) => print_reply(&reply),
            Err(e) => self.session.push_notice(Notice::error(e.to_string())),
        }
    }

    async fn preview(&mut self, arg: &str) {
        let draft = self.session.latex_text().to_string();
        if draft.trim().is_empty() {
            self.session
                .push_notice(Notice::warning("The LaTeX draft is empty. Use /mode latex."));
            return;
        }
        if let Err(issue) = latex::check(&draft) {
            self.session
                .push_notice(Notice::error(format!("Error rendering LaTeX: {issue}")));
            return;
        }
        let path = if arg.is_empty() {
            PathBuf::from("latex-preview.html")
        } else {
            PathBuf::from(arg)
        };
        let html = latex::preview_html(&draft);
        match docchat::export::write_atomic(&path, html.as_bytes()).await {
            Ok(()) => println!("{} {}", green("✔"), bold(&path.display().to_string())),
            Err(e) => self.session.push_notice(Notice::error(e.to_string())),
        }
    }
}

fn print_reply(content: &str) {
    println!("{} {}", green("assistant>"), content);
}
