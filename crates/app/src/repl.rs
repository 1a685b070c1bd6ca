use crate::render::render_message;
use docchat_core::{load_uploads, EmbeddingProvider, LanguageModel, Session};
use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const HELP: &str = "\
Type a question to continue the conversation.
  /direct <question>   answer from the documents only, with reference texts
  /upload <pdf>...     replace the document index with new pdfs
  /history             show the conversation so far
  /reset               clear the conversation
  /save <file>         write the conversation as json
  /quit                leave
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    Direct(String),
    Upload(Vec<PathBuf>),
    History,
    Reset,
    Save(PathBuf),
    Help,
    Quit,
    Nothing,
}

pub fn parse_command(line: &str) -> Result<ChatCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatCommand::Nothing);
    }
    if !line.starts_with('/') {
        return Ok(ChatCommand::Ask(line.to_string()));
    }

    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((line, ""));

    match name {
        "/direct" if !rest.is_empty() => Ok(ChatCommand::Direct(rest.to_string())),
        "/upload" if !rest.is_empty() => Ok(ChatCommand::Upload(
            rest.split_whitespace().map(PathBuf::from).collect(),
        )),
        "/save" if !rest.is_empty() => Ok(ChatCommand::Save(PathBuf::from(rest))),
        "/direct" | "/upload" | "/save" => Err(format!("{name} needs an argument")),
        "/history" => Ok(ChatCommand::History),
        "/reset" => Ok(ChatCommand::Reset),
        "/help" => Ok(ChatCommand::Help),
        "/quit" | "/exit" => Ok(ChatCommand::Quit),
        other => Err(format!("unknown command {other}, try /help")),
    }
}

/// Reads commands until `/quit` or end of input. Failed requests are
/// reported and the loop carries on with the session as it was.
pub fn run<E, L, R, W>(session: &mut Session<E, L>, input: R, mut output: W) -> anyhow::Result<()>
where
    E: EmbeddingProvider,
    L: LanguageModel,
    R: BufRead,
    W: Write,
{
    write!(output, "{HELP}")?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let parsed = match line {
            Ok(line) => parse_command(&line),
            Err(error) if error.kind() == ErrorKind::InvalidData => {
                Err(format!("skipped a line that is not valid utf-8: {error}"))
            }
            Err(error) => return Err(error.into()),
        };
        let command = match parsed {
            Ok(command) => command,
            Err(problem) => {
                writeln!(output, "{problem}")?;
                write!(output, "> ")?;
                output.flush()?;
                continue;
            }
        };

        match command {
            ChatCommand::Quit => break,
            ChatCommand::Nothing => {}
            ChatCommand::Help => write!(output, "{HELP}")?,
            ChatCommand::Ask(question) => match session.ask(&question) {
                Ok(pair) => write_messages(&mut output, pair)?,
                Err(error) => writeln!(output, "error: {error}")?,
            },
            ChatCommand::Direct(question) => match session.query_direct(&question) {
                Ok(pair) => write_messages(&mut output, pair)?,
                Err(error) => writeln!(output, "error: {error}")?,
            },
            ChatCommand::Upload(paths) => {
                let uploaded = load_uploads(&paths)
                    .map_err(anyhow::Error::from)
                    .and_then(|uploads| session.upload(&uploads).map_err(anyhow::Error::from));
                match uploaded {
                    Ok(report) => crate::report_upload(&mut output, &report)?,
                    Err(error) => {
                        warn!(reason = %error, "upload failed");
                        writeln!(output, "upload failed, previous documents stay loaded: {error}")?;
                    }
                }
            }
            ChatCommand::History => write_messages(&mut output, session.messages())?,
            ChatCommand::Reset => {
                session.reset();
                writeln!(output, "conversation cleared")?;
            }
            ChatCommand::Save(path) => match save_transcript(session, &path) {
                Ok(count) => writeln!(output, "saved {count} messages to {}", path.display())?,
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "save failed");
                    writeln!(output, "save failed: {error}")?;
                }
            },
        }

        write!(output, "> ")?;
        output.flush()?;
    }

    Ok(())
}

fn save_transcript<E, L>(session: &Session<E, L>, path: &Path) -> anyhow::Result<usize>
where
    E: EmbeddingProvider,
    L: LanguageModel,
{
    let json = session.conversation().to_json()?;
    std::fs::write(path, json)?;
    Ok(session.messages().len())
}

fn write_messages<W: Write>(output: &mut W, messages: &[docchat_core::Message]) -> std::io::Result<()> {
    for message in messages {
        write!(output, "{}", render_message(message))?;
    }
    Ok(())
}
