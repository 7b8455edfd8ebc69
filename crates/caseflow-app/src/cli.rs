use std::path::PathBuf;

use caseflow_core::parse_rfc3339;
use caseflow_domain::{ActorId, RequestId, SortMode, StatusCode, StatusGroup, TemplateId, TopicCode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveArgs {
    pub request_id: RequestId,
    pub column: Option<StatusGroup>,
    pub status: Option<StatusCode>,
    pub comment: Option<String>,
    pub important_date_at: Option<String>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Board {
        limit: Option<u32>,
        sort_mode: Option<SortMode>,
    },
    Move(MoveArgs),
    Claim {
        request_id: RequestId,
    },
    Reassign {
        request_id: RequestId,
        lawyer_id: ActorId,
    },
    Watch {
        request_id: RequestId,
        hidden: bool,
    },
    /// Posts `body`, or composes from stdin (with typing signals) when it is absent.
    Send {
        request_id: RequestId,
        body: Option<String>,
    },
    Templates {
        topic_code: Option<TopicCode>,
        search: Option<String>,
    },
    Template {
        template_id: TemplateId,
    },
    Help,
}

pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };
    let rest = args.collect::<Vec<_>>();

    match command.as_str() {
        "board" => parse_board(rest),
        "move" => parse_move(rest).map(Command::Move),
        "claim" => {
            let [request_id] = positionals::<1>(&command, rest)?;
            Ok(Command::Claim {
                request_id: request_id.into(),
            })
        }
        "reassign" => {
            let [request_id, lawyer_id] = positionals::<2>(&command, rest)?;
            Ok(Command::Reassign {
                request_id: request_id.into(),
                lawyer_id: lawyer_id.into(),
            })
        }
        "watch" => parse_watch(rest),
        "send" => parse_send(rest),
        "templates" => parse_templates(rest),
        "template" => {
            let [template_id] = positionals::<1>(&command, rest)?;
            Ok(Command::Template {
                template_id: template_id.into(),
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(CliError::usage(format!(
            "Unknown command '{other}'. Run with --help for valid commands."
        ))),
    }
}

pub fn print_usage() {
    println!("Usage: caseflow <command> [options]");
    println!();
    println!("  board [--limit N] [--sort updated_desc|created_asc|important_date]");
    println!("  move <request-id> (--column NEW|IN_PROGRESS|WAITING|DONE | --status CODE)");
    println!("       [--comment TEXT] [--important-date RFC3339] [--file PATH]...");
    println!("       (asks which status to use when several fit the column)");
    println!("  claim <request-id>");
    println!("  reassign <request-id> <lawyer-id>");
    println!("  watch <request-id> [--hidden]   (lines typed on stdin are posted as replies)");
    println!("  send <request-id> [message...]   (reads the message from stdin when omitted)");
    println!("  templates [--topic CODE] [--search TEXT]");
    println!("  template <template-id>");
    println!();
    println!("Configuration is read from CASEFLOW_CONFIG (default ~/.config/caseflow/config.toml).");
    println!("The API token is read from CASEFLOW_API_TOKEN.");
}

fn positionals<const N: usize>(command: &str, rest: Vec<String>) -> Result<[String; N], CliError> {
    if let Some(flag) = rest.iter().find(|arg| arg.starts_with("--")) {
        return Err(CliError::usage(format!(
            "Unknown flag '{flag}' for '{command}'. Run with --help for valid flags."
        )));
    }
    let count = rest.len();
    let values = rest
        .into_iter()
        .map(|value| value.trim().to_owned())
        .collect::<Vec<_>>();
    if values.iter().any(String::is_empty) {
        return Err(CliError::usage(format!(
            "'{command}' arguments must not be empty."
        )));
    }
    values.try_into().map_err(|_| {
        CliError::usage(format!(
            "'{command}' expects {N} argument(s), got {count}. Run with --help for usage."
        ))
    })
}

fn read_flag_value(flag: &str, value: Option<String>) -> Result<String, CliError> {
    let value = value
        .ok_or_else(|| CliError::usage(format!("Missing value after {flag}.")))?
        .trim()
        .to_owned();
    if value.is_empty() {
        return Err(CliError::usage(format!(
            "Flag '{flag}' requires a non-empty value."
        )));
    }
    Ok(value)
}

fn unexpected(arg: &str) -> CliError {
    if arg.starts_with("--") {
        CliError::usage(format!(
            "Unknown flag '{arg}'. Run with --help for valid flags."
        ))
    } else {
        CliError::usage(format!(
            "Unexpected argument '{arg}'. Run with --help for valid flags."
        ))
    }
}

fn parse_board(rest: Vec<String>) -> Result<Command, CliError> {
    let mut limit = None;
    let mut sort_mode = None;
    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--limit" => {
                let raw = read_flag_value(&arg, args.next())?;
                let value = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|value| *value > 0)
                    .ok_or_else(|| CliError::usage("--limit must be a positive integer."))?;
                limit = Some(value);
            }
            "--sort" => {
                let raw = read_flag_value(&arg, args.next())?;
                sort_mode = Some(SortMode::from_key(&raw).ok_or_else(|| {
                    CliError::usage(format!(
                        "Unknown sort mode '{raw}'. Use updated_desc, created_asc or important_date."
                    ))
                })?);
            }
            other => return Err(unexpected(other)),
        }
    }
    Ok(Command::Board { limit, sort_mode })
}

fn parse_move(rest: Vec<String>) -> Result<MoveArgs, CliError> {
    let mut parsed = MoveArgs::default();
    let mut request_id = None;
    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--column" => {
                let raw = read_flag_value(&arg, args.next())?;
                parsed.column = Some(StatusGroup::from_key(&raw).ok_or_else(|| {
                    CliError::usage(format!(
                        "Unknown column '{raw}'. Use NEW, IN_PROGRESS, WAITING or DONE."
                    ))
                })?);
            }
            "--status" => {
                parsed.status = Some(read_flag_value(&arg, args.next())?.into());
            }
            "--comment" => {
                parsed.comment = Some(read_flag_value(&arg, args.next())?);
            }
            "--important-date" => {
                let raw = read_flag_value(&arg, args.next())?;
                if parse_rfc3339(&raw).is_none() {
                    return Err(CliError::usage(format!(
                        "--important-date '{raw}' is not an RFC 3339 timestamp."
                    )));
                }
                parsed.important_date_at = Some(raw);
            }
            "--file" => {
                parsed.files.push(PathBuf::from(read_flag_value(&arg, args.next())?));
            }
            value if value.starts_with("--") => return Err(unexpected(value)),
            value if request_id.is_none() && !value.trim().is_empty() => {
                request_id = Some(RequestId::new(value.trim()));
            }
            other => return Err(unexpected(other)),
        }
    }

    parsed.request_id =
        request_id.ok_or_else(|| CliError::usage("'move' needs a request id."))?;
    if parsed.column.is_none() && parsed.status.is_none() {
        return Err(CliError::usage(
            "'move' needs --column or --status to know where the request goes.",
        ));
    }
    Ok(parsed)
}

fn parse_watch(rest: Vec<String>) -> Result<Command, CliError> {
    let mut hidden = false;
    let mut request_id = None;
    for arg in rest {
        match arg.as_str() {
            "--hidden" => hidden = true,
            value if value.starts_with("--") => return Err(unexpected(value)),
            value if request_id.is_none() && !value.trim().is_empty() => {
                request_id = Some(RequestId::new(value.trim()));
            }
            other => return Err(unexpected(other)),
        }
    }
    let request_id = request_id.ok_or_else(|| CliError::usage("'watch' needs a request id."))?;
    Ok(Command::Watch { request_id, hidden })
}

fn parse_send(rest: Vec<String>) -> Result<Command, CliError> {
    let mut args = rest.into_iter();
    let request_id = args
        .next()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty() && !value.starts_with("--"))
        .ok_or_else(|| CliError::usage("'send' needs a request id."))?;
    let body = args.collect::<Vec<_>>().join(" ").trim().to_owned();
    Ok(Command::Send {
        request_id: request_id.into(),
        body: (!body.is_empty()).then_some(body),
    })
}

fn parse_templates(rest: Vec<String>) -> Result<Command, CliError> {
    let mut topic_code = None;
    let mut search = None;
    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--topic" => topic_code = Some(read_flag_value(&arg, args.next())?.into()),
            "--search" => search = Some(read_flag_value(&arg, args.next())?),
            other => return Err(unexpected(other)),
        }
    }
    Ok(Command::Templates { topic_code, search })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, CliError> {
        parse_args(args.iter().map(|arg| (*arg).to_owned()))
    }

    #[test]
    fn no_arguments_prints_help() {
        assert_eq!(parse(&[]), Ok(Command::Help));
        assert_eq!(parse(&["--help"]), Ok(Command::Help));
    }

    #[test]
    fn board_flags_are_parsed() {
        assert_eq!(
            parse(&["board", "--limit", "50", "--sort", "important_date"]),
            Ok(Command::Board {
                limit: Some(50),
                sort_mode: Some(SortMode::ImportantDate),
            })
        );
        assert!(parse(&["board", "--limit", "0"]).is_err());
        assert!(parse(&["board", "--sort", "random"]).is_err());
    }

    #[test]
    fn move_collects_target_note_and_files() {
        let command = parse(&[
            "move",
            "r-1",
            "--column",
            "done",
            "--comment",
            "Client withdrew",
            "--file",
            "withdrawal.pdf",
            "--file",
            "scan.png",
        ])
        .expect("move");

        let Command::Move(args) = command else {
            panic!("expected a move command");
        };
        assert_eq!(args.request_id.as_str(), "r-1");
        assert_eq!(args.column, Some(StatusGroup::Done));
        assert_eq!(args.status, None);
        assert_eq!(args.comment.as_deref(), Some("Client withdrew"));
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn move_requires_a_target_and_a_valid_date() {
        assert!(matches!(
            parse(&["move", "r-1"]),
            Err(CliError::Usage(message)) if message.contains("--column or --status")
        ));
        assert!(parse(&["move", "--status", "REVIEW"]).is_err());
        assert!(parse(&["move", "r-1", "--status", "REVIEW", "--important-date", "tomorrow"]).is_err());
        assert!(parse(&[
            "move",
            "r-1",
            "--status",
            "REVIEW",
            "--important-date",
            "2026-03-04T09:00:00Z"
        ])
        .is_ok());
    }

    #[test]
    fn positional_commands_check_their_arity() {
        assert_eq!(
            parse(&["reassign", "r-1", "lawyer-2"]),
            Ok(Command::Reassign {
                request_id: "r-1".into(),
                lawyer_id: "lawyer-2".into(),
            })
        );
        assert!(parse(&["reassign", "r-1"]).is_err());
        assert!(parse(&["claim", "r-1", "extra"]).is_err());
        assert!(parse(&["claim", "--force"]).is_err());
    }

    #[test]
    fn watch_accepts_the_hidden_flag() {
        assert_eq!(
            parse(&["watch", "r-1", "--hidden"]),
            Ok(Command::Watch {
                request_id: "r-1".into(),
                hidden: true,
            })
        );
    }

    #[test]
    fn send_joins_the_message_words() {
        assert_eq!(
            parse(&["send", "r-1", "Documents", "received"]),
            Ok(Command::Send {
                request_id: "r-1".into(),
                body: Some("Documents received".to_owned()),
            })
        );
        assert_eq!(
            parse(&["send", "r-1", "  "]),
            Ok(Command::Send {
                request_id: "r-1".into(),
                body: None,
            })
        );
        assert!(parse(&["send"]).is_err());
        assert!(parse(&["send", "--now"]).is_err());
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(matches!(
            parse(&["archive"]),
            Err(CliError::Usage(message)) if message.contains("Unknown command 'archive'")
        ));
    }
}
