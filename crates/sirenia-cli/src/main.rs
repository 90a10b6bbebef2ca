use serde::Serialize;
use sirenia::Describer;
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    NoDiagram,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::NoDiagram => write!(f, "No diagram detected"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Describe,
    Model,
    Detect,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    diagram_type: Option<String>,
    pretty: bool,
    short_only: bool,
    detailed_only: bool,
}

fn usage() -> &'static str {
    "sirenia-cli\n\
\n\
USAGE:\n\
  sirenia-cli [describe] [--type <tag>] [--short | --detailed] [--pretty] [<path>|-]\n\
  sirenia-cli model [--type <tag>] [--pretty] [<path>|-]\n\
  sirenia-cli detect [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - describe prints {short, shortHtml, detailed} as JSON by default;\n\
    --short prints just the plain caption, --detailed just the HTML narrative.\n\
  - The diagram type is taken from the first significant line unless --type\n\
    is given (flowchart, graph, sequenceDiagram, timeline, journey).\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1).peekable();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "describe" => args.command = Command::Describe,
            "model" => args.command = Command::Model,
            "detect" => args.command = Command::Detect,
            "--pretty" => args.pretty = true,
            "--short" => args.short_only = true,
            "--detailed" => args.detailed_only = true,
            "--type" => {
                let Some(tag) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.diagram_type = Some(tag.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.short_only && args.detailed_only {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

/// First-significant-line classification; a stand-in for the host surface's
/// diagram-type classifier.
fn detect_type(text: &str) -> Option<String> {
    for line in text.lines() {
        let t = line.trim();
        if t.is_empty() || t.starts_with("%%") || t.starts_with('#') {
            continue;
        }
        let first = t
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches(';');
        let lower = first.to_ascii_lowercase();
        return match lower.as_str() {
            "" => None,
            "flowchart" | "graph" => Some("flowchart".to_string()),
            "sequencediagram" => Some("sequence".to_string()),
            "timeline" => Some("timeline".to_string()),
            "journey" => Some("journey".to_string()),
            _ => Some(first.to_string()),
        };
    }
    None
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    let diagram_type = args
        .diagram_type
        .clone()
        .or_else(|| detect_type(&text))
        .ok_or(CliError::NoDiagram)?;

    let describer = Describer::new();
    match args.command {
        Command::Detect => {
            println!("{diagram_type}");
            Ok(())
        }
        Command::Model => {
            let Some(model) = describer.parse_model(&diagram_type, &text) else {
                return Err(CliError::NoDiagram);
            };
            write_json(&model, args.pretty)
        }
        Command::Describe => {
            let description = describer.describe(&diagram_type, &text);
            if args.short_only {
                println!("{}", description.short);
                Ok(())
            } else if args.detailed_only {
                println!("{}", description.detailed);
                Ok(())
            } else {
                write_json(&description, args.pretty)
            }
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(CliError::NoDiagram) => {
            eprintln!("{}", CliError::NoDiagram);
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_type_maps_fence_keywords_to_tags() {
        assert_eq!(detect_type("flowchart TD\nA-->B\n").as_deref(), Some("flowchart"));
        assert_eq!(detect_type("graph LR;A-->B;").as_deref(), Some("flowchart"));
        assert_eq!(detect_type("sequenceDiagram\nA->>B: hi\n").as_deref(), Some("sequence"));
        assert_eq!(detect_type("timeline\n2002: x\n").as_deref(), Some("timeline"));
        assert_eq!(detect_type("journey\nA: 1: B\n").as_deref(), Some("journey"));
        assert_eq!(detect_type("%% comment\njourney\n").as_deref(), Some("journey"));
        assert_eq!(detect_type("mindmap\n  root\n").as_deref(), Some("mindmap"));
        assert_eq!(detect_type("   \n"), None);
    }

    #[test]
    fn parse_args_rejects_conflicting_output_flags() {
        let argv: Vec<String> = ["sirenia-cli", "--short", "--detailed"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(matches!(parse_args(&argv), Err(CliError::Usage(_))));
    }

    #[test]
    fn parse_args_accepts_command_type_and_path() {
        let argv: Vec<String> = ["sirenia-cli", "model", "--type", "sequence", "--pretty", "in.mmd"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let args = parse_args(&argv).unwrap();
        assert!(matches!(args.command, Command::Model));
        assert_eq!(args.diagram_type.as_deref(), Some("sequence"));
        assert!(args.pretty);
        assert_eq!(args.input.as_deref(), Some("in.mmd"));
    }
}
