//! Command execution.

use crate::config::TagflowConfig;
use crate::handlers;
use crate::Commands;
use colored::Colorize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tagflow_core::{TableDefinition, TransitionRecord, WILDCARD};
use tagflow_sax::{TagEvent, TagParser};
use tagflow_stream::{translate, StreamAdapter, TagArg};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Executes a command, writing its report to `out`.
pub fn execute(cmd: Commands, config: &TagflowConfig, out: &mut dyn Write) -> CommandResult {
    match cmd {
        Commands::Run {
            table,
            initial,
            data,
            input,
        } => run(&table, initial, data.as_deref(), &input, config, out),
        Commands::Check { table } => check(&table, out),
        Commands::Actions { input } => actions(&input, config, out),
    }
}

fn run(
    table_path: &Path,
    initial: Option<String>,
    data: Option<&str>,
    input: &str,
    config: &TagflowConfig,
    out: &mut dyn Write,
) -> CommandResult {
    let definition = load_definition(table_path)?;
    let table = Arc::new(definition.compile(&handlers::builtin())?);
    let initial = initial
        .or_else(|| definition.initial.clone())
        .ok_or("no initial state: pass --initial or set 'initial' in the table")?;
    let data = match data {
        Some(arg) => parse_json_arg(arg)?,
        None => Value::Object(Default::default()),
    };

    let checksum = definition.checksum()?;
    tracing::info!(
        "running '{}' from state '{}' (checksum {})",
        table_path.display(),
        initial,
        checksum
    );

    let transitions = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&transitions);
    let mut adapter = StreamAdapter::with_parser_config(
        config.stream.parser_config(),
        table,
        initial,
        data,
    )
    .with_observer(move |record| sink.borrow_mut().push(record.clone()));

    let mut reader = open_input(input)?;
    let mut buf = vec![0u8; config.stream.chunk_size];
    loop {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        let written = adapter.write(&buf[..n]);
        print_transitions(out, &transitions)?;
        if let Err(e) = written {
            writeln!(out, "{} in state {}", "Stopped".red(), adapter.state().yellow())?;
            return Err(e.into());
        }
    }
    let ended = adapter.end();
    print_transitions(out, &transitions)?;
    if let Err(e) = ended {
        writeln!(out, "{} in state {}", "Stopped".red(), adapter.state().yellow())?;
        return Err(e.into());
    }

    writeln!(out, "{} {}", "Final state:".bold(), adapter.state().green())?;
    if config.output.show_data {
        writeln!(out, "{}", format_json(adapter.data()))?;
    }
    Ok(())
}

fn check(table_path: &Path, out: &mut dyn Write) -> CommandResult {
    let definition = load_definition(table_path)?;
    let table = definition.compile(&handlers::builtin())?;

    writeln!(
        out,
        "{} table {} (checksum: {})",
        "Valid".green(),
        table_path.display().to_string().cyan(),
        definition.checksum()?
    )?;
    if let Some(initial) = &definition.initial {
        writeln!(out, "  initial: {}", initial.yellow())?;
    }

    for (state, row) in &definition.states {
        let label = if state == WILDCARD {
            format!("{} (any state)", state)
        } else {
            state.clone()
        };
        writeln!(out, "  {}", label.bold())?;
        for (action, entry) in row {
            match entry.handler() {
                Some(handler) => writeln!(
                    out,
                    "    {} -> {} [{}]",
                    action,
                    entry.target().yellow(),
                    handler.cyan()
                )?,
                None => writeln!(out, "    {} -> {}", action, entry.target().yellow())?,
            }
        }
    }

    // Targets with no row of their own accept only wildcard actions
    let terminal: BTreeSet<&str> = definition
        .states
        .values()
        .flat_map(|row| row.values().map(|entry| entry.target()))
        .filter(|target| !table.has_state(target))
        .collect();
    if !terminal.is_empty() {
        let names: Vec<&str> = terminal.into_iter().collect();
        writeln!(out, "  {} {}", "terminal:".dimmed(), names.join(", "))?;
    }

    Ok(())
}

fn actions(input: &str, config: &TagflowConfig, out: &mut dyn Write) -> CommandResult {
    let mut parser = TagParser::with_config(config.stream.parser_config());
    let mut reader = open_input(input)?;
    let mut buf = vec![0u8; config.stream.chunk_size];

    loop {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        parser.feed(&buf[..n])?;
        while let Some(event) = parser.next_event()? {
            print_action(out, event)?;
        }
    }
    parser.finish()?;
    while let Some(event) = parser.next_event()? {
        print_action(out, event)?;
    }
    Ok(())
}

fn print_action(out: &mut dyn Write, event: TagEvent) -> io::Result<()> {
    let (action, args) = translate(event);
    match args.first() {
        Some(TagArg::Tag(tag)) if !tag.attributes.is_empty() => {
            let attrs: Vec<String> = tag
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={:?}", k, v))
                .collect();
            writeln!(out, "{} {}", action.cyan(), attrs.join(" "))
        }
        Some(TagArg::Text(data)) => writeln!(out, "{} {:?}", action.cyan(), data),
        _ => writeln!(out, "{}", action.cyan()),
    }
}

fn print_transitions(
    out: &mut dyn Write,
    transitions: &RefCell<Vec<TransitionRecord>>,
) -> io::Result<()> {
    for record in transitions.borrow_mut().drain(..) {
        let mut line = format!(
            "{} --{}--> {}",
            record.from.yellow(),
            record.action.cyan(),
            record.to.green()
        );
        if record.wildcard {
            line.push_str(&format!(" {}", "(*)".dimmed()));
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Loads a definition, choosing YAML or JSON by file extension.
fn load_definition(path: &Path) -> Result<TableDefinition, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read table '{}': {}", path.display(), e))?;
    let definition = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => TableDefinition::from_yaml(&content)?,
        _ => TableDefinition::from_json_str(&content)?,
    };
    Ok(definition)
}

/// Reads the next chunk, retrying reads interrupted by a signal.
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn open_input(input: &str) -> io::Result<Box<dyn Read>> {
    if input == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(input)?))
    }
}

/// Parses JSON argument (or reads from file if starts with @).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
