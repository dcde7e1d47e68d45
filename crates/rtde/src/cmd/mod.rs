use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use rtde_recipe::{FieldSpec, RecipeBook};
use rtde_session::{SessionConfig, DEFAULT_FREQUENCY};
use rtde_transport::DEFAULT_PORT;

use crate::exit::{recipe_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod stream;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Connect to a controller and print its version.
    Info(InfoArgs),
    /// Subscribe to output fields and print the records.
    Stream(StreamArgs),
    /// Write one input record.
    Write(WriteArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Stream(args) => stream::run(args, format),
        Command::Write(args) => write::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Where the controller is and how long to wait for it.
#[derive(Args, Debug)]
pub struct ControllerArgs {
    /// Controller host name or address.
    pub host: String,
    /// RTDE port.
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT, env = "RTDE_PORT")]
    pub port: u16,
    /// Connect, socket and reply timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

impl ControllerArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(SessionConfig::default().with_timeout(timeout))
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub controller: ControllerArgs,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub controller: ControllerArgs,
    /// Recipe file (JSON) holding the output recipe.
    #[arg(
        long,
        value_name = "FILE",
        requires = "key",
        conflicts_with = "fields",
        required_unless_present = "fields"
    )]
    pub recipes: Option<PathBuf>,
    /// Key of the output recipe in the recipe file.
    #[arg(long, requires = "recipes")]
    pub key: Option<String>,
    /// Output fields to subscribe to (comma-separated). Types come from the controller.
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,
    /// Output frequency in Hz.
    #[arg(long, default_value_t = DEFAULT_FREQUENCY)]
    pub frequency: f64,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub controller: ControllerArgs,
    /// Recipe file (JSON) holding the input recipe.
    #[arg(long, value_name = "FILE")]
    pub recipes: PathBuf,
    /// Key of the input recipe in the recipe file.
    #[arg(long)]
    pub key: String,
    /// Field assignment `name=value`. Fields not set are sent as zero.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment, required = true)]
    pub assignments: Vec<(String, String)>,
}

/// Fields of the recipe stored under `key` in the recipe file at `path`.
pub fn load_fields(path: &Path, key: &str) -> CliResult<Vec<FieldSpec>> {
    let book = RecipeBook::from_path(path).map_err(|err| recipe_error("recipe file", err))?;
    let recipe = book
        .recipe(key)
        .map_err(|err| recipe_error("recipe file", err))?;
    Ok(recipe.fields.clone())
}

fn parse_assignment(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{input}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{input}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("bad").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("speed_slider_mask=1").unwrap(),
            ("speed_slider_mask".to_string(), "1".to_string())
        );
        assert_eq!(
            parse_assignment("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("no_value").is_err());
        assert!(parse_assignment("=1").is_err());
    }
}
