use rtde_session::{connect_with_config, ControllerVersion, Session};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct InfoOutput {
    schema_id: &'static str,
    host: String,
    port: u16,
    protocol_version: u16,
    controller_version: ControllerVersion,
    minimum_version: ControllerVersion,
    supported: bool,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.controller.session_config()?;
    let protocol_version = config.protocol_version;
    let mut session = connect_with_config(&args.controller.host, args.controller.port, config)
        .map_err(|err| session_error("connect failed", err))?;

    let version = query_version(&mut session)?;
    session.disconnect();

    let out = InfoOutput {
        schema_id: "https://schemas.3leaps.dev/rtde/cli/v1/controller-info.schema.json",
        host: args.controller.host,
        port: args.controller.port,
        protocol_version,
        controller_version: version,
        minimum_version: ControllerVersion::MINIMUM,
        supported: version.meets_minimum(),
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn query_version(session: &mut Session) -> CliResult<ControllerVersion> {
    session
        .get_controller_version()
        .map_err(|err| session_error("controller version request failed", err))?
        .ok_or_else(|| {
            CliError::new(
                TIMEOUT,
                format!(
                    "controller version request timed out after {:?}",
                    session.config().timeout
                ),
            )
        })
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Controller Info:");
            println!("  Address:          {}:{}", out.host, out.port);
            println!("  Protocol:         RTDE v{}", out.protocol_version);
            println!("  Version:          {}", out.controller_version);
            let support = if out.supported {
                "yes".to_string()
            } else {
                format!("no (minimum {})", out.minimum_version)
            };
            println!("  Supported:        {support}");
        }
    }
}
