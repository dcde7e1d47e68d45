use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtde_recipe::FieldType;
use rtde_session::{connect_with_config, Session, SessionState};
use rtde_transport::ShutdownHandle;
use tracing::{debug, info};

use crate::cmd::{load_fields, StreamArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::{print_record, OutputFormat};

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let (names, types) = requested_fields(&args)?;
    if args.frequency.is_nan() || args.frequency <= 0.0 {
        return Err(CliError::new(USAGE, "frequency must be greater than zero"));
    }

    let config = args.controller.session_config()?;
    let mut session = connect_with_config(&args.controller.host, args.controller.port, config)
        .map_err(|err| session_error("connect failed", err))?;

    let result = stream_records(&mut session, &names, types.as_deref(), &args, format);
    if session.state() == SessionState::Started {
        if let Err(err) = session.pause() {
            debug!(error = %err, "pause after streaming failed");
        }
    }
    session.disconnect();
    result
}

fn requested_fields(args: &StreamArgs) -> CliResult<(Vec<String>, Option<Vec<FieldType>>)> {
    match (&args.recipes, &args.key, &args.fields) {
        (Some(path), Some(key), _) => {
            let fields = load_fields(path, key)?;
            let names = fields.iter().map(|field| field.name.clone()).collect();
            let types = fields.iter().map(|field| field.ty).collect();
            Ok((names, Some(types)))
        }
        (None, None, Some(fields)) if !fields.is_empty() => Ok((fields.clone(), None)),
        _ => Err(CliError::new(
            USAGE,
            "either --recipes with --key or --fields is required",
        )),
    }
}

fn stream_records(
    session: &mut Session,
    names: &[String],
    types: Option<&[FieldType]>,
    args: &StreamArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    session
        .setup_output_recipe(names, types, args.frequency)
        .map_err(|err| session_error("output setup failed", err))?;
    session
        .start()
        .map_err(|err| session_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    let closer = session
        .shutdown_handle()
        .map_err(|err| session_error("shutdown handle unavailable", err))?;
    install_ctrlc_handler(running.clone(), closer)?;

    let mut printed = 0u64;
    while running.load(Ordering::SeqCst) {
        let received = session.receive();
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let Some(record) = received.map_err(|err| session_error("receive failed", err))? else {
            return Err(CliError::new(
                TRANSPORT_ERROR,
                "controller stopped sending data (connection closed or timed out)",
            ));
        };

        printed = printed.saturating_add(1);
        print_record(&record, printed, format);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    info!(records = printed, "streaming finished");
    Ok(SUCCESS)
}

/// Ctrl-C stops the loop and closes the socket so a blocked `receive` returns.
fn install_ctrlc_handler(running: Arc<AtomicBool>, closer: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = closer.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
