use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtde_recipe::{FieldSpec, FieldType, FieldValue, Record};
use rtde_session::{connect_with_config, Session};
use serde::Serialize;

use crate::cmd::{load_fields, WriteArgs};
use crate::exit::{recipe_error, session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{format_value, OutputFormat};

#[derive(Serialize)]
struct WriteOutput<'a> {
    schema_id: &'a str,
    recipe_id: u8,
    fields: &'a Record,
}

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let fields = load_fields(&args.recipes, &args.key)?;
    let values = parse_assignments(&fields, &args.assignments)?;
    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    let types: Vec<FieldType> = fields.iter().map(|field| field.ty).collect();

    let config = args.controller.session_config()?;
    let mut session = connect_with_config(&args.controller.host, args.controller.port, config)
        .map_err(|err| session_error("connect failed", err))?;

    let result = write_record(&mut session, &names, &types, values);
    session.disconnect();
    let record = result?;

    print_written(&record, format);
    Ok(SUCCESS)
}

/// Typed values for each `name=value` assignment, checked against the recipe.
fn parse_assignments(
    fields: &[FieldSpec],
    assignments: &[(String, String)],
) -> CliResult<Vec<(String, FieldValue)>> {
    assignments
        .iter()
        .map(|(name, text)| {
            let field = fields
                .iter()
                .find(|field| &field.name == name)
                .ok_or_else(|| CliError::new(USAGE, format!("field '{name}' is not in the recipe")))?;
            let value = FieldValue::parse(field.ty, text)
                .map_err(|err| recipe_error(&format!("--set {name}"), err))?;
            Ok((name.clone(), value))
        })
        .collect()
}

fn write_record(
    session: &mut Session,
    names: &[&str],
    types: &[FieldType],
    values: Vec<(String, FieldValue)>,
) -> CliResult<Record> {
    let mut record = session
        .setup_input_recipe(names, Some(types))
        .map_err(|err| session_error("input setup failed", err))?;
    for (name, value) in values {
        record
            .set(&name, value)
            .map_err(|err| recipe_error("record", err))?;
    }

    session
        .start()
        .map_err(|err| session_error("start failed", err))?;
    session
        .send(&record)
        .map_err(|err| session_error("send failed", err))?;
    session
        .pause()
        .map_err(|err| session_error("pause failed", err))?;
    Ok(record)
}

fn print_written(record: &Record, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = WriteOutput {
                schema_id: "https://schemas.3leaps.dev/rtde/cli/v1/record-written.schema.json",
                recipe_id: record.recipe_id(),
                fields: record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "TYPE", "VALUE"]);
            for (name, value) in record.iter() {
                table.add_row(vec![
                    name.to_string(),
                    value.field_type().to_string(),
                    format_value(value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("wrote recipe {}:", record.recipe_id());
            for (name, value) in record.iter() {
                println!("  {name} = {}", format_value(value));
            }
        }
    }
}
