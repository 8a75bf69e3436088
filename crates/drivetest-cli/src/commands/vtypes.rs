//! The `drivetest vtypes` command.

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde_json::json;

use super::output::print_json;
use super::{Context, OutputFormat};

pub fn execute(ctx: &Context, format: OutputFormat) -> Result<()> {
    let coverage = ctx.loader.coverage()?;

    match format {
        OutputFormat::Json => print_json(&json!({ "vehicle_types": coverage })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["Type", "Name", "Covers", "Subject 1", "Subject 4"]);
            for c in &coverage {
                table.add_row(vec![
                    Cell::new(c.vehicle_type),
                    Cell::new(&c.name),
                    Cell::new(c.covers.join("/")),
                    Cell::new(c.subject1),
                    Cell::new(c.subject4),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}
