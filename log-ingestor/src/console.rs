use std::io::{self, BufRead, Write};

use num_format::{Locale, ToFormattedString};
use tracing::error;

use crate::{
    error::{QueryError, StoreError},
    models::StoredRecord,
    query::QueryService,
};

/// Numbered menu over the store: 1 lists everything, 2 filters by status, 3 exits.
/// End of input also exits.
pub fn run<R: BufRead, W: Write>(
    query: &QueryService,
    mut input: R,
    mut out: W,
    json: bool,
) -> io::Result<()> {
    loop {
        writeln!(out, "1. View logs")?;
        writeln!(out, "2. Filter logs by status code")?;
        writeln!(out, "3. Exit")?;
        out.flush()?;

        let Some(choice) = read_line(&mut input)? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => print_records(&mut out, query.list_all(), json)?,
            "2" => {
                write!(out, "Enter status code: ")?;
                out.flush()?;
                let Some(code) = read_line(&mut input)? else {
                    return Ok(());
                };
                // Piped input is not echoed; end the prompt line so records start on their own.
                writeln!(out)?;
                match query.filter_by_status(&code) {
                    Ok(records) => print_records(&mut out, Ok(records), json)?,
                    Err(QueryError::Input(e)) => writeln!(out, "Invalid status code: {e}")?,
                    Err(QueryError::Store(e)) => print_records(&mut out, Err(e), json)?,
                }
            }
            "3" => return Ok(()),
            other => writeln!(out, "Unknown choice {other:?}, enter 1, 2 or 3")?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_records<W: Write>(
    out: &mut W,
    records: Result<Vec<StoredRecord>, StoreError>,
    json: bool,
) -> io::Result<()> {
    let records = match records {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "query failed");
            return writeln!(out, "Query failed: {e}");
        }
    };
    for stored in &records {
        if json {
            serde_json::to_writer(&mut *out, stored)?;
            writeln!(out)?;
        } else {
            let r = &stored.record;
            writeln!(
                out,
                "{}: {} {} {} - {}",
                r.timestamp, r.method, r.path, r.protocol, r.status
            )?;
        }
    }
    writeln!(
        out,
        "{} records",
        records.len().to_formatted_string(&Locale::en)
    )
}
