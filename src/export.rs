//! CSV exports: a raw dump of every trace, and a one-hot error-analysis
//! sheet with one column per failure mode.

use crate::aggregate::{distinct_labels, parse_labels};
use crate::cli::ExportArgs;
use crate::db::open_db_readonly;
use crate::store::{SqliteTraceStore, Trace, TraceStore};
use crate::TraceError;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

pub const TRACES_FILENAME: &str = "traces.csv";
pub const ERROR_ANALYSIS_FILENAME: &str = "error_analysis_export.csv";

const TRACE_HEADER: [&str; 8] = [
    "id",
    "timestamp",
    "user_query",
    "bot_response",
    "error",
    "metadata",
    "notes",
    "failure_modes",
];

const ANALYSIS_HEADER: [&str; 5] = [
    "Trace_ID",
    "User_Query",
    "Dimension_Tuple_JSON",
    "Full_Bot_Trace_Summary",
    "Open_Code_Notes",
];

pub fn write_traces_csv<W: Write>(traces: &[Trace], out: W) -> Result<(), TraceError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(TRACE_HEADER)?;
    for t in traces {
        let id = t.id.to_string();
        wtr.write_record([
            id.as_str(),
            t.timestamp.as_str(),
            t.user_query.as_str(),
            t.bot_response.as_str(),
            t.error.as_deref().unwrap_or_default(),
            t.metadata.as_deref().unwrap_or_default(),
            t.notes.as_str(),
            t.failure_modes.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Spreadsheet cells stay on one line.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}

pub fn write_error_analysis_csv<W: Write>(traces: &[Trace], out: W) -> Result<(), TraceError> {
    let labels = distinct_labels(traces.iter().map(|t| t.failure_modes.as_str()));

    let mut wtr = csv::Writer::from_writer(out);
    let header: Vec<String> = ANALYSIS_HEADER
        .iter()
        .map(|h| h.to_string())
        .chain(labels.iter().map(|l| format!("Failure_Mode_{l}")))
        .collect();
    wtr.write_record(&header)?;

    for t in traces {
        let present: HashSet<&str> = parse_labels(&t.failure_modes).collect();
        let mut row = vec![
            format!("TRA{}", t.id),
            single_line(&t.user_query),
            String::new(),
            single_line(&t.bot_response),
            single_line(&t.notes),
        ];
        row.extend(labels.iter().map(|l| {
            let flag = if present.contains(l.as_str()) { "1" } else { "0" };
            flag.to_string()
        }));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_export(traces: &[Trace], error_analysis: bool, out: &mut dyn Write) -> Result<(), TraceError> {
    if error_analysis {
        write_error_analysis_csv(traces, out)
    } else {
        write_traces_csv(traces, out)
    }
}

pub fn handle_export(db_path: &Path, args: &ExportArgs) -> Result<(), TraceError> {
    let conn = open_db_readonly(db_path)?;
    let store = SqliteTraceStore::new(conn);
    let traces = store.all_traces()?;

    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            write_export(&traces, args.error_analysis, &mut file)?;
            eprintln!(
                "tracereview: exported {} traces to {}",
                traces.len(),
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_export(&traces, args.error_analysis, &mut lock)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(id: i64, query: &str, notes: &str, modes: &str) -> Trace {
        Trace {
            id,
            timestamp: "2025-06-01 10:00:00".into(),
            user_query: query.into(),
            bot_response: "line1\nline2".into(),
            error: None,
            metadata: Some(r#"{"model":"gpt-4o-mini"}"#.into()),
            notes: notes.into(),
            failure_modes: modes.into(),
        }
    }

    fn read_rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        rdr.records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn traces_csv_keeps_every_column() {
        let traces = vec![trace(2, "Has, comma \"quoted\"", "n", "a")];
        let mut buf = Vec::new();
        write_traces_csv(&traces, &mut buf).unwrap();

        let rows = read_rows(&buf);
        assert_eq!(rows[0], TRACE_HEADER.map(String::from).to_vec());
        assert_eq!(rows[1][0], "2");
        assert_eq!(rows[1][2], "Has, comma \"quoted\"");
        assert_eq!(rows[1][3], "line1\nline2");
        assert_eq!(rows[1][4], "");
        assert_eq!(rows[1][5], r#"{"model":"gpt-4o-mini"}"#);
    }

    #[test]
    fn error_analysis_one_hot_columns() {
        let traces = vec![
            trace(3, "q3", "too salty", "serving_size, missing_prep_detail"),
            trace(2, "q2\nsecond line", "", ""),
            trace(1, "q1", "", "ignores_allergy"),
        ];
        let mut buf = Vec::new();
        write_error_analysis_csv(&traces, &mut buf).unwrap();

        let rows = read_rows(&buf);
        assert_eq!(
            rows[0],
            vec![
                "Trace_ID",
                "User_Query",
                "Dimension_Tuple_JSON",
                "Full_Bot_Trace_Summary",
                "Open_Code_Notes",
                "Failure_Mode_ignores_allergy",
                "Failure_Mode_missing_prep_detail",
                "Failure_Mode_serving_size",
            ]
        );
        assert_eq!(rows[1], vec!["TRA3", "q3", "", "line1 line2", "too salty", "0", "1", "1"]);
        assert_eq!(rows[2], vec!["TRA2", "q2 second line", "", "line1 line2", "", "0", "0", "0"]);
        assert_eq!(rows[3][5..], ["1", "0", "0"]);
    }

    #[test]
    fn empty_store_exports_header_only() {
        let mut buf = Vec::new();
        write_error_analysis_csv(&[], &mut buf).unwrap();
        let rows = read_rows(&buf);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), ANALYSIS_HEADER.len());
    }
}
