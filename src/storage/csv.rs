//! CSV export for benchmark records.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::core::schema::BenchRecord;

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "schema_version",
    "record_id",
    "timestamp",
    "trace_name",
    "strategy",
    "status",
    "success",
    "rows",
    "row_len",
    "queries_total",
    "queries_processed",
    "mismatches",
    "internal_errors",
    "setup_ms",
    "total_ms",
    "retrieve_mean_ms",
    "retrieve_median_ms",
    "retrieve_p95_ms",
    "retrieve_p99_ms",
    "retrieve_stddev_ms",
    "offline_server_ms",
    "online_server_ms",
    "client_ms",
    "offline_bytes",
    "online_bytes",
    "client_storage_bytes",
    "cpu_model",
    "build_profile",
    "git_sha",
];

/// CSV exporter for benchmark records.
///
/// Exports BenchRecord data to CSV format with a flat column structure
/// and deterministic column order for easy comparison and analysis.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    /// Create a new CsvExporter.
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export records to a CSV file.
    ///
    /// # Arguments
    /// * `records` - Slice of BenchRecord to export
    /// * `output` - Path to the output CSV file
    ///
    /// # Errors
    /// Returns an error if file operations or CSV writing fails.
    pub fn export(&self, records: &[BenchRecord], output: &Path) -> Result<(), BenchError> {
        // Ensure parent directory exists
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(records, file)
    }

    /// Export records to any writer implementing Write.
    ///
    /// # Arguments
    /// * `records` - Slice of BenchRecord to export
    /// * `writer` - Any type implementing std::io::Write
    ///
    /// # Errors
    /// Returns an error if CSV writing fails.
    pub fn export_to_writer<W: Write>(
        &self,
        records: &[BenchRecord],
        writer: W,
    ) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write headers
        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        // Write each record
        for record in records {
            let row = self.record_to_row(record);
            csv_writer
                .write_record(&row)
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }

    /// Convert a BenchRecord to a row of CSV values.
    fn record_to_row(&self, record: &BenchRecord) -> Vec<String> {
        let stats = record.retrieve_stats.as_ref();
        let ms = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_default();
        vec![
            record.schema_version.to_string(),
            record.record_id.clone(),
            record.timestamp.clone(),
            record.trace_name.clone(),
            record.strategy.name.clone(),
            record.status.clone(),
            record.success.to_string(),
            record.dataset.map(|d| d.rows.to_string()).unwrap_or_default(),
            record.dataset.map(|d| d.row_len.to_string()).unwrap_or_default(),
            record.queries_total.to_string(),
            record.queries_processed.to_string(),
            record.mismatches.to_string(),
            record.internal_errors.to_string(),
            format!("{:.3}", record.setup_ms),
            format!("{:.3}", record.total_ms),
            ms(stats.map(|s| s.mean_ms)),
            ms(stats.and_then(|s| s.median_ms)),
            ms(stats.and_then(|s| s.p95_ms)),
            ms(stats.and_then(|s| s.p99_ms)),
            ms(stats.and_then(|s| s.stddev_ms)),
            format!("{:.3}", record.offline_server_ms),
            format!("{:.3}", record.online_server_ms),
            format!("{:.3}", record.client_ms),
            record.offline_bytes.to_string(),
            record.online_bytes.to_string(),
            record.client_storage_bytes.to_string(),
            record.env.cpu.model.clone().unwrap_or_default(),
            record.env.build_profile.clone(),
            record.env.git.as_ref().map(|g| g.sha.clone()).unwrap_or_default(),
        ]
    }
}
