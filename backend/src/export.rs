//! Export service for the color quality report.
//!
//! Reads every stored record, partitions them by color code and writes one
//! worksheet per color that has records. Colors with no records get no sheet.
//! The workbook is rendered in memory and moved into place with a temp-file
//! rename, so a failed export never leaves a half-written report behind.

use rust_xlsxwriter::{Format, Workbook};
use shared::{ColorCode, ExportSummary, FieldValue, RecordField, SheetSummary, StoredRecord};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::db::DbConnection;
use crate::error::{ExportError, ExportResult};

/// The report file written when no path is given
pub const DEFAULT_EXPORT_PATH: &str = "color_quality_report.xlsx";

/// Export service that turns the record store into a spreadsheet report
#[derive(Clone)]
pub struct ExportService {
    db: DbConnection,
    default_path: PathBuf,
}

impl ExportService {
    pub fn new(db: DbConnection, default_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            default_path: default_path.into(),
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Directory that holds the default report; requested reports land under it
    pub fn export_dir(&self) -> &Path {
        self.default_path.parent().unwrap_or(Path::new(""))
    }

    /// Resolve a report path named by an API caller.
    ///
    /// Only plain relative paths are accepted (no root, no `..`), and they are
    /// joined onto [`Self::export_dir`].
    pub fn resolve_requested_path(&self, requested: &str) -> ExportResult<PathBuf> {
        let relative = Path::new(requested.trim());
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if !plain || relative.as_os_str().is_empty() {
            warn!("⚠️ EXPORT: Rejected report path {:?}", requested);
            return Err(ExportError::InvalidPath(requested.to_string()));
        }
        Ok(self.export_dir().join(relative))
    }

    /// Export every record to `path`, or to the configured default path
    pub async fn export(&self, path: Option<&Path>) -> ExportResult<ExportSummary> {
        let path = path.unwrap_or(self.default_path.as_path());
        info!("📄 EXPORT: Exporting color quality report to {:?}", path);

        let records = self.db.list_records().await?;
        let partitions = partition_by_color(&records);

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let mut sheets = Vec::with_capacity(partitions.len());

        for (color_code, rows) in &partitions {
            write_sheet(&mut workbook, &header_format, *color_code, rows)?;
            sheets.push(SheetSummary {
                color_code: *color_code,
                row_count: rows.len(),
            });
        }

        let buffer = workbook.save_to_buffer()?;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&target, &buffer)).await??;

        let summary = ExportSummary {
            file_path: path.to_string_lossy().to_string(),
            total_rows: sheets.iter().map(|s| s.row_count).sum(),
            sheets,
        };

        info!(
            "✅ EXPORT: Wrote {} records across {} sheets to {}",
            summary.total_rows,
            summary.sheets.len(),
            summary.file_path
        );
        Ok(summary)
    }
}

/// Group records by color code, in color code order, dropping empty colors
pub fn partition_by_color(records: &[StoredRecord]) -> Vec<(ColorCode, Vec<&StoredRecord>)> {
    ColorCode::ALL
        .into_iter()
        .map(|code| {
            let rows: Vec<&StoredRecord> = records
                .iter()
                .filter(|r| r.record.color_code == code)
                .collect();
            (code, rows)
        })
        .filter(|(_, rows)| !rows.is_empty())
        .collect()
}

fn write_sheet(
    workbook: &mut Workbook,
    header_format: &Format,
    color_code: ColorCode,
    rows: &[&StoredRecord],
) -> ExportResult<()> {
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(color_code.as_str())?;

    for (col, field) in RecordField::ALL.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, field.label(), header_format)?;
    }

    for (i, record) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in record.to_row().into_iter().enumerate() {
            let col = col as u16;
            match value {
                FieldValue::Integer(v) => worksheet.write_number(row, col, v as f64)?,
                FieldValue::Real(v) => worksheet.write_number(row, col, v)?,
                FieldValue::Text(v) => worksheet.write_string(row, col, &v)?,
            };
        }
    }

    Ok(())
}

/// Write to a uniquely named sibling temp file, then rename over the target.
/// The temp file is removed whenever the write or the rename fails.
fn write_atomically(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            parent
        }
        None => Path::new("."),
    };

    let result = NamedTempFile::new_in(dir).and_then(|mut temp| {
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map(|_| ()).map_err(|e| e.error)
    });

    if let Err(source) = result {
        error!("❌ EXPORT: Failed to write report to {:?}: {}", path, source);
        return Err(ExportError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::sample_record;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use shared::QualityForm;

    async fn setup_test() -> (DbConnection, tempfile::TempDir) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        (db, dir)
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn sheet_names(path: &Path) -> Vec<String> {
        let workbook: Xlsx<_> = open_workbook(path).expect("Failed to open exported workbook");
        workbook.sheet_names()
    }

    #[tokio::test]
    async fn test_black_and_blue_scenario() {
        let (db, dir) = setup_test().await;
        db.insert_record(&sample_record(ColorCode::Black, 45.2, 98.5)).await.unwrap();
        db.insert_record(&sample_record(ColorCode::Blue, 44.0, 97.0)).await.unwrap();

        let path = dir.path().join("report.xlsx");
        let service = ExportService::new(db, &path);
        let summary = service.export(None).await.expect("Export failed");

        assert_eq!(summary.total_rows, 2);
        assert_eq!(
            summary.sheets,
            vec![
                SheetSummary { color_code: ColorCode::Black, row_count: 1 },
                SheetSummary { color_code: ColorCode::Blue, row_count: 1 },
            ]
        );
        assert_eq!(sheet_names(&path), vec!["Black".to_string(), "Blue".to_string()]);

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let black = workbook.worksheet_range("Black").unwrap();
        assert_eq!(black.height(), 2, "Header plus one record");
        assert_eq!(black.width(), 16);
        assert_eq!(black.get((0, 0)), Some(&Data::String("ID".to_string())));
        assert_eq!(black.get((0, 15)), Some(&Data::String("Color Group".to_string())));
        assert_eq!(black.get((1, 0)), Some(&Data::Float(1.0)));
        assert_eq!(black.get((1, 1)), Some(&Data::String("Black".to_string())));
        assert_eq!(black.get((1, 5)), Some(&Data::Float(45.2)));
        assert_eq!(black.get((1, 10)), Some(&Data::Float(98.5)));
    }

    #[tokio::test]
    async fn test_sheets_follow_color_order_not_data_order() {
        let (db, dir) = setup_test().await;
        db.insert_record(&sample_record(ColorCode::Green, 40.0, 100.0)).await.unwrap();
        db.insert_record(&sample_record(ColorCode::Violet, 41.0, 100.0)).await.unwrap();
        db.insert_record(&sample_record(ColorCode::Black, 42.0, 100.0)).await.unwrap();
        db.insert_record(&sample_record(ColorCode::Green, 43.0, 100.0)).await.unwrap();

        let path = dir.path().join("ordered.xlsx");
        let summary = ExportService::new(db, DEFAULT_EXPORT_PATH)
            .export(Some(&path))
            .await
            .unwrap();

        assert_eq!(summary.file_path, path.to_string_lossy());
        assert_eq!(sheet_names(&path), vec!["Black", "Violet", "Green"]);

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.worksheet_range("Green").unwrap().height(), 3);
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let records: Vec<StoredRecord> = [
            ColorCode::Orange,
            ColorCode::Black,
            ColorCode::Orange,
            ColorCode::Yellow,
            ColorCode::Black,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, code)| StoredRecord {
            id: i as i64 + 1,
            record: sample_record(code, 40.0, 100.0),
        })
        .collect();

        let partitions = partition_by_color(&records);
        let codes: Vec<ColorCode> = partitions.iter().map(|(c, _)| *c).collect();
        assert_eq!(codes, vec![ColorCode::Black, ColorCode::Orange, ColorCode::Yellow]);

        let mut ids: Vec<i64> = partitions
            .iter()
            .flat_map(|(code, rows)| {
                assert!(rows.iter().all(|r| r.record.color_code == *code));
                rows.iter().map(|r| r.id)
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_color_sheets() {
        let (db, dir) = setup_test().await;
        let path = dir.path().join("empty.xlsx");

        let summary = ExportService::new(db, &path).export(None).await.unwrap();
        assert!(summary.sheets.is_empty());
        assert_eq!(summary.total_rows, 0);

        let names = sheet_names(&path);
        for code in ColorCode::ALL {
            assert!(!names.contains(&code.to_string()));
        }
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let (db, dir) = setup_test().await;
        db.insert_record(&sample_record(ColorCode::Yellow, 40.0, 100.0)).await.unwrap();

        let path = dir.path().join("reports").join("2024").join("quality.xlsx");
        ExportService::new(db, &path).export(None).await.unwrap();
        assert!(path.exists());
        assert_eq!(dir_entries(path.parent().unwrap()), vec!["quality.xlsx"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_exports_to_same_path() {
        let (db, dir) = setup_test().await;
        db.insert_record(&sample_record(ColorCode::Blue, 44.0, 97.0)).await.unwrap();

        let path = dir.path().join("shared.xlsx");
        let service = ExportService::new(db, &path);
        let (first, second, third) = tokio::join!(
            service.export(None),
            service.export(None),
            service.export(None)
        );

        assert!(first.is_ok() && second.is_ok() && third.is_ok());
        assert_eq!(sheet_names(&path), vec!["Blue"]);
        assert_eq!(dir_entries(dir.path()), vec!["shared.xlsx"]);
    }

    #[tokio::test]
    async fn test_non_finite_measurements_export_as_zero() {
        let (db, dir) = setup_test().await;
        let form = QualityForm {
            tsc: "inf".to_string(),
            viscosity: "nan".to_string(),
            strength: "-Infinity".to_string(),
            ..Default::default()
        };
        db.insert_record(&form.into_record()).await.unwrap();

        let path = dir.path().join("finite.xlsx");
        ExportService::new(db, &path).export(None).await.unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).expect("Workbook should be readable");
        let black = workbook.worksheet_range("Black").unwrap();
        assert_eq!(black.get((1, 5)), Some(&Data::Float(0.0)));
        assert_eq!(black.get((1, 6)), Some(&Data::Float(0.0)));
        assert_eq!(black.get((1, 10)), Some(&Data::Float(0.0)));
    }

    #[tokio::test]
    async fn test_requested_path_resolves_under_export_dir() {
        let (db, _dir) = setup_test().await;
        let service = ExportService::new(db, "/srv/reports/quality.xlsx");
        assert_eq!(
            service.resolve_requested_path("weekly.xlsx").unwrap(),
            PathBuf::from("/srv/reports/weekly.xlsx")
        );
        assert_eq!(
            service.resolve_requested_path(" 2024/q1.xlsx ").unwrap(),
            PathBuf::from("/srv/reports/2024/q1.xlsx")
        );

        for bad in ["/etc/passwd", "../escape.xlsx", "a/../../b.xlsx", "", "."] {
            assert!(
                matches!(service.resolve_requested_path(bad), Err(ExportError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_unwritable_target_is_export_error() {
        let (db, dir) = setup_test().await;
        db.insert_record(&sample_record(ColorCode::Black, 45.2, 98.5)).await.unwrap();

        // A directory already sits at the target path, so the rename fails
        let path = dir.path().join("taken.xlsx");
        fs::create_dir(&path).unwrap();

        let result = ExportService::new(db, &path).export(None).await;
        assert!(matches!(result, Err(ExportError::Io { .. })));
        assert_eq!(dir_entries(dir.path()), vec!["taken.xlsx"], "Temp file should be cleaned up");
    }

    #[tokio::test]
    async fn test_closed_store_is_storage_error() {
        let (db, dir) = setup_test().await;
        let service = ExportService::new(db.clone(), dir.path().join("closed.xlsx"));
        db.close().await;

        let result = service.export(None).await;
        assert!(matches!(result, Err(ExportError::Storage(_))));
        assert!(!dir.path().join("closed.xlsx").exists());
    }
}
