use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::models::{Dataset, RawTable};
use crate::normalizer::normalize;

/// Where yearly snapshots come from.
pub trait DataSource {
    /// Years for which a snapshot exists.
    fn available_years(&self) -> Result<BTreeSet<i32>>;

    /// The raw snapshot for `year`, or `PanelError::NotFound`.
    fn load(&self, year: i32) -> Result<RawTable>;
}

// ---------------------------------------------------------------------------
// Directory source: lgd<year>.csv / lgd<year>.xlsx in one base directory
// ---------------------------------------------------------------------------

pub struct DirSource {
    base: PathBuf,
}

const EXTENSIONS: &[&str] = &[
    "csv",
    #[cfg(feature = "xlsx")]
    "xlsx",
];

impl DirSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn file_name(year: i32, ext: &str) -> String {
        format!("lgd{year}.{ext}")
    }

    /// The snapshot file for `year`, CSV preferred over XLSX.
    pub fn path_for(&self, year: i32) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.base.join(Self::file_name(year, ext)))
            .find(|p| p.is_file())
    }
}

impl DataSource for DirSource {
    fn available_years(&self) -> Result<BTreeSet<i32>> {
        let mut years = BTreeSet::new();
        if !self.base.is_dir() {
            debug!("data directory {} does not exist", self.base.display());
            return Ok(years);
        }
        let pattern = format!(r"^lgd(\d{{4}})\.({})$", EXTENSIONS.join("|"));
        let re = Regex::new(&pattern).map_err(|e| PanelError::Other(e.to_string()))?;
        for entry in std::fs::read_dir(&self.base)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(caps) = re.captures(&name) else {
                continue;
            };
            if let Ok(year) = caps[1].parse() {
                years.insert(year);
            }
        }
        debug!(?years, dir = %self.base.display(), "discovered snapshots");
        Ok(years)
    }

    fn load(&self, year: i32) -> Result<RawTable> {
        let Some(path) = self.path_for(year) else {
            return Err(PanelError::NotFound {
                year,
                path: self.base.join(Self::file_name(year, "csv")),
            });
        };
        let table = read_table(&path)?;
        if table.is_empty() {
            warn!(year, file = %path.display(), "snapshot has a header but no rows");
        }
        debug!(year, rows = table.len(), file = %path.display(), "loaded snapshot");
        Ok(table)
    }
}

pub fn read_table(path: &Path) -> Result<RawTable> {
    match path.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "xlsx")]
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => read_xlsx(path),
        _ => read_csv(path),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn read_csv(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path)?;
    read_csv_from(std::io::BufReader::new(file))
}

pub fn read_csv_from<R: std::io::Read>(reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PanelError::NotTabular("missing header row".into()));
    }

    let mut table = RawTable::new(headers);
    let mut skipped = 0usize;
    for result in rdr.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };
        let row = record
            .iter()
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        table.push_row(row);
    }
    if skipped > 0 {
        warn!("skipped {skipped} unreadable rows");
    }
    Ok(table)
}

pub fn write_csv(path: &Path, table: &RawTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_csv_to(std::fs::File::create(path)?, table)
}

pub fn write_csv_to<W: std::io::Write>(writer: W, table: &RawTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// XLSX (first worksheet)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(chrono::Duration::days(serial as i64))?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(feature = "xlsx")]
fn read_xlsx(path: &Path) -> Result<RawTable> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| PanelError::Xlsx(format!("failed to open {}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PanelError::NotTabular(format!("{} has no worksheets", path.display())))?
        .map_err(|e| PanelError::Xlsx(e.to_string()))?;

    let cell_text = |cell: &Data| -> Option<String> {
        let text = match cell {
            Data::Empty | Data::Error(_) => return None,
            Data::String(s) => s.trim().to_string(),
            Data::Float(f) => crate::fmt::decimal(*f),
            Data::Int(i) => i.to_string(),
            Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())?,
            other => other.to_string(),
        };
        Some(text).filter(|s| !s.is_empty())
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| PanelError::NotTabular(format!("{} is empty", path.display())))?
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();

    let mut table = RawTable::new(headers);
    for row in rows {
        table.push_row(row.iter().map(cell_text).collect());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Pipeline helpers
// ---------------------------------------------------------------------------

/// Load and normalize one year.
pub fn load_year(source: &dyn DataSource, year: i32, cfg: &Config) -> Result<Dataset> {
    let table = source.load(year)?;
    normalize(&table, year, cfg)
}

/// Load and normalize several years. Years without a snapshot are skipped
/// with a warning; it is an error only if none load.
pub fn load_years(source: &dyn DataSource, years: &[i32], cfg: &Config) -> Result<Dataset> {
    let mut loaded = Vec::new();
    for &year in years {
        match load_year(source, year, cfg) {
            Ok(ds) => loaded.push(ds),
            Err(PanelError::NotFound { year, .. }) => warn!("no snapshot for {year}, skipping"),
            Err(e) => return Err(e),
        }
    }
    if loaded.is_empty() {
        return Err(PanelError::Other("no data available to load".into()));
    }
    Ok(Dataset::merge(loaded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_available_years_lists_only_snapshot_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lgd2023.csv", "Conta,Valor\nA,1\n");
        write(dir.path(), "lgd2024.csv", "Conta,Valor\nA,1\n");
        write(dir.path(), "notes.csv", "x\n");
        write(dir.path(), "lgd20.csv", "x\n");
        let source = DirSource::new(dir.path());
        let years: Vec<i32> = source.available_years().unwrap().into_iter().collect();
        assert_eq!(years, vec![2023, 2024]);
    }

    #[test]
    fn test_missing_year_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lgd2023.csv", "Conta,Valor\nA,1\n");
        let source = DirSource::new(dir.path());
        assert!(!source.available_years().unwrap().contains(&2025));
        let err = source.load(2025).unwrap_err();
        assert!(matches!(err, PanelError::NotFound { year: 2025, .. }));
    }

    #[test]
    fn test_missing_directory_has_no_years() {
        let source = DirSource::new("/definitely/not/here");
        assert!(source.available_years().unwrap().is_empty());
    }

    #[test]
    fn test_read_csv_keeps_quoted_brazilian_amounts() {
        let csv = "\u{feff}Conta,Valor,Categoria\nAluguel,\"R$ 1.234,56\",\nFrete,  ,Logística\n";
        let table = read_csv_from(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Conta", "Valor", "Categoria"]);
        assert_eq!(table.rows[0][1].as_deref(), Some("R$ 1.234,56"));
        assert_eq!(table.rows[0][2], None);
        assert_eq!(table.rows[1][1], None);
    }

    #[test]
    fn test_csv_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("t.csv");
        let mut table = RawTable::new(vec!["Conta".into(), "Valor".into()]);
        table.push_row(vec![Some("Água, Esgoto".into()), None]);
        write_csv(&path, &table).unwrap();
        let back = read_csv(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_load_years_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lgd2023.csv", "Conta,Valor\nAluguel,\"100,00\"\n");
        let source = DirSource::new(dir.path());
        let cfg = Config::default();
        let ds = load_years(&source, &[2023, 2024], &cfg).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].source_year, 2023);
        assert!(load_years(&source, &[2030], &cfg).is_err());
    }
}
