use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use calamine::{Data, Reader, Xlsx, open_workbook};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::SpvError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    XLSX,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// One loaded column. Every cell is pre-rendered as text; missing values
/// become the empty string.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: Vec<String>,
    pub max_width: usize,
    pub render_width: usize,
}

impl Column {
    pub fn from_values(name: impl Into<String>, data: Vec<String>) -> Self {
        let max_width = data.iter().map(|v| v.len()).max().unwrap_or(0);
        Column {
            name: name.into(),
            data,
            max_width,
            render_width: 0,
        }
    }

    pub fn as_string(&self) -> String {
        format!(
            "\"{}\", width_max: {}, render_width: {}, # rows {}",
            self.name,
            self.max_width,
            self.render_width,
            self.data.len(),
        )
    }
}

/// Load a spreadsheet into string columns. xlsx goes through calamine using
/// the given sheet name, everything else through the polars lazy readers.
pub fn load(path: &Path, sheet: &str) -> Result<Vec<Column>, SpvError> {
    let file_info = get_file_info(path)?;
    info!(
        "Loading {:?} ({} bytes, {:?})",
        file_info.path, file_info.file_size, file_info.file_type
    );

    let start_time = Instant::now();
    let columns = match file_info.file_type {
        FileType::XLSX => load_xlsx(&file_info.path, sheet)?,
        FileType::CSV => columns_from_frame(load_csv(&file_info.path)?)?,
        FileType::PARQUET => columns_from_frame(load_parquet(&file_info.path)?)?,
        FileType::ARROW => columns_from_frame(load_arrow(&file_info.path)?)?,
    };

    info!("Loading data took {}ms", start_time.elapsed().as_millis());
    for c in columns.iter() {
        debug!("Column: {}", c.as_string());
    }
    Ok(columns)
}

// Materialize a lazy frame into string columns, one rayon task per column.
fn columns_from_frame(frame: LazyFrame) -> Result<Vec<Column>, SpvError> {
    let df = Arc::new(frame.collect()?);
    let columns: Result<Vec<Column>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    Ok(columns?)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;

    let mut data = Vec::with_capacity(series.len());
    for value in series.into_iter() {
        let cell = match value {
            Some(s) => flatten_newlines(s),
            None => String::new(),
        };
        data.push(cell);
    }
    Ok(Column::from_values(col_name, data))
}

fn load_xlsx(path: &Path, sheet: &str) -> Result<Vec<Column>, SpvError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(sheet)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(SpvError::LoadingFailed(format!("sheet \"{sheet}\" is empty")));
    };
    let names: Vec<String> = header.iter().map(cell_to_string).collect();

    // Short rows are padded so all columns stay the same length.
    let mut data: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (cidx, cells) in data.iter_mut().enumerate() {
            cells.push(row.get(cidx).map(cell_to_string).unwrap_or_default());
        }
    }

    Ok(names
        .into_iter()
        .zip(data)
        .map(|(name, cells)| Column::from_values(name, cells))
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => flatten_newlines(s),
        other => other.to_string(),
    }
}

fn flatten_newlines(s: &str) -> String {
    if s.contains('\n') {
        s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
    } else {
        s.to_string()
    }
}

fn get_file_info(path: &Path) -> Result<FileInfo, SpvError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SpvError::FileNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => SpvError::PermissionDenied(path.to_path_buf()),
        _ => SpvError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(SpvError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        file_type: detect_file_type(path)?,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, SpvError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("XLSX") => Ok(FileType::XLSX),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(SpvError::UnknownFileType(path.to_path_buf())),
    }
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_tracks_the_widest_cell() {
        let column = Column::from_values("Empresa", vec!["a".into(), "abcdef".into()]);
        assert_eq!(column.max_width, 6);
        assert_eq!(column.render_width, 0);
    }

    #[test]
    fn detect_file_type_by_extension() {
        assert!(matches!(
            detect_file_type(Path::new("data.xlsx")),
            Ok(FileType::XLSX)
        ));
        assert!(matches!(
            detect_file_type(Path::new("data.CSV")),
            Ok(FileType::CSV)
        ));
        assert!(matches!(
            detect_file_type(Path::new("data.feather")),
            Ok(FileType::ARROW)
        ));
        assert!(matches!(
            detect_file_type(Path::new("data.txt")),
            Err(SpvError::UnknownFileType(_))
        ));
    }

    #[test]
    fn newlines_are_flattened_for_the_terminal() {
        assert_eq!(flatten_newlines("a\r\nb"), "a ↵ b");
        assert_eq!(flatten_newlines("plain"), "plain");
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let err = load(Path::new("no/such/file.csv"), "DefaultView").unwrap_err();
        assert!(matches!(err, SpvError::FileNotFound(_)));
    }

    #[test]
    fn csv_fixture_loads_with_empty_strings_for_missing_values() {
        let columns = load(Path::new("tests/fixtures/defaultview_01.csv"), "DefaultView")
            .expect("fixture should load");

        assert_eq!(columns.len(), 6);
        assert_eq!(columns[0].name, "Id");
        assert_eq!(columns[4].name, "Status da Análise");
        assert!(columns.iter().all(|c| c.data.len() == 8));

        // Row 5 has no comment. Missing cells normalize to "".
        assert_eq!(columns[5].data[4], "");
    }
}
