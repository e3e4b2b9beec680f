//! Header-driven CSV parser with encoding and delimiter auto-detection.
//!
//! The first row defines field names verbatim; each following row becomes one
//! ordered property map. No SDMX-specific logic here.

use indexmap::IndexMap;
use serde_json::Value;

/// CSV parsing error with line context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    fn from_csv(e: &csv::Error) -> Self {
        let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
        Self::new(line, e.to_string())
    }
}

/// One parsed row, header to cell.
pub type Row = IndexMap<String, Value>;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows, in file order
    pub rows: Vec<Row>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, verbatim
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding. A leading BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Cells are kept verbatim as JSON strings. Missing trailing cells become empty
/// strings, extra cells are ignored and blank lines are skipped.
///
/// # Example
/// ```ignore
/// use sdmxgeo::parser::parse_str;
///
/// let result = parse_str("id,value\nAF,12", ',').unwrap();
/// assert_eq!(result.rows[0]["id"], "AF");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> Result<ParseResult, CsvError> {
    parse_string_with_metadata(content, delimiter, "utf-8".to_string())
}

/// Parse CSV text with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> Result<ParseResult, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::new(1, format!("Unsupported delimiter '{}'", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::from_csv(&e))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| CsvError::from_csv(&e))?;

        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).unwrap_or("");
                (header.clone(), Value::String(cell.to_string()))
            })
            .collect();

        rows.push(row);
    }

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let result = parse_str("id,value\nAF,12\nIR,7", ',').unwrap();

        assert_eq!(result.headers, vec!["id", "value"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["id"], "AF");
        assert_eq!(result.rows[1]["value"], "7");
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let result = parse_str(csv, ';').unwrap();

        assert_eq!(result.rows[0]["name"], "Alice");
        assert_eq!(result.rows[0]["value"], "Hello; World");
    }

    #[test]
    fn test_cells_kept_verbatim() {
        let result = parse_str("a,b\n 1 , x", ',').unwrap();
        assert_eq!(result.rows[0]["a"], " 1 ");
        assert_eq!(result.rows[0]["b"], " x");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let result = parse_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_missing_and_extra_values() {
        let result = parse_str("a;b;c\n1;;3\n4\n5;6;7;8", ';').unwrap();

        assert_eq!(result.rows[0]["b"], "");
        assert_eq!(result.rows[1]["c"], "");
        assert_eq!(result.rows[2].len(), 3);
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "found record with 3 fields");
        assert_eq!(err.to_string(), "Line 5: found record with 3 fields");
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_str("", ',').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFid,value\nAF,1\nIR,2";
        let content = decode_content(bytes, &detect_encoding(bytes));
        let result = parse_str(&content, detect_delimiter(&content)).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.headers, vec!["id", "value"]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }
}
