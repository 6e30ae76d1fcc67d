use crate::domain::error::{AppError, Result};
use csv::{ReaderBuilder, Trim};
use encoding_rs::WINDOWS_1252;
use std::path::Path;

/// Header row plus data rows of one CSV file, all cells as text.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub struct CsvParser {
    delimiter: u8,
    trim: bool,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

impl CsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parses a file with the delimiter guessed from its first lines.
    pub fn parse_file_auto_detect(path: &Path) -> Result<CsvTable> {
        let content = read_decoded(path)?;
        Self::new()
            .with_delimiter(Self::detect_delimiter(&content))
            .parse_content(&content)
    }

    pub fn parse_content(&self, content: &str) -> Result<CsvTable> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::ParseError("CSV has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;

            // Short rows are padded, long rows cut to the header width.
            let row = (0..headers.len())
                .map(|i| record.get(i).unwrap_or("").to_string())
                .collect();
            rows.push(row);
        }

        Ok(CsvTable { headers, rows })
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();
        if sample_lines.is_empty() {
            return b',';
        }

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Frequent and consistent across lines wins.
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;
            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

fn read_decoded(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(decode(&bytes))
}

/// UTF-8 when valid, otherwise Windows-1252 (a superset of Latin-1 for printable text).
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(content) => content.to_string(),
        Err(_) => {
            let (content, _, _) = WINDOWS_1252.decode(bytes);
            content.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_csv() {
        let content = "ServiceName,RegionName,EffectiveCost\nAmazon S3,us-east-1,1.5\nAmazon EC2,eu-west-1,";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.headers, vec!["ServiceName", "RegionName", "EffectiveCost"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "us-east-1");
        assert_eq!(table.rows[1][2], "");
    }

    #[test]
    fn test_ragged_rows_are_normalized() {
        let content = "a,b,c\n1\n1,2,3,4";
        let table = CsvParser::new().parse_content(content).unwrap();
        assert_eq!(table.rows[0], vec!["1", "", ""]);
        assert_eq!(table.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_bom_is_stripped_from_first_header() {
        let table = CsvParser::new()
            .parse_content("\u{feff}UsageDateTime,Meter\n2026-09-01,D2s v3")
            .unwrap();
        assert_eq!(table.headers[0], "UsageDateTime");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(CsvParser::detect_delimiter("a,b,c\nd,e,f"), b',');
        assert_eq!(CsvParser::detect_delimiter("a;b;c\nd;e;f"), b';');
        assert_eq!(CsvParser::detect_delimiter("a\tb\nc\td"), b'\t');
    }

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        // "Zürich" with ü encoded as a single 0xFC byte.
        let bytes = b"Location\nZ\xfcrich\n";
        assert_eq!(decode(bytes), "Location\nZürich\n");
    }

    #[test]
    fn test_parse_file_reads_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("azure_cost_usage.csv");
        std::fs::write(&path, b"ResourceLocation,EffectiveCost\nS\xe3o Paulo,2.0\n").unwrap();

        let table = CsvParser::parse_file_auto_detect(&path).unwrap();
        assert_eq!(table.rows[0][0], "São Paulo");
    }

    #[test]
    fn test_parse_file_auto_detect_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("azure_cost_usage.csv");
        std::fs::write(&path, "Meter;EffectiveCost\nD2s v3;1,25\n").unwrap();

        let table = CsvParser::parse_file_auto_detect(&path).unwrap();
        assert_eq!(table.headers, vec!["Meter", "EffectiveCost"]);
        assert_eq!(table.rows[0], vec!["D2s v3", "1,25"]);
    }
}
