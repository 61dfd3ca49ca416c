//! CSV ingestion for the two source collections.
//!
//! `faqs.csv` carries `question,answer` pairs; `funds.csv` carries fund
//! records and may be comma- or tab-delimited (the delimiter is sniffed from
//! the file contents). Rows missing required fields are dropped before
//! handoff; unparseable metric cells become missing values.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::CorpusError;
use crate::model::types::FundMetrics;

/// One FAQ row, already validated.
#[derive(Debug, Clone)]
pub struct FaqRecord {
    pub question: String,
    pub answer: String,
}

/// One fund row, already validated.
#[derive(Debug, Clone)]
pub struct FundRecord {
    pub fund_id: String,
    pub fund_name: String,
    pub category: String,
    pub metrics: FundMetrics,
}

const FUND_COLUMNS: [&str; 3] = ["fund_id", "fund_name", "category"];
const METRIC_COLUMNS: [&str; 3] = ["cagr_3yr (%)", "volatility (%)", "sharpe_ratio"];

/// Load FAQ entries, dropping rows with a missing question or answer.
pub fn load_faqs(path: &Path) -> Result<Vec<FaqRecord>, CorpusError> {
    let contents = read_file(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = headers_of(&mut reader, path)?;
    let q_col = column_index(&headers, "question", path)?;
    let a_col = column_index(&headers, "answer", path)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row.map_err(|source| CorpusError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        let question = row.get(q_col).map(str::trim).unwrap_or_default();
        let answer = row.get(a_col).map(str::trim).unwrap_or_default();
        if question.is_empty() || answer.is_empty() {
            dropped += 1;
            continue;
        }
        records.push(FaqRecord {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "dropped incomplete FAQ rows");
    }
    debug!(path = %path.display(), rows = records.len(), "loaded FAQ collection");
    Ok(records)
}

/// Load fund records, dropping rows with a missing fund id.
pub fn load_funds(path: &Path) -> Result<Vec<FundRecord>, CorpusError> {
    let contents = read_file(path)?;
    let delimiter = if contents.contains('\t') { b'\t' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = headers_of(&mut reader, path)?;
    let id_col = column_index(&headers, FUND_COLUMNS[0], path)?;
    let name_col = column_index(&headers, FUND_COLUMNS[1], path)?;
    let category_col = column_index(&headers, FUND_COLUMNS[2], path)?;
    let cagr_col = column_index(&headers, METRIC_COLUMNS[0], path)?;
    let vol_col = column_index(&headers, METRIC_COLUMNS[1], path)?;
    let sharpe_col = column_index(&headers, METRIC_COLUMNS[2], path)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row.map_err(|source| CorpusError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        let fund_id = row.get(id_col).map(str::trim).unwrap_or_default();
        if fund_id.is_empty() {
            dropped += 1;
            continue;
        }
        records.push(FundRecord {
            fund_id: fund_id.to_string(),
            fund_name: row.get(name_col).map(str::trim).unwrap_or_default().to_string(),
            category: row
                .get(category_col)
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            metrics: FundMetrics {
                cagr_3y: parse_metric(row.get(cagr_col)),
                volatility: parse_metric(row.get(vol_col)),
                sharpe_ratio: parse_metric(row.get(sharpe_col)),
            },
        });
    }
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "dropped fund rows without fund_id");
    }
    debug!(path = %path.display(), rows = records.len(), "loaded fund collection");
    Ok(records)
}

fn read_file(path: &Path) -> Result<String, CorpusError> {
    fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Headers with surrounding whitespace stripped.
fn headers_of(
    reader: &mut csv::Reader<&[u8]>,
    path: &Path,
) -> Result<Vec<String>, CorpusError> {
    let headers = reader.headers().map_err(|source| CorpusError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    Ok(headers.iter().map(|h| h.trim().to_string()).collect())
}

fn column_index(
    headers: &[String],
    column: &str,
    path: &Path,
) -> Result<usize, CorpusError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| CorpusError::MissingColumn {
            path: path.display().to_string(),
            column: column.to_string(),
        })
}

/// Unparseable or non-finite cells become `None`, never zero.
fn parse_metric(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn faq_rows_missing_fields_are_dropped() {
        let file = write_temp(
            "question,answer\nWhat is a Sharpe ratio?,A risk-adjusted return measure.\n,orphan answer\n",
        );
        let records = load_faqs(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "What is a Sharpe ratio?");
    }

    #[test]
    fn fund_rows_parse_with_comma_delimiter() {
        let file = write_temp(
            "fund_id,fund_name,category,cagr_3yr (%),volatility (%),sharpe_ratio\n\
             F007,Parag Parikh Flexi Cap,Equity,14.2,10.5,1.25\n\
             ,No Id Fund,Equity,10.0,9.0,1.0\n",
        );
        let records = load_funds(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fund_id, "F007");
        assert_eq!(records[0].metrics.sharpe_ratio, Some(1.25));
        assert_eq!(records[0].metrics.cagr_3y, Some(14.2));
    }

    #[test]
    fn fund_delimiter_is_sniffed_from_tabs() {
        let file = write_temp(
            "fund_id\tfund_name\tcategory\tcagr_3yr (%)\tvolatility (%)\tsharpe_ratio\n\
             F010\tFranklin Ultra Short Bond\tDebt\t6.1\t2.2\t0.7\n",
        );
        let records = load_funds(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fund_name, "Franklin Ultra Short Bond");
        assert_eq!(records[0].metrics.volatility, Some(2.2));
    }

    #[test]
    fn bad_metric_cells_become_missing_not_zero() {
        let file = write_temp(
            "fund_id,fund_name,category,cagr_3yr (%),volatility (%),sharpe_ratio\n\
             F001,Alpha Fund,Equity,not-a-number,,1.1\n",
        );
        let records = load_funds(file.path()).unwrap();
        assert_eq!(records[0].metrics.cagr_3y, None);
        assert_eq!(records[0].metrics.volatility, None);
        assert_eq!(records[0].metrics.sharpe_ratio, Some(1.1));
    }

    #[test]
    fn missing_column_is_a_fatal_error() {
        let file = write_temp("fund_id,fund_name\nF001,Alpha Fund\n");
        let err = load_funds(file.path()).unwrap_err();
        assert!(matches!(err, CorpusError::MissingColumn { .. }));
    }
}
