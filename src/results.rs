//! Query result retrieval and delimited-text decoding.
//!
//! A completed query's result object lives at a deterministic key derived
//! from its handle (`{handle}.csv`) in the results bucket. The content is
//! delimited text with a header row defining column names; quoting follows
//! the usual rules (double quotes, doubled quotes as escapes, CRLF or LF
//! line ends), parsed here directly — the format is small enough that a
//! parsing dependency would outweigh it.
//!
//! Zero data rows is a legitimate outcome and returns an empty sequence.

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::athena::QueryHandle;
use crate::models::RawRow;
use crate::traits::ObjectStore;

/// Object key the engine writes results under for a given handle.
pub fn result_key(handle: &QueryHandle) -> String {
    format!("{}.csv", handle)
}

/// Retrieve and decode the result rows for a succeeded query.
///
/// Callers must have observed `SUCCEEDED` first; on any earlier handle this
/// fails loudly (missing object or partial content) rather than returning
/// garbage.
pub async fn fetch_results(
    store: &dyn ObjectStore,
    bucket: &str,
    handle: &QueryHandle,
) -> Result<Vec<RawRow>> {
    let key = result_key(handle);
    info!(bucket, key, "fetching query results");

    let bytes = store
        .get_object(bucket, &key)
        .await
        .with_context(|| format!("result object s3://{}/{} not retrievable", bucket, key))?;

    let text = String::from_utf8(bytes).context("result object is not valid UTF-8")?;
    let rows = parse_delimited(&text)?;
    info!(key, rows = rows.len(), "query results decoded");
    Ok(rows)
}

/// Parse delimited text with a header row into column→value rows.
pub fn parse_delimited(text: &str) -> Result<Vec<RawRow>> {
    let mut records = split_records(text)?;
    if records.is_empty() {
        bail!("result object has no header row");
    }

    let header = records.remove(0);
    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if record.len() != header.len() {
            bail!(
                "row {} has {} fields, header has {}",
                index + 1,
                record.len(),
                header.len()
            );
        }
        rows.push(header.iter().cloned().zip(record).collect::<RawRow>());
    }
    Ok(rows)
}

/// Split raw text into records of fields, honoring quoting.
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    // Whether the current record has any content yet; a bare trailing
    // newline must not produce a phantom empty record.
    let mut record_started = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                record_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                record_started = true;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                record_started = false;
            }
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                record_started = false;
            }
            _ => {
                field.push(c);
                record_started = true;
            }
        }
    }

    if in_quotes {
        bail!("unterminated quoted field");
    }

    if record_started || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_key_derives_from_handle() {
        let handle = QueryHandle::new("abc-123");
        assert_eq!(result_key(&handle), "abc-123.csv");
    }

    #[test]
    fn parses_quoted_fields_and_header() {
        let text = "\"tenant_id\",\"report_id\",\"data\"\n\"t1\",\"r1\",\"total_sales=10\"\n";
        let rows = parse_delimited(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["tenant_id"], "t1");
        assert_eq!(rows[0]["data"], "total_sales=10");
    }

    #[test]
    fn header_only_is_zero_rows() {
        let rows = parse_delimited("\"a\",\"b\"\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(parse_delimited("").is_err());
    }

    #[test]
    fn embedded_commas_and_quotes_survive() {
        let text = "a,b\n\"x, y\",\"she said \"\"hi\"\"\"\n";
        let rows = parse_delimited(text).unwrap();
        assert_eq!(rows[0]["a"], "x, y");
        assert_eq!(rows[0]["b"], "she said \"hi\"");
    }

    #[test]
    fn crlf_line_endings() {
        let text = "a,b\r\n1,2\r\n3,4\r\n";
        let rows = parse_delimited(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["b"], "4");
    }

    #[test]
    fn missing_trailing_newline_keeps_last_row() {
        let text = "a,b\n1,2";
        let rows = parse_delimited(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["b"], "2");
    }

    #[test]
    fn ragged_row_is_an_error() {
        let text = "a,b\n1\n";
        assert!(parse_delimited(text).is_err());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_delimited("a,b\n\"1,2\n").is_err());
    }
}
