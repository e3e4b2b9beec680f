//! CSV variant of the decoder.
//!
//! Produces the same [`Decoded`] contract as the SDMX path: one record per row,
//! keyed by the verbatim header names, with a String schema and no `counterField`.

use super::sdmx::{Decoded, Origin};
use crate::error::{DecodeError, DecodeResult};
use crate::models::{Feature, FieldDef};
use crate::parser::{self, ParseResult};

/// Decode CSV bytes, detecting encoding and delimiter.
pub fn decode_csv(bytes: &[u8]) -> DecodeResult<Decoded> {
    let encoding = parser::detect_encoding(bytes);
    let content = parser::decode_content(bytes, &encoding);
    let delimiter = parser::detect_delimiter(&content);
    decode_parsed(&content, delimiter, encoding)
}

/// Decode CSV text with an explicit delimiter.
pub fn decode_csv_str(content: &str, delimiter: char) -> DecodeResult<Decoded> {
    decode_parsed(content, delimiter, "utf-8".to_string())
}

fn decode_parsed(content: &str, delimiter: char, encoding: String) -> DecodeResult<Decoded> {
    if content.trim().is_empty() {
        return Err(DecodeError::InvalidPayload("empty CSV file".to_string()));
    }

    let ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    } = parser::parse_string_with_metadata(content, delimiter, encoding)?;

    let records: Vec<Feature> = rows.into_iter().map(Feature::new).collect();

    Ok(Decoded {
        count: records.len(),
        records,
        schema: headers.into_iter().map(FieldDef::string).collect(),
        layer_name: None,
        issues: Vec::new(),
        origin: Origin::Csv {
            encoding,
            delimiter,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;

    #[test]
    fn test_three_rows() {
        let decoded = decode_csv(b"id,value\nAF,12\nIR,7\nPK,3\n").unwrap();

        assert_eq!(decoded.count, 3);
        for record in &decoded.records {
            let keys: Vec<&str> = record.properties.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["id", "value"]);
            assert!(record.geometry.is_none());
        }
        assert_eq!(decoded.records[2].properties["id"], "PK");
        assert_eq!(decoded.field_names(), vec!["id", "value"]);
        assert!(decoded.schema.iter().all(|f| f.field_type == FieldType::String));
    }

    #[test]
    fn test_semicolon_detected() {
        let decoded = decode_csv("ISO;Taux\nAF;12,5".as_bytes()).unwrap();
        assert_eq!(
            decoded.origin,
            Origin::Csv {
                encoding: "utf-8".into(),
                delimiter: ';'
            }
        );
        assert_eq!(decoded.records[0].properties["Taux"], "12,5");
    }

    #[test]
    fn test_empty_is_invalid_payload() {
        assert!(matches!(decode_csv(b""), Err(DecodeError::InvalidPayload(_))));
        assert!(matches!(decode_csv_str("  \n", ','), Err(DecodeError::InvalidPayload(_))));
    }

    #[test]
    fn test_rows_of_empty_cells_kept() {
        let decoded = decode_csv_str("id,value\nAF,1\n,\nIR,2\n", ',').unwrap();

        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.records[1].properties["id"], "");
        assert_eq!(decoded.records[1].properties["value"], "");
        assert_eq!(decoded.records[2].properties["id"], "IR");

        let decoded = decode_csv_str("a;b;c\n;;\n", ';').unwrap();
        assert_eq!(decoded.count, 1);
    }

    #[test]
    fn test_header_only() {
        let decoded = decode_csv_str("id,value\n", ',').unwrap();
        assert_eq!(decoded.count, 0);
        assert_eq!(decoded.schema.len(), 2);
    }

    #[test]
    fn test_collection_has_no_id_field() {
        let fc = decode_csv_str("id\nAF", ',').unwrap().into_collection();
        let metadata = fc.metadata.unwrap();
        assert!(metadata.id_field.is_none());
        assert_eq!(metadata.name, "from sdmx");
    }
}
