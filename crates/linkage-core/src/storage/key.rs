//! Key encoding for the sled trees.
//!
//! Column-scoped keys are `{table}\0{column}` so that a prefix scan on
//! `{table}\0` returns every entry of one table in column order.

const SEPARATOR: u8 = 0;

/// Key for a table-scoped column entry.
pub fn column_key(table: &str, column: &str) -> Vec<u8> {
    let mut key = table_prefix(table);
    key.extend_from_slice(column.as_bytes());
    key
}

/// Prefix shared by all column keys of a table.
pub fn table_prefix(table: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(table.len() + 1);
    key.extend_from_slice(table.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Split a column key back into table and column.
pub fn decode_column_key(bytes: &[u8]) -> Option<(String, String)> {
    let position = bytes.iter().position(|b| *b == SEPARATOR)?;
    let table = std::str::from_utf8(&bytes[..position]).ok()?;
    let column = std::str::from_utf8(&bytes[position + 1..]).ok()?;
    Some((table.to_string(), column.to_string()))
}

/// Encode a metadata row id.
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode a metadata row id.
pub fn decode_id(bytes: &[u8]) -> Option<u64> {
    let buf: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_key_roundtrip() {
        let key = column_key("articles", "author_id");
        assert!(key.starts_with(&table_prefix("articles")));
        assert_eq!(
            decode_column_key(&key),
            Some(("articles".to_string(), "author_id".to_string()))
        );
    }

    #[test]
    fn test_prefix_does_not_match_longer_table() {
        let key = column_key("articles_archive", "author_id");
        assert!(!key.starts_with(&table_prefix("articles")));
    }

    #[test]
    fn test_id_key_ordering() {
        assert!(id_key(1) < id_key(256));
        assert_eq!(decode_id(&id_key(42)), Some(42));
        assert_eq!(decode_id(b"short"), None);
    }
}
