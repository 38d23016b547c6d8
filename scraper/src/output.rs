use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::io::Write;
use tempfile::NamedTempFile;

use crate::errors::ScrapeError;
use crate::imports::*;

pub fn parse_status_document(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|error| ScrapeError::DownstreamParseError(error).into())
}

fn to_pretty_json(document: &Value) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    document.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Replaces `path` with the pretty-printed document. The file is written next to its final location and renamed
/// into place, so readers see either the previous contents or the new ones.
pub fn write_status_file(path: &Path, document: &Value) -> Result<()> {
    let persistence_error = |source: std::io::Error| ScrapeError::PersistenceError { path: path.to_path_buf(), source };
    info!("Writing line status JSON to: {:?}", path);
    let json = to_pretty_json(document).map_err(|error| persistence_error(error.into()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(persistence_error)?,
    };
    let mut temp_file = NamedTempFile::new_in(&dir).map_err(persistence_error)?;
    temp_file.write_all(&json).map_err(persistence_error)?;
    temp_file.persist(path).map_err(|error| persistence_error(error.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_status_document() -> Result<()> {
        let document = parse_status_document(r#"[{"line":"1","status":"normal"}]"#)?;
        assert_eq!(document, json!([{"line": "1", "status": "normal"}]));
        let error = parse_status_document("<html>oops</html>").unwrap_err();
        assert!(matches!(ScrapeError::find(&error), Some(ScrapeError::DownstreamParseError(_))));
        Ok(())
    }

    #[test]
    fn test_write_status_file_indents_four_spaces() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("status.json");
        std::fs::write(&path, "stale")?;
        write_status_file(&path, &json!({"lines": [{"id": 1}]}))?;
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "{\n    \"lines\": [\n        {\n            \"id\": 1\n        }\n    ]\n}\n"
        );
        Ok(())
    }

    #[test]
    fn test_write_status_file_into_missing_dir_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("status.json");
        let error = write_status_file(&path, &json!([])).unwrap_err();
        assert!(matches!(ScrapeError::find(&error), Some(ScrapeError::PersistenceError { .. })));
        Ok(())
    }
}
