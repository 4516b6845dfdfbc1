use crate::models::question::Row;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

/// 本地数据文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// 整个文件是一个 JSON 数组或单个对象
    Json,
    /// 每行一个 JSON 对象
    JsonLines,
}

impl FileFormat {
    /// 根据扩展名推断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(FileFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Some(FileFormat::JsonLines),
            _ => None,
        }
    }
}

/// 从 JSON / JSONL 文件加载所有行
pub async fn load_rows_from_file(path: &Path) -> Result<Vec<Row>> {
    let format = FileFormat::from_path(path)
        .with_context(|| format!("不支持的数据文件格式: {}", path.display()))?;

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取数据文件: {}", path.display()))?;

    let rows = parse_rows(&content, format)
        .with_context(|| format!("无法解析数据文件: {}", path.display()))?;

    tracing::info!(
        "成功加载 {} 行: {}",
        rows.len(),
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(rows)
}

/// 解析文本内容为行列表
pub fn parse_rows(content: &str, format: FileFormat) -> Result<Vec<Row>> {
    match format {
        FileFormat::Json => {
            let value: Value = serde_json::from_str(content)?;
            match value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| into_row(item).with_context(|| format!("第 {} 个元素不是对象", i)))
                    .collect(),
                Value::Object(map) => Ok(vec![map]),
                other => anyhow::bail!("顶层必须是数组或对象，实际为: {}", type_name(&other)),
            }
        }
        FileFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let value: Value = serde_json::from_str(line)
                    .with_context(|| format!("第 {} 行不是合法 JSON", i + 1))?;
                into_row(value).with_context(|| format!("第 {} 行不是对象", i + 1))
            })
            .collect(),
    }
}

fn into_row(value: Value) -> Result<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("期望对象，实际为: {}", type_name(&other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_array_and_object() {
        let rows = parse_rows(r#"[{"question": "a"}, {"question": "b"}]"#, FileFormat::Json).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = parse_rows(r#"{"problem": "x"}"#, FileFormat::Json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["problem"], "x");

        assert!(parse_rows("[1, 2]", FileFormat::Json).is_err());
        assert!(parse_rows("\"text\"", FileFormat::Json).is_err());
    }

    #[test]
    fn test_parse_jsonl_skips_blank_lines() {
        let content = "{\"q\": 1}\n\n{\"q\": 2}\n";
        let rows = parse_rows(content, FileFormat::JsonLines).unwrap();
        assert_eq!(rows.len(), 2);

        let err = parse_rows("{\"q\": 1}\nnot json\n", FileFormat::JsonLines).unwrap_err();
        assert!(err.to_string().contains("第 2 行"));
    }

    #[tokio::test]
    async fn test_load_rows_from_file() {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, "{{\"question\": \"2+2?\"}}").unwrap();
        writeln!(file, "{{\"question\": \"3+3?\"}}").unwrap();

        let rows = load_rows_from_file(file.path()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["question"], "3+3?");
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        assert!(load_rows_from_file(file.path()).await.is_err());
    }
}
