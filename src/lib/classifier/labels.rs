use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::*;

/// Parses a newline-delimited label list: line N names class index N.
pub fn parse_labels(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

#[instrument(level = "debug")]
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed reading label file {path:?}"))?;

    let labels = parse_labels(&content);
    if labels.is_empty() {
        return Err(anyhow!("Label file {path:?} is empty"));
    }

    debug!("Loaded {} labels from {path:?}", labels.len());
    Ok(labels)
}

/// Placeholder names for models shipped without a label file.
pub fn generated_labels(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("class_{index}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_order_defines_class_index() {
        let labels = parse_labels("background\r\ncat\ndog\n");
        assert_eq!(labels, vec!["background", "cat", "dog"]);
    }

    #[test]
    fn blank_lines_keep_their_index() {
        let labels = parse_labels("a\n\nc");
        assert_eq!(labels, vec!["a", "", "c"]);
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("labels-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "zero\none\n").unwrap();

        assert_eq!(load_labels(&path).unwrap(), vec!["zero", "one"]);
        let _ = std::fs::remove_file(&path);

        assert!(load_labels(&path).is_err());
    }

    #[test]
    fn generated_names() {
        assert_eq!(generated_labels(2), vec!["class_0", "class_1"]);
    }
}
