use std::path::{Path, PathBuf};

use postbot_contracts::KnowledgeEntry;

/// Read-only FAQ document on disk. Every load re-reads the file; a missing
/// or malformed document loads as an empty knowledge base.
pub struct KnowledgeBase {
    path: PathBuf,
}

impl KnowledgeBase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Vec<KnowledgeEntry> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "knowledge base unreadable");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<KnowledgeEntry>>(&text) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(KnowledgeEntry::normalized)
                .collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "knowledge base malformed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbot_contracts::Answer;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("postbot-kb-{name}-{nanos}.json"))
    }

    #[tokio::test]
    async fn missing_document_loads_empty() {
        let kb = KnowledgeBase::new(temp_path("missing"));
        assert!(kb.load().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_document_loads_empty() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{\"keywords\": [").unwrap();
        assert!(KnowledgeBase::new(&path).load().await.is_empty());

        std::fs::write(&path, "{\"keywords\": [\"hi\"], \"answer\": \"x\"}").unwrap();
        assert!(KnowledgeBase::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn entries_keep_document_order_and_lowercase_keywords() {
        let path = temp_path("ordered");
        std::fs::write(
            &path,
            r#"[
                {"keywords": ["Speed Post"], "answer": "first"},
                {"keywords": [""], "answer": "dropped"},
                {"keywords": ["POST"], "answer": {"randomize": true, "options": ["second"]}}
            ]"#,
        )
        .unwrap();
        let entries = KnowledgeBase::new(&path).load().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].keywords, vec!["speed post".to_string()]);
        assert_eq!(entries[0].answer, Answer::Text("first".to_string()));
        assert_eq!(entries[1].keywords, vec!["post".to_string()]);
    }

    #[tokio::test]
    async fn edits_are_visible_on_next_load() {
        let path = temp_path("reload");
        std::fs::write(&path, r#"[{"keywords": ["a"], "answer": "one"}]"#).unwrap();
        let kb = KnowledgeBase::new(&path);
        assert_eq!(kb.load().await.len(), 1);

        std::fs::write(
            &path,
            r#"[{"keywords": ["a"], "answer": "one"}, {"keywords": ["b"], "answer": "two"}]"#,
        )
        .unwrap();
        assert_eq!(kb.load().await.len(), 2);
    }
}
