use std::path::{Path, PathBuf};

use super::chunker::Document;
use super::RagError;

/// Extracts the text of every page, numbered from 1. Pages lopdf cannot
/// decode are kept with empty text so numbering stays aligned.
pub async fn extract_pages(path: &Path) -> Result<Vec<Document>, RagError> {
    if !path.exists() {
        return Err(RagError::SourceNotFound(path.display().to_string()));
    }

    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&path))
        .await
        .map_err(|err| RagError::Pdf(err.to_string()))?
}

pub fn source_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn extract_blocking(path: &Path) -> Result<Vec<Document>, RagError> {
    let document = lopdf::Document::load(path).map_err(|err| RagError::Pdf(err.to_string()))?;
    let source = source_id(path);

    let mut pages = Vec::new();
    for (page_number, _) in document.get_pages() {
        let text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(page = page_number, "Skipping unreadable page: {}", err);
                String::new()
            }
        };
        pages.push(Document::new(source.clone(), page_number, text));
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_source_not_found() {
        let err = extract_pages(Path::new("/definitely/missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = extract_pages(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Pdf(_)));
    }

    #[test]
    fn source_id_is_file_name() {
        assert_eq!(source_id(Path::new("/data/NCF-FS_2022EN.pdf")), "NCF-FS_2022EN.pdf");
    }
}
