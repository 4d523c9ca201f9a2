use crate::config::{WordListConfig, WordListSourceType};
use crate::error::WordListError;
use crate::game_logic::deck::normalize_word;

/// Loads the board vocabulary once at startup. Words are trimmed and uppercased,
/// blank lines are skipped.
#[tracing::instrument(skip(config), fields(source = ?config.source_type))]
pub async fn load_word_list(config: &WordListConfig) -> Result<Vec<String>, WordListError> {
    let content = match config.source_type {
        WordListSourceType::File => {
            let path = config.file_path.as_ref().ok_or_else(|| {
                WordListError::Config("File path missing for file source type".to_string())
            })?;
            tracing::info!(path = %path, "Reading word list from file");
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| WordListError::FileRead {
                    path: path.clone(),
                    source: e,
                })?
        }
        WordListSourceType::Http => {
            let url = config.http_url.as_ref().ok_or_else(|| {
                WordListError::Config("HTTP URL missing for http source type".to_string())
            })?;
            tracing::info!(url = %url, "Fetching word list");
            reqwest::get(url)
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| WordListError::HttpFetch {
                    url: url.clone(),
                    source: e,
                })?
                .text()
                .await
                .map_err(|e| WordListError::HttpFetch {
                    url: url.clone(),
                    source: e,
                })?
        }
    };

    let words = parse_word_list(&content);
    if words.is_empty() {
        return Err(WordListError::Empty);
    }
    tracing::info!(count = words.len(), "Word list loaded");
    Ok(words)
}

fn parse_word_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(normalize_word)
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_uppercases() {
        let words = parse_word_list("apple\n  Bear \n\n\t\nNew York\r\n");
        assert_eq!(words, vec!["APPLE", "BEAR", "NEW YORK"]);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("codewords-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "alpha\nbeta\n").await.unwrap();
        let config = WordListConfig {
            source_type: WordListSourceType::File,
            file_path: Some(path.to_string_lossy().into_owned()),
            http_url: None,
        };
        let words = load_word_list(&config).await.unwrap();
        assert_eq!(words, vec!["ALPHA", "BETA"]);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_and_missing_files_fail() {
        let path = std::env::temp_dir().join(format!("codewords-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "\n  \n").await.unwrap();
        let mut config = WordListConfig {
            source_type: WordListSourceType::File,
            file_path: Some(path.to_string_lossy().into_owned()),
            http_url: None,
        };
        assert!(matches!(
            load_word_list(&config).await,
            Err(WordListError::Empty)
        ));
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(matches!(
            load_word_list(&config).await,
            Err(WordListError::FileRead { .. })
        ));

        config.file_path = None;
        assert!(matches!(
            load_word_list(&config).await,
            Err(WordListError::Config(_))
        ));
    }
}
