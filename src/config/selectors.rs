use crate::utils::error::{Result, WatchError};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where the listings sit inside the fetched page.
///
/// Every selector is a CSS selector evaluated with the `scraper` crate;
/// `link`, `title` and `price` are evaluated inside each `item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub item: String,
    pub link: String,
    pub link_attribute: String,
    pub title: Option<String>,
    pub price: Option<String>,
    /// Attribute on the item element holding a stable listing id.
    pub id_attribute: Option<String>,
    /// Present only when the site explicitly reports zero results.
    pub empty_marker: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item: "article".to_string(),
            link: "a[href]".to_string(),
            link_attribute: "href".to_string(),
            title: Some("h2, h3".to_string()),
            price: Some(".price".to_string()),
            id_attribute: None,
            empty_marker: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SelectorFile {
    #[serde(default)]
    selectors: SelectorConfig,
}

impl SelectorConfig {
    /// 從 TOML 檔案載入
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| WatchError::ConfigError {
            message: format!(
                "Cannot read selectors file '{}': {}",
                path.as_ref().display(),
                e
            ),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let file: SelectorFile =
            toml::from_str(&processed_content).map_err(|e| WatchError::ConfigError {
                message: format!("TOML parsing error: {}", e),
            })?;
        file.selectors.validate()?;
        Ok(file.selectors)
    }

    /// 替換環境變數 (例如 ${LISTING_SELECTOR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| WatchError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for SelectorConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("selectors.item", &self.item)?;
        validate_non_empty_string("selectors.link", &self.link)?;
        validate_non_empty_string("selectors.link_attribute", &self.link_attribute)?;
        Ok(())
    }
}
