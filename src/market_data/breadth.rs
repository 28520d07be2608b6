//! Market breadth sources
//!
//! Breadth is the percentage of index constituents meeting a health criterion
//! (for example, trading above their 20-day average). Sources are tried in
//! configured order; the first one that yields a value in [0, 100] wins.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use super::BreadthSource;
use crate::config::{BreadthConfig, BreadthExtract, BreadthSourceConfig};
use crate::error::{DataFetchError, DataResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("static pattern")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static pattern"));

#[derive(Debug)]
enum Extractor {
    JsonPointer(String),
    HtmlText(Regex),
    Raw(Regex),
}

#[derive(Debug)]
struct Source {
    name: String,
    url: String,
    date_param: Option<String>,
    extractor: Extractor,
}

impl Source {
    fn compile(config: &BreadthSourceConfig) -> Result<Self> {
        let extractor = match &config.extract {
            BreadthExtract::JsonPointer { pointer } => Extractor::JsonPointer(pointer.clone()),
            BreadthExtract::HtmlText { pattern } => {
                Extractor::HtmlText(compile_pattern(&config.name, pattern)?)
            }
            BreadthExtract::Raw { pattern } => Extractor::Raw(compile_pattern(&config.name, pattern)?),
        };

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            date_param: config.date_param.clone(),
            extractor,
        })
    }

    fn extract(&self, body: &str) -> DataResult<f64> {
        match &self.extractor {
            Extractor::JsonPointer(pointer) => {
                let value: Value = serde_json::from_str(body)
                    .map_err(|e| DataFetchError::Parse(format!("{} response: {}", self.name, e)))?;
                extract_breadth(&value, pointer)
            }
            Extractor::HtmlText(pattern) => extract_pattern(&visible_text(body), pattern),
            Extractor::Raw(pattern) => extract_pattern(body, pattern),
        }
    }
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)
        .with_context(|| format!("Invalid breadth pattern for source '{}'", name))?;
    if regex.captures_len() < 2 {
        bail!("Breadth pattern for source '{}' needs a capture group", name);
    }
    Ok(regex)
}

pub struct HttpBreadthSource {
    client: Client,
    sources: Vec<Source>,
}

impl HttpBreadthSource {
    pub fn from_config(config: &BreadthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let sources = config
            .sources
            .iter()
            .map(Source::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { client, sources })
    }

    fn fetch_one(&self, source: &Source, date: NaiveDate) -> DataResult<f64> {
        debug!("Fetching market breadth from {} ({})", source.name, source.url);

        let mut request = self.client.get(&source.url);
        if let Some(param) = &source.date_param {
            request = request.query(&[(param.as_str(), date.format("%Y-%m-%d").to_string())]);
        }
        let response = request.send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataFetchError::Api {
                code: i64::from(status.as_u16()),
                message: format!("{} returned {}", source.name, status),
            });
        }

        let body = response.text()?;
        source.extract(&body)
    }
}

impl BreadthSource for HttpBreadthSource {
    fn breadth_pct(&self, date: NaiveDate) -> DataResult<f64> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match self.fetch_one(source, date) {
                Ok(breadth) => {
                    info!("Market breadth for {} from {}: {:.1}%", date, source.name, breadth);
                    return Ok(breadth);
                }
                Err(e) => {
                    warn!("Breadth source {} failed: {}", source.name, e);
                    failures.push(format!("{}: {}", source.name, e));
                }
            }
        }

        if failures.is_empty() {
            return Err(DataFetchError::BreadthUnavailable(
                "no breadth sources configured".to_string(),
            ));
        }
        Err(DataFetchError::BreadthUnavailable(failures.join("; ")))
    }
}

/// Read a breadth percentage at `pointer`; accepts numbers, numeric strings and
/// strings with a trailing `%`.
pub fn extract_breadth(body: &Value, pointer: &str) -> DataResult<f64> {
    let raw = body
        .pointer(pointer)
        .ok_or_else(|| DataFetchError::InvalidBreadth(format!("no value at {}", pointer)))?;

    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DataFetchError::InvalidBreadth(format!("not a number: {}", raw)))?;

    check_range(value)
}

/// First capture of `pattern` in `text` that parses to a value within [0, 100]
pub fn extract_pattern(text: &str, pattern: &Regex) -> DataResult<f64> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|v| v.is_finite() && (0.0..=100.0).contains(v))
        .ok_or_else(|| {
            DataFetchError::InvalidBreadth(format!("no value in [0, 100] matches {}", pattern))
        })
}

/// Page text with scripts, styles, comments and tags removed
pub fn visible_text(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, " ");
    TAG.replace_all(&without_code, " ").into_owned()
}

fn check_range(value: f64) -> DataResult<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(DataFetchError::InvalidBreadth(format!(
            "{} is outside [0, 100]",
            value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn percent() -> Regex {
        Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap()
    }

    #[test]
    fn test_extract_number() {
        let body = json!({"breadth_pct": 12.5});
        assert_eq!(extract_breadth(&body, "/breadth_pct").unwrap(), 12.5);
    }

    #[test]
    fn test_extract_nested_string_with_percent() {
        let body = json!({"data": {"sp500": {"above_20dma": " 31.4% "}}});
        assert_eq!(
            extract_breadth(&body, "/data/sp500/above_20dma").unwrap(),
            31.4
        );
    }

    #[test]
    fn test_missing_pointer() {
        let body = json!({"other": 1});
        assert!(matches!(
            extract_breadth(&body, "/breadth_pct"),
            Err(DataFetchError::InvalidBreadth(_))
        ));
    }

    #[test]
    fn test_out_of_range() {
        assert!(extract_breadth(&json!({"b": 140.0}), "/b").is_err());
        assert!(extract_breadth(&json!({"b": -1}), "/b").is_err());
        assert!(extract_breadth(&json!({"b": true}), "/b").is_err());
    }

    #[test]
    fn test_bounds_inclusive() {
        assert_eq!(extract_breadth(&json!({"b": 0}), "/b").unwrap(), 0.0);
        assert_eq!(extract_breadth(&json!({"b": 100}), "/b").unwrap(), 100.0);
    }

    #[test]
    fn test_visible_text_drops_markup() {
        let html = r#"<html><head><style>.bar { width: 100%; }</style>
            <script>var x = "55%";</script></head>
            <body><div style="width:100%"><!-- 77% -->S&amp;P 500 above 20DMA: <b>23.4%</b></div></body></html>"#;
        let text = visible_text(html);
        assert!(!text.contains("55%"));
        assert!(!text.contains("77%"));
        assert!(!text.contains("width"));
        assert_eq!(extract_pattern(&text, &percent()).unwrap(), 23.4);
    }

    #[test]
    fn test_pattern_skips_out_of_range_matches() {
        let text = "Up 250% since 2009. Breadth 18.5% today.";
        assert_eq!(extract_pattern(text, &percent()).unwrap(), 18.5);
    }

    #[test]
    fn test_pattern_without_match() {
        assert!(matches!(
            extract_pattern("no numbers here", &percent()),
            Err(DataFetchError::InvalidBreadth(_))
        ));
    }

    #[test]
    fn test_raw_pattern_reads_script_data() {
        let source = Source::compile(&BreadthSourceConfig {
            name: "tv".to_string(),
            url: "https://example.com".to_string(),
            date_param: None,
            extract: BreadthExtract::Raw {
                pattern: r#""advanceDecline":\s*(\d+(?:\.\d+)?)"#.to_string(),
            },
        })
        .unwrap();
        let body = r#"<script>window.data = {"advanceDecline": 12.75, "other": 3};</script>"#;
        assert_eq!(source.extract(body).unwrap(), 12.75);
    }

    #[test]
    fn test_json_source_extracts_pointer() {
        let source = Source::compile(&BreadthSourceConfig {
            name: "api".to_string(),
            url: "https://example.com".to_string(),
            date_param: Some("date".to_string()),
            extract: BreadthExtract::JsonPointer {
                pointer: "/breadth_pct".to_string(),
            },
        })
        .unwrap();
        assert_eq!(source.extract(r#"{"breadth_pct": "41.0%"}"#).unwrap(), 41.0);
        assert!(matches!(
            source.extract("<html>"),
            Err(DataFetchError::Parse(_))
        ));
    }

    #[test]
    fn test_pattern_needs_capture_group() {
        let config = BreadthConfig {
            sources: vec![BreadthSourceConfig {
                name: "bad".to_string(),
                url: "https://example.com".to_string(),
                date_param: None,
                extract: BreadthExtract::Raw {
                    pattern: r"\d+%".to_string(),
                },
            }],
            timeout_secs: 5,
        };
        assert!(HttpBreadthSource::from_config(&config).is_err());
    }

    #[test]
    fn test_no_sources_is_unavailable() {
        let source = HttpBreadthSource::from_config(&BreadthConfig {
            sources: Vec::new(),
            timeout_secs: 5,
        })
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        assert!(matches!(
            source.breadth_pct(date),
            Err(DataFetchError::BreadthUnavailable(_))
        ));
    }

    #[test]
    fn test_default_sources_compile() {
        let source = HttpBreadthSource::from_config(&BreadthConfig::default()).unwrap();
        assert_eq!(source.sources.len(), 2);
    }
}
