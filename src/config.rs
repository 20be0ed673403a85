use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetchers::FetcherKind;
use crate::models::fields;
use crate::parsers::default_rules;
use crate::scrapers::{
    BatchRequest, BatchSettings, ExtractionPlan, FieldRule, PagingConvention, SelectorCandidate,
};

const CONFIG_FILE: &str = "listing_scraper";
const ENV_PREFIX: &str = "LISTING_SCRAPER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Key into `sites` for the profile to scrape.
    pub site: String,
    pub sites: HashMap<String, SiteProfile>,
    pub page_count: u32,
    pub page_delay_ms: u64,
    pub workers: usize,
    pub fetcher: FetcherKind,
    pub http: HttpSettings,
    pub browser: BrowserSettings,
    pub storage: StorageSettings,
    pub feedback: FeedbackSettings,
}

/// Everything site-specific: where listings live and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub base_url: String,
    /// Selector matching one listing block.
    pub container: String,
    #[serde(default)]
    pub paging: PagingConvention,
    pub plan: ExtractionPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            timeout_secs: 25,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    /// Selector whose presence means the listings have rendered.
    pub wait_for: Option<String>,
    pub wait_timeout_secs: u64,
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            wait_for: Some("article".to_string()),
            wait_timeout_secs: 10,
            args: [
                "--headless",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--window-size=1920,1080",
            ]
            .iter()
            .map(|a| a.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub sqlite_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Csv,
            data_dir: PathBuf::from("data"),
            sqlite_path: PathBuf::from("listings.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSettings {
    pub endpoint: String,
    pub token: String,
    pub form_id: String,
    /// Question names of the form; answers under any other key are dropped.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_rating_field")]
    pub rating_field: String,
    #[serde(default = "default_comment_field")]
    pub comment_field: String,
}

fn default_name_field() -> String {
    "Votre_nom".to_string()
}

fn default_rating_field() -> String {
    "Noter_l_application_de_1_a_10".to_string()
}

fn default_comment_field() -> String {
    "Votre_commentaire".to_string()
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            form_id: String::new(),
            name_field: default_name_field(),
            rating_field: default_rating_field(),
            comment_field: default_comment_field(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sites = HashMap::new();
        sites.insert("expat_dakar".to_string(), expat_dakar_profile());
        sites.insert("ad_cards".to_string(), ad_cards_profile());

        Self {
            site: "expat_dakar".to_string(),
            sites,
            page_count: 1,
            page_delay_ms: 2000,
            workers: 1,
            fetcher: FetcherKind::Http,
            http: HttpSettings::default(),
            browser: BrowserSettings::default(),
            storage: StorageSettings::default(),
            feedback: FeedbackSettings::default(),
        }
    }
}

impl Config {
    /// Built-in defaults, then `listing_scraper.{toml,json,yaml}` if present,
    /// then `LISTING_SCRAPER__*` environment variables.
    pub fn load() -> Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default())
            .context("Failed to serialize default configuration")?;

        let config: Config = ::config::Config::builder()
            .add_source(defaults)
            .add_source(::config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_count == 0 {
            return Err(anyhow!("page_count must be at least 1"));
        }
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        self.profile()?;
        Ok(())
    }

    pub fn profile(&self) -> Result<&SiteProfile> {
        self.sites
            .get(&self.site)
            .ok_or_else(|| anyhow!("Unknown site profile `{}`", self.site))
    }

    pub fn batch_request(&self) -> Result<BatchRequest> {
        let profile = self.profile()?.clone();
        Ok(BatchRequest {
            base_url: profile.base_url.clone(),
            page_count: self.page_count,
            profile,
            fetcher_kind: self.fetcher,
        })
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            page_delay: Duration::from_millis(self.page_delay_ms),
            workers: self.workers,
        }
    }
}

/// Article-based layout: loose `li` chips carry rooms, surface and location.
pub fn expat_dakar_profile() -> SiteProfile {
    SiteProfile {
        name: "Expat Dakar".to_string(),
        base_url: "https://www.expat-dakar.com/appartements-a-louer".to_string(),
        container: "article.listing-item".to_string(),
        paging: PagingConvention::default(),
        plan: ExtractionPlan {
            fields: vec![
                FieldRule::new(
                    fields::TITLE,
                    vec![
                        SelectorCandidate::text("h2"),
                        SelectorCandidate::text("h3"),
                        SelectorCandidate::text("a.listing-title"),
                    ],
                ),
                FieldRule::new(
                    fields::PRICE,
                    vec![
                        SelectorCandidate::text(".price"),
                        SelectorCandidate::text(".listing-price"),
                    ],
                ),
                FieldRule::new(
                    fields::IMAGE_URL,
                    vec![
                        SelectorCandidate::attr("img", "src"),
                        SelectorCandidate::attr("img", "data-src"),
                    ],
                )
                .required()
                .url(),
                FieldRule::new(fields::LINK, vec![SelectorCandidate::attr("a", "href")]).url(),
            ],
            aux_items: vec!["li".to_string(), ".listing-detail".to_string()],
            classification: default_rules(),
        },
    }
}

/// Card grid layout: every field has its own element and all four must exist.
pub fn ad_cards_profile() -> SiteProfile {
    SiteProfile {
        name: "Ad cards".to_string(),
        base_url: "https://www.example-annonces.sn/immobilier".to_string(),
        container: "div.col.s6.m4.l3".to_string(),
        paging: PagingConvention {
            param: "page".to_string(),
            include_on_first: true,
        },
        plan: ExtractionPlan {
            fields: vec![
                FieldRule::new(
                    fields::TITLE,
                    vec![SelectorCandidate::text("p.ad__card-description a")],
                )
                .required(),
                FieldRule::new(fields::PRICE, vec![SelectorCandidate::text("p.ad__card-price a")])
                    .required(),
                FieldRule::new(
                    fields::ADDRESS,
                    vec![SelectorCandidate::text("p.ad__card-location span")],
                )
                .required(),
                FieldRule::new(
                    fields::IMAGE_URL,
                    vec![SelectorCandidate::attr("img.ad__card-img", "src")],
                )
                .required()
                .url(),
                FieldRule::new(
                    fields::LINK,
                    vec![SelectorCandidate::attr("p.ad__card-description a", "href")],
                )
                .url(),
            ],
            aux_items: vec![],
            classification: vec![],
        },
    }
}
