//! Reference data: accounts, categories, cost centers and members
//!
//! ## Configuration Resolution
//!
//! 1. `--config <path>` passed by the caller
//! 2. `$TREASURY_CONFIG`
//! 3. `<config dir>/treasury/config.toml` (e.g. ~/.config/treasury/config.toml)
//! 4. Embedded defaults (compiled into binary)
//!
//! An explicitly named file that does not exist is an error; a missing file at
//! the default location is not.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ingest::IngestOptions;
use crate::models::{Direction, Member, IGNORE_LABEL, UNIDENTIFIED_LABEL};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/treasury.toml");

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TREASURY_CONFIG";

/// Statement import settings (`[import]` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// How many statement rows are offered for classification per run
    pub review_limit: usize,
    /// Year given to PDF lines; `None` means the current year
    pub assumed_year: Option<i32>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            review_limit: 10,
            assumed_year: None,
        }
    }
}

impl ImportSettings {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            assumed_year: self.assumed_year,
        }
    }
}

/// The organization's reference lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub accounts: Vec<String>,
    pub credit_categories: Vec<String>,
    pub debit_categories: Vec<String>,
    pub cost_centers: Vec<String>,
    pub default_cost_center: String,
    pub members: Vec<Member>,
    pub import: ImportSettings,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self {
            accounts: strings(&["Conta Corrente (Banco)", "Caixa Físico (Espécie)"]),
            credit_categories: strings(&[
                "Doação Anônima",
                "Mensalidade",
                "Cantina",
                "Bazar",
                "Livros",
                "Eventos",
            ]),
            debit_categories: strings(&[
                "Energia",
                "Água",
                "Manutenção Predial",
                "Assistência Social",
                "Internet",
                "Material de Limpeza",
            ]),
            cost_centers: strings(&[
                "Geral",
                "Departamento Doutrinário",
                "Assistência Social",
                "Administrativo",
            ]),
            default_cost_center: "Geral".to_string(),
            members: vec![
                Member {
                    email: Some("joel@email.com".to_string()),
                    ..Member::new("Joel Silva", "5595981136537")
                },
                Member {
                    email: Some("maria@email.com".to_string()),
                    ..Member::new("Maria Oliveira", "95988888888")
                },
                Member {
                    status: "N/A".to_string(),
                    ..Member::new("Doador Anônimo", "")
                },
            ],
            import: ImportSettings::default(),
        }
    }
}

impl ReferenceData {
    /// Categories offered for a direction
    pub fn categories_for(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Credit => &self.credit_categories,
            Direction::Debit => &self.debit_categories,
        }
    }

    pub fn is_category(&self, direction: Direction, name: &str) -> bool {
        self.categories_for(direction).iter().any(|c| c == name)
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// First configured account, used when a run names none
    pub fn default_account(&self) -> Option<&str> {
        self.accounts.first().map(String::as_str)
    }

    /// Parse reference data from TOML and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let data: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
        data.validate()?;
        Ok(data)
    }

    /// Load reference data from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let data = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded reference data");
        Ok(data)
    }

    /// Load using the resolution order in the module docs
    pub fn load_resolved(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load(Path::new(&path));
            }
        }
        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        debug!("No config file found, using embedded defaults");
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Reject lists that would collide with the classification sentinels
    pub fn validate(&self) -> Result<()> {
        for name in self.credit_categories.iter().chain(&self.debit_categories) {
            if name.trim().is_empty() {
                return Err(Error::Config("empty category name".into()));
            }
            if name.eq_ignore_ascii_case(IGNORE_LABEL) {
                return Err(Error::Config(format!(
                    "'{}' is reserved and cannot be a category",
                    IGNORE_LABEL
                )));
            }
        }
        for member in &self.members {
            if member.name.trim().is_empty() {
                return Err(Error::Config("member with empty name".into()));
            }
            if member.name.eq_ignore_ascii_case(UNIDENTIFIED_LABEL) {
                return Err(Error::Config(format!(
                    "'{}' is reserved and cannot be a member name",
                    UNIDENTIFIED_LABEL
                )));
            }
        }
        if self.default_cost_center.trim().is_empty() {
            return Err(Error::Config("default_cost_center must not be empty".into()));
        }
        if self.import.review_limit == 0 {
            return Err(Error::Config("import.review_limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("treasury").join("config.toml"))
}
