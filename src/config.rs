//! Legacy table configuration
//!
//! Paths are resolved per call through [`PathProvider`]; a blank path means the
//! table is not configured, which is a normal operating mode for partial
//! legacy installations. [`LegacyConfig`] is the file-backed provider:
//!
//! ```toml
//! encoding = "windows-1252"
//! search_limit = 50
//!
//! [tables]
//! products = "/srv/pos/data/PRODUCTS.DBF"
//! documents = "/srv/pos/data/DOCS.DBF"
//! cash_cuts = "/srv/pos/data/CUTS.DBF"
//! register_names = ""
//! clients = "/srv/pos/data/CLIENTS.DBF"
//! client_addresses = "/srv/pos/data/CLIADDR.DBF"
//! ```
use crate::repository::records::columns;
use crate::search::criteria::DEFAULT_SEARCH_LIMIT;
use crate::table::dbf::DbfTableSource;
use async_trait::async_trait;
use encoding_rs::Encoding;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Unknown text encoding '{0}'")]
    EncodingError(String),
}

/// Logical legacy tables known to the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyTableKind {
    Products,
    Documents,
    RegisterNames,
    CashCuts,
    Clients,
    ClientAddresses,
}

impl LegacyTableKind {
    pub const ALL: [LegacyTableKind; 6] = [
        Self::Products,
        Self::Documents,
        Self::RegisterNames,
        Self::CashCuts,
        Self::Clients,
        Self::ClientAddresses,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Documents => "documents",
            Self::RegisterNames => "register_names",
            Self::CashCuts => "cash_cuts",
            Self::Clients => "clients",
            Self::ClientAddresses => "client_addresses",
        }
    }

    /// Columns the mappers for this table cannot do without.
    pub const fn expected_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Products => &[columns::CODE, columns::NAME, columns::PRICE, columns::TAX_RATE],
            Self::Documents => &[
                columns::DOCUMENT_NUMBER,
                columns::DATE,
                columns::TOTAL,
                columns::SERIES,
                columns::FOLIO,
            ],
            Self::RegisterNames => &[columns::CODE, columns::NAME],
            Self::CashCuts => &[
                columns::REGISTER,
                columns::CUT_DATE,
                columns::INVOICES,
                columns::RETURNS,
            ],
            Self::Clients => &[columns::ID, columns::CODE, columns::NAME, columns::TAX_ID],
            Self::ClientAddresses => &[columns::CLIENT_ID, columns::STREET, columns::CITY],
        }
    }
}

impl FromStr for LegacyTableKind {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| format!("unknown legacy table '{name}'"))
    }
}

/// Supplies the path of each legacy table, looked up once per call.
#[async_trait]
pub trait PathProvider: Send + Sync {
    /// Returns the configured path, or None if the table is not configured.
    async fn table_path(&self, table: LegacyTableKind) -> Option<PathBuf>;
}

/// Paths per logical table; blank means not configured.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TablePaths {
    pub products: String,
    pub documents: String,
    pub register_names: String,
    pub cash_cuts: String,
    pub clients: String,
    pub client_addresses: String,
}

/// File-backed legacy configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub tables: TablePaths,
    /// Text encoding label (WHATWG) overriding the tables' language driver
    pub encoding: Option<String>,
    /// Cap on fuzzy catalog search results
    pub search_limit: usize,
    /// Surface records carrying the deletion flag
    pub include_deleted: bool,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            tables: TablePaths::default(),
            encoding: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
            include_deleted: false,
        }
    }
}

impl FromStr for LegacyConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}

impl LegacyConfig {
    /// Loads a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_owned(),
            source,
        })?;
        text.parse()
    }

    /// Configured path of a table; blank entries are None.
    pub fn path(&self, table: LegacyTableKind) -> Option<PathBuf> {
        let path = match table {
            LegacyTableKind::Products => &self.tables.products,
            LegacyTableKind::Documents => &self.tables.documents,
            LegacyTableKind::RegisterNames => &self.tables.register_names,
            LegacyTableKind::CashCuts => &self.tables.cash_cuts,
            LegacyTableKind::Clients => &self.tables.clients,
            LegacyTableKind::ClientAddresses => &self.tables.client_addresses,
        };
        Some(path.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }

    /// Resolves the encoding label, if any.
    pub fn encoding(&self) -> Result<Option<&'static Encoding>, ConfigError> {
        match self.encoding.as_deref().map(str::trim).filter(|label| !label.is_empty()) {
            Some(label) => Encoding::for_label(label.as_bytes())
                .map(Some)
                .ok_or_else(|| ConfigError::EncodingError(label.to_owned())),
            None => Ok(None),
        }
    }

    /// Builds the DBF table source described by this configuration.
    pub fn table_source(&self) -> Result<DbfTableSource, ConfigError> {
        Ok(DbfTableSource::new(self.encoding()?).include_deleted(self.include_deleted))
    }
}

#[async_trait]
impl PathProvider for LegacyConfig {
    async fn table_path(&self, table: LegacyTableKind) -> Option<PathBuf> {
        self.path(table)
    }
}
