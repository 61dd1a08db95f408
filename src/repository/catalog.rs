use crate::config::ConfigError;
use crate::config::LegacyConfig;
use crate::config::LegacyTableKind;
use crate::config::PathProvider;
use crate::diagnostic::DiagnosticReport;
use crate::diagnostic::SchemaDiagnostic;
use crate::error::LegacyError;
use crate::repository::records::columns;
use crate::repository::records::CashCutRawRecord;
use crate::repository::records::ClientAddressRecord;
use crate::repository::records::ClientRecord;
use crate::repository::records::DateBranchFilter;
use crate::repository::records::DocumentRecord;
use crate::repository::records::ProductRecord;
use crate::repository::records::RegisterNameRecord;
use crate::repository::LegacyTable;
use crate::search::criteria::SearchCriteria;
use crate::search::criteria::DEFAULT_SEARCH_LIMIT;
use crate::search::matcher::MatchMode;
use crate::table::TableSource;
use chrono::NaiveDate;
use serde_json::Map;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::debug_span;
use tracing::warn;
use tracing::Span;

const PRODUCT_SEARCH_FIELDS: [&str; 2] = [columns::CODE, columns::NAME];
const CLIENT_SEARCH_FIELDS: [&str; 4] = [columns::CODE, columns::NAME, columns::TAX_ID, columns::EMAIL];

/// Async entry point to the legacy tables.
///
/// Paths are resolved through the [`PathProvider`] on every call, and each
/// scan runs on a blocking worker. A table that is not configured yields an
/// empty result and a warning; a configured table missing on disk is an error.
#[derive(Clone)]
pub struct LegacyCatalog {
    paths: Arc<dyn PathProvider>,
    source: Arc<dyn TableSource>,
    search_limit: usize,
    span: Span,
}

impl LegacyCatalog {
    pub fn new(paths: Arc<dyn PathProvider>, source: Arc<dyn TableSource>) -> Self {
        Self {
            paths,
            source,
            search_limit: DEFAULT_SEARCH_LIMIT,
            span: debug_span!("legacy_catalog"),
        }
    }

    /// Catalog over DBF tables described by a configuration file.
    pub fn from_config(config: LegacyConfig) -> Result<Self, ConfigError> {
        let source = Arc::new(config.table_source()?);
        let search_limit = config.search_limit;
        Ok(Self::new(Arc::new(config), source).with_search_limit(search_limit))
    }

    pub fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    async fn path(&self, kind: LegacyTableKind) -> Option<PathBuf> {
        let path = self.paths.table_path(kind).await;
        if path.is_none() {
            warn!(parent: &self.span, table = kind.as_str(), "legacy table not configured");
        }
        path
    }

    async fn table(&self, kind: LegacyTableKind) -> Option<LegacyTable> {
        let path = self.path(kind).await?;
        let span = debug_span!(parent: &self.span, "legacy_table", table = kind.as_str(), path = %path.display());
        Some(LegacyTable::new(Arc::clone(&self.source), path).with_span(span))
    }

    /// Runs a blocking scan on a worker thread.
    async fn run<T, F>(&self, table: LegacyTable, cancel: &CancellationToken, scan: F) -> Result<T, LegacyError>
    where
        T: Send + 'static,
        F: FnOnce(&LegacyTable, &CancellationToken) -> Result<T, LegacyError> + Send + 'static,
    {
        let cancel = cancel.clone();
        task::spawn_blocking(move || scan(&table, &cancel)).await?
    }

    /// Documents issued on `date`, narrowed to `branch` when the table records one.
    pub async fn documents_by_date_and_branch(
        &self,
        date: NaiveDate,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentRecord>, LegacyError> {
        let Some(table) = self.table(LegacyTableKind::Documents).await else {
            return Ok(Vec::new());
        };
        let filter = DateBranchFilter::new(columns::DATE, date, branch);
        self.run(table, cancel, move |table, cancel| {
            table.scan_filtered(|row| filter.accept(row), |row| DocumentRecord::try_from(row), cancel)
        })
        .await
    }

    /// Cash cuts made on `date`, narrowed to `branch` when the table records one.
    pub async fn cash_cuts_by_date_and_branch(
        &self,
        date: NaiveDate,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CashCutRawRecord>, LegacyError> {
        let Some(table) = self.table(LegacyTableKind::CashCuts).await else {
            return Ok(Vec::new());
        };
        let filter = DateBranchFilter::new(columns::CUT_DATE, date, branch);
        self.run(table, cancel, move |table, cancel| {
            table.scan_filtered(|row| filter.accept(row), |row| CashCutRawRecord::try_from(row), cancel)
        })
        .await
    }

    pub async fn product_by_code(&self, code: &str, cancel: &CancellationToken) -> Result<Option<ProductRecord>, LegacyError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        let Some(table) = self.table(LegacyTableKind::Products).await else {
            return Ok(None);
        };
        let code = code.to_owned();
        self.run(table, cancel, move |table, cancel| {
            table.lookup_by_code(columns::CODE, &code, |row| ProductRecord::try_from(row), cancel)
        })
        .await
    }

    pub async fn register_name_by_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RegisterNameRecord>, LegacyError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        let Some(table) = self.table(LegacyTableKind::RegisterNames).await else {
            return Ok(None);
        };
        let code = code.to_owned();
        self.run(table, cancel, move |table, cancel| {
            table.lookup_by_code(columns::CODE, &code, |row| RegisterNameRecord::try_from(row), cancel)
        })
        .await
    }

    /// Searches products by code and name.
    pub async fn search_products(
        &self,
        term: &str,
        mode: MatchMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProductRecord>, LegacyError> {
        let criteria = SearchCriteria::new(term, &PRODUCT_SEARCH_FIELDS, mode).with_limit(Some(self.search_limit));
        if criteria.is_blank() {
            return Ok(Vec::new());
        }
        let Some(table) = self.table(LegacyTableKind::Products).await else {
            return Ok(Vec::new());
        };
        self.run(table, cancel, move |table, cancel| {
            table.search(&criteria, |row| ProductRecord::try_from(row), cancel)
        })
        .await
    }

    /// Searches clients by code, name, tax id and email.
    ///
    /// Matched clients carry their addresses when the address table is
    /// configured; if that file is missing the clients come back without them.
    pub async fn search_clients(
        &self,
        term: &str,
        mode: MatchMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<ClientRecord>, LegacyError> {
        let criteria = SearchCriteria::new(term, &CLIENT_SEARCH_FIELDS, mode).with_limit(Some(self.search_limit));
        if criteria.is_blank() {
            return Ok(Vec::new());
        }
        let Some(clients) = self.table(LegacyTableKind::Clients).await else {
            return Ok(Vec::new());
        };
        let addresses = self.table(LegacyTableKind::ClientAddresses).await;
        self.run(clients, cancel, move |clients, cancel| {
            let mut records = clients.search(&criteria, |row| ClientRecord::try_from(row), cancel)?;
            if let Some(addresses) = addresses.filter(|_| !records.is_empty()) {
                attach_addresses(&addresses, &mut records, cancel)?;
            }
            Ok(records)
        })
        .await
    }

    /// Diagnoses a configured table against the columns its records need.
    pub async fn diagnose(&self, kind: LegacyTableKind) -> Result<Option<DiagnosticReport>, LegacyError> {
        let Some(path) = self.path(kind).await else {
            return Ok(None);
        };
        let diagnostic = self.diagnostic(kind);
        let report = task::spawn_blocking(move || diagnostic.diagnose(&path, Some(kind.expected_columns()))).await?;
        Ok(Some(report))
    }

    /// First `count` readable rows of a configured table.
    pub async fn sample(&self, kind: LegacyTableKind, count: usize) -> Result<Vec<Map<String, Value>>, LegacyError> {
        let Some(path) = self.path(kind).await else {
            return Ok(Vec::new());
        };
        let diagnostic = self.diagnostic(kind);
        task::spawn_blocking(move || diagnostic.sample(&path, count)).await?
    }

    fn diagnostic(&self, kind: LegacyTableKind) -> SchemaDiagnostic {
        let span = debug_span!(parent: &self.span, "schema_diagnostic", table = kind.as_str());
        SchemaDiagnostic::new(Arc::clone(&self.source)).with_span(span)
    }
}

fn attach_addresses(
    table: &LegacyTable,
    clients: &mut [ClientRecord],
    cancel: &CancellationToken,
) -> Result<(), LegacyError> {
    let ids = clients.iter().map(|client| client.id).collect::<HashSet<_>>();
    let addresses = match table.scan_filtered(
        |row| Ok(ids.contains(&row.int32(columns::CLIENT_ID)?)),
        |row| ClientAddressRecord::try_from(row),
        cancel,
    ) {
        Ok(addresses) => addresses,
        Err(LegacyError::FileNotFound { path }) => {
            warn!(parent: table.span(), path = %path.display(), "client address table not found");
            return Ok(());
        }
        Err(error) => return Err(error),
    };
    for address in addresses {
        for client in clients.iter_mut().filter(|client| client.id == address.client_id) {
            client.addresses.push(address.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::ColumnType;
    use crate::table::memory::MemoryTable;
    use crate::table::memory::MemoryTableSource;
    use crate::table::value::FieldValue;

    fn config(tables: &str) -> LegacyConfig {
        format!("[tables]\n{tables}").parse().unwrap()
    }

    fn catalog(tables: &str, source: MemoryTableSource) -> LegacyCatalog {
        LegacyCatalog::new(Arc::new(config(tables)), Arc::new(source))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn documents() -> MemoryTable {
        let row = |number: &str, day: u32, branch: &str| {
            vec![
                FieldValue::Text(number.to_owned()),
                FieldValue::Date(NaiveDate::from_ymd_opt(2024, 5, day).unwrap()),
                FieldValue::Number(10.5),
                FieldValue::Text("FGIFS".to_owned()),
                FieldValue::Text("48".to_owned()),
                FieldValue::Text(branch.to_owned()),
            ]
        };
        MemoryTable::new(&[
            ("DOCNUM", ColumnType::Character),
            ("DATE", ColumnType::Date),
            ("TOTAL", ColumnType::Numeric),
            ("SERIES", ColumnType::Character),
            ("FOLIO", ColumnType::Character),
            ("BRANCH", ColumnType::Character),
        ])
        .row(row("D-1", 2, "CENTRO"))
        .row(row("D-2", 1, "CENTRO"))
        .row(row("D-3", 2, "NORTE"))
        .row(row("D-4", 2, "CENTRO"))
    }

    fn products() -> MemoryTable {
        MemoryTable::new(&[
            ("CODE", ColumnType::Character),
            ("NAME", ColumnType::Character),
            ("PRICE", ColumnType::Numeric),
            ("TAXRATE", ColumnType::Numeric),
        ])
        .text_row(&["51005", "Cola 600ml", "15.5", "0.16"])
        .text_row(&["100", "Agua 1l", "9", "0"])
        .text_row(&["7501", "Galletas", "12", "0.16"])
    }

    fn clients() -> MemoryTable {
        MemoryTable::new(&[
            ("ID", ColumnType::Integer),
            ("CODE", ColumnType::Character),
            ("NAME", ColumnType::Character),
            ("TAXID", ColumnType::Character),
        ])
        .row(vec![
            FieldValue::Integer(1),
            FieldValue::Text("C-1".to_owned()),
            FieldValue::Text("Abarrotes Lupita".to_owned()),
            FieldValue::Text("XAXX010101000".to_owned()),
        ])
        .row(vec![
            FieldValue::Integer(2),
            FieldValue::Text("C-2".to_owned()),
            FieldValue::Text("Ferreteria Norte".to_owned()),
            FieldValue::Text("FENO800101AB1".to_owned()),
        ])
    }

    fn addresses() -> MemoryTable {
        MemoryTable::new(&[
            ("CLIENTID", ColumnType::Numeric),
            ("STREET", ColumnType::Character),
            ("CITY", ColumnType::Character),
        ])
        .row(vec![
            FieldValue::Integer(1),
            FieldValue::Text("Hidalgo 12".to_owned()),
            FieldValue::Text("Puebla".to_owned()),
        ])
        .row(vec![
            FieldValue::Integer(2),
            FieldValue::Text("Juarez 3".to_owned()),
            FieldValue::Text("Tlaxcala".to_owned()),
        ])
        .row(vec![
            FieldValue::Integer(1),
            FieldValue::Text("Reforma 200".to_owned()),
            FieldValue::Text("Puebla".to_owned()),
        ])
    }

    #[tokio::test]
    async fn documents_filtered_by_date_and_branch() {
        let catalog = catalog(
            "documents = \"/mem/docs.dbf\"",
            MemoryTableSource::new().with_table("/mem/docs.dbf", documents()),
        );
        let cancel = CancellationToken::new();
        let numbers = |records: Vec<DocumentRecord>| {
            records
                .into_iter()
                .map(|record| record.document_number)
                .collect::<Vec<_>>()
        };

        let records = catalog
            .documents_by_date_and_branch(date(), Some("centro"), &cancel)
            .await
            .unwrap();
        assert_eq!(numbers(records), vec!["D-1", "D-4"]);

        let records = catalog.documents_by_date_and_branch(date(), None, &cancel).await.unwrap();
        assert_eq!(numbers(records), vec!["D-1", "D-3", "D-4"]);
    }

    #[tokio::test]
    async fn unconfigured_table_is_empty() {
        let catalog = catalog("", MemoryTableSource::new());
        let cancel = CancellationToken::new();
        assert!(catalog
            .documents_by_date_and_branch(date(), None, &cancel)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(catalog.product_by_code("100", &cancel).await.unwrap(), None);
        assert!(catalog.sample(LegacyTableKind::Products, 5).await.unwrap().is_empty());
        assert!(catalog.diagnose(LegacyTableKind::Products).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn configured_missing_table_is_an_error() {
        let catalog = catalog("cash_cuts = \"/mem/cuts.dbf\"", MemoryTableSource::new());
        let result = catalog
            .cash_cuts_by_date_and_branch(date(), None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LegacyError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn cash_cuts_expose_references() {
        let packed = "1234567890          FGIFS                 4821";
        let cuts = MemoryTable::new(&[
            ("REGISTER", ColumnType::Character),
            ("CUTDATE", ColumnType::Date),
            ("INVOICES", ColumnType::Character),
            ("RETURNS", ColumnType::Character),
        ])
        .row(vec![
            FieldValue::Text("R1".to_owned()),
            FieldValue::Date(date()),
            FieldValue::Text(packed.to_owned()),
            FieldValue::Null,
        ]);
        let catalog = catalog(
            "cash_cuts = \"/mem/cuts.dbf\"",
            MemoryTableSource::new().with_table("/mem/cuts.dbf", cuts),
        );
        let records = catalog
            .cash_cuts_by_date_and_branch(date(), Some("CENTRO"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_references()[0].folio, "4821");
        assert!(records[0].return_references().is_empty());
    }

    #[tokio::test]
    async fn product_lookup_and_search() {
        let catalog = catalog(
            "products = \"/mem/products.dbf\"",
            MemoryTableSource::new().with_table("/mem/products.dbf", products()),
        );
        let cancel = CancellationToken::new();

        let product = catalog.product_by_code(" 100 ", &cancel).await.unwrap().unwrap();
        assert_eq!(product.name, "Agua 1l");
        assert_eq!(catalog.product_by_code("  ", &cancel).await.unwrap(), None);

        let found = catalog.search_products("100", MatchMode::Fuzzy, &cancel).await.unwrap();
        let codes = found.iter().map(|product| product.code.as_str()).collect::<Vec<_>>();
        assert_eq!(codes, vec!["51005", "100"]);

        let found = catalog.search_products("100", MatchMode::Exact, &cancel).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "100");

        let limited = catalog.clone().with_search_limit(1);
        let found = limited.search_products("a", MatchMode::Fuzzy, &cancel).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn search_clients_attaches_addresses() {
        let catalog = catalog(
            "clients = \"/mem/clients.dbf\"\nclient_addresses = \"/mem/addr.dbf\"",
            MemoryTableSource::new()
                .with_table("/mem/clients.dbf", clients())
                .with_table("/mem/addr.dbf", addresses()),
        );
        let found = catalog
            .search_clients("lupita", MatchMode::Fuzzy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let streets = found[0]
            .addresses
            .iter()
            .map(|address| address.street.as_str())
            .collect::<Vec<_>>();
        assert_eq!(streets, vec!["Hidalgo 12", "Reforma 200"]);
    }

    #[tokio::test]
    async fn search_clients_without_address_file() {
        let catalog = catalog(
            "clients = \"/mem/clients.dbf\"\nclient_addresses = \"/mem/addr.dbf\"",
            MemoryTableSource::new().with_table("/mem/clients.dbf", clients()),
        );
        let found = catalog
            .search_clients("C-", MatchMode::Fuzzy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|client| client.addresses.is_empty()));
    }

    #[tokio::test]
    async fn blank_search_term_skips_table() {
        let catalog = catalog("clients = \"/mem/clients.dbf\"", MemoryTableSource::new());
        let found = catalog
            .search_clients("   ", MatchMode::Fuzzy, &CancellationToken::new())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn cancelled_call_returns_cancelled() {
        let catalog = catalog(
            "documents = \"/mem/docs.dbf\"",
            MemoryTableSource::new().with_table("/mem/docs.dbf", documents()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = catalog.documents_by_date_and_branch(date(), None, &cancel).await;
        assert!(matches!(result, Err(LegacyError::Cancelled)));
    }

    #[tokio::test]
    async fn diagnose_and_sample_configured_table() {
        let catalog = catalog(
            "products = \"/mem/products.dbf\"",
            MemoryTableSource::new().with_table("/mem/products.dbf", products()),
        );
        let report = catalog.diagnose(LegacyTableKind::Products).await.unwrap().unwrap();
        assert!(report.opened_ok);
        assert!(report.missing_columns.is_empty());
        assert_eq!(report.expected_columns.len(), 4);

        let rows = catalog.sample(LegacyTableKind::Products, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["CODE"], Value::String("51005".to_owned()));
    }
}
