//! Typed records produced from legacy table rows, one per logical table.
use crate::error::LegacyError;
use crate::reference::parse_references;
use crate::reference::DocumentReference;
use crate::table::accessor::Row;
use chrono::NaiveDate;
use serde::Serialize;

/// Column names used by the legacy tables.
pub mod columns {
    pub const ID: &str = "ID";
    pub const CODE: &str = "CODE";
    pub const NAME: &str = "NAME";
    pub const BRANCH: &str = "BRANCH";

    // Products
    pub const PRICE: &str = "PRICE";
    pub const TAX_RATE: &str = "TAXRATE";

    // Documents
    pub const DOCUMENT_NUMBER: &str = "DOCNUM";
    pub const DATE: &str = "DATE";
    pub const TOTAL: &str = "TOTAL";
    pub const SERIES: &str = "SERIES";
    pub const FOLIO: &str = "FOLIO";
    pub const NOTES: &str = "NOTES";

    // Cash cuts
    pub const REGISTER: &str = "REGISTER";
    pub const CUT_DATE: &str = "CUTDATE";
    pub const INVOICES: &str = "INVOICES";
    pub const RETURNS: &str = "RETURNS";

    // Clients
    pub const TAX_ID: &str = "TAXID";
    pub const EMAIL: &str = "EMAIL";
    pub const PAYMENT_METHOD: &str = "PAYMETHOD";

    // Client addresses
    pub const CLIENT_ID: &str = "CLIENTID";
    pub const STREET: &str = "STREET";
    pub const CITY: &str = "CITY";
    pub const STATE: &str = "STATE";
    pub const ZIP_CODE: &str = "ZIPCODE";
}

/// Fails the row when a key column is blank.
fn required(row: &Row<'_>, column: &str) -> Result<String, LegacyError> {
    let value = row.string(column)?;
    if value.is_empty() {
        Err(LegacyError::RowDecode {
            row: row.number(),
            message: format!("blank {column}"),
        })
    } else {
        Ok(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub base_price: f64,
    pub tax_rate: f64,
}

impl TryFrom<&Row<'_>> for ProductRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(ProductRecord {
            code: required(row, columns::CODE)?,
            name: row.string(columns::NAME)?,
            base_price: row.decimal(columns::PRICE)?,
            tax_rate: row.decimal(columns::TAX_RATE)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub document_number: String,
    pub date: Option<NaiveDate>,
    pub total: f64,
    pub series: String,
    pub folio: String,
    /// Free-text column; older table revisions lack it
    pub free_text: String,
}

impl TryFrom<&Row<'_>> for DocumentRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(DocumentRecord {
            document_number: required(row, columns::DOCUMENT_NUMBER)?,
            date: row.date(columns::DATE)?,
            total: row.decimal(columns::TOTAL)?,
            series: row.string(columns::SERIES)?,
            folio: row.string(columns::FOLIO)?,
            free_text: row.optional_string(columns::NOTES)?,
        })
    }
}

/// Cash cut as stored: the covered documents are still packed text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CashCutRawRecord {
    pub register_id: String,
    pub cut_date: Option<NaiveDate>,
    pub raw_invoices_text: String,
    pub raw_returns_text: String,
}

impl CashCutRawRecord {
    /// Invoices covered by the cut
    pub fn invoice_references(&self) -> Vec<DocumentReference> {
        parse_references(Some(&self.raw_invoices_text))
    }

    /// Returns covered by the cut
    pub fn return_references(&self) -> Vec<DocumentReference> {
        parse_references(Some(&self.raw_returns_text))
    }
}

impl TryFrom<&Row<'_>> for CashCutRawRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        // Packed references depend on exact column offsets, so padding is kept.
        // An unreadable reference column fails the cut instead of emptying it
        let raw = |column: &str| -> Result<String, LegacyError> {
            if row.has_column(column) {
                Ok(row.checked_value(column)?.to_raw_text())
            } else {
                Ok(String::new())
            }
        };
        Ok(CashCutRawRecord {
            register_id: required(row, columns::REGISTER)?,
            cut_date: row.date(columns::CUT_DATE)?,
            raw_invoices_text: raw(columns::INVOICES)?,
            raw_returns_text: raw(columns::RETURNS)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegisterNameRecord {
    pub code: String,
    pub name: String,
}

impl TryFrom<&Row<'_>> for RegisterNameRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(RegisterNameRecord {
            code: required(row, columns::CODE)?,
            name: row.string(columns::NAME)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientAddressRecord {
    pub client_id: i32,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl TryFrom<&Row<'_>> for ClientAddressRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(ClientAddressRecord {
            client_id: row.int32(columns::CLIENT_ID)?,
            street: row.string(columns::STREET)?,
            city: row.string(columns::CITY)?,
            state: row.optional_string(columns::STATE)?,
            zip_code: row.optional_string(columns::ZIP_CODE)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientRecord {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub tax_id: String,
    pub email: String,
    pub payment_method: String,
    /// Filled from the address table when it is configured and present
    pub addresses: Vec<ClientAddressRecord>,
}

impl TryFrom<&Row<'_>> for ClientRecord {
    type Error = LegacyError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(ClientRecord {
            id: row.int32(columns::ID)?,
            code: required(row, columns::CODE)?,
            name: row.string(columns::NAME)?,
            tax_id: row.string(columns::TAX_ID)?,
            email: row.optional_string(columns::EMAIL)?,
            payment_method: row.optional_string(columns::PAYMENT_METHOD)?,
            addresses: Vec::new(),
        })
    }
}

/// Row filter for "by date and branch" retrievals.
/// The branch only narrows the result when the table carries a branch column.
#[derive(Clone, Debug)]
pub struct DateBranchFilter {
    pub date_column: &'static str,
    pub date: NaiveDate,
    pub branch: Option<String>,
}

impl DateBranchFilter {
    pub fn new(date_column: &'static str, date: NaiveDate, branch: Option<&str>) -> Self {
        Self {
            date_column,
            date,
            branch: branch.map(str::trim).filter(|branch| !branch.is_empty()).map(str::to_owned),
        }
    }

    pub fn accept(&self, row: &Row<'_>) -> Result<bool, LegacyError> {
        if row.date(self.date_column)? != Some(self.date) {
            return Ok(false);
        }
        match &self.branch {
            Some(branch) if row.has_column(columns::BRANCH) => {
                Ok(row.string(columns::BRANCH)?.to_lowercase() == branch.to_lowercase())
            }
            _ => Ok(true),
        }
    }
}
