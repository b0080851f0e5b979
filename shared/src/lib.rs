use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color category of an inspected batch.
///
/// Used both as a record field and as the partition key for the spreadsheet export,
/// where each variant becomes a sheet named after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorCode {
    Black,
    Blue,
    Violet,
    Orange,
    Yellow,
    Green,
}

impl ColorCode {
    /// Every color category, in picker and export sheet order
    pub const ALL: [ColorCode; 6] = [
        ColorCode::Black,
        ColorCode::Blue,
        ColorCode::Violet,
        ColorCode::Orange,
        ColorCode::Yellow,
        ColorCode::Green,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorCode::Black => "Black",
            ColorCode::Blue => "Blue",
            ColorCode::Violet => "Violet",
            ColorCode::Orange => "Orange",
            ColorCode::Yellow => "Yellow",
            ColorCode::Green => "Green",
        }
    }
}

impl fmt::Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("Invalid color code: {}", s))
    }
}

/// Outcome of an inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Passed,
    Rework,
}

impl Disposition {
    pub const ALL: [Disposition; 2] = [Disposition::Passed, Disposition::Rework];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Passed => "Passed",
            Disposition::Rework => "Rework",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Disposition::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("Invalid disposition: {}", s))
    }
}

/// One color-quality inspection entry, without its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub color_code: ColorCode,
    /// Calendar date as entered, normally `YYYY-MM-DD`
    pub date: String,
    pub tank: String,
    pub batch: String,
    /// Total solids content in percent
    pub tsc: f64,
    /// Viscosity in CPS
    pub viscosity: f64,
    pub dl: f64,
    pub da: f64,
    pub db: f64,
    /// Strength sum in percent
    pub strength: f64,
    pub disposition: Disposition,
    pub remarks: String,
    pub batch_pigment: String,
    pub adjustments: String,
    /// Always the color code's name when the record comes from a form
    pub color_group: String,
}

/// A record as persisted, carrying the identifier the store assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: QualityRecord,
}

impl StoredRecord {
    /// Cell values in table column order, id first
    pub fn to_row(&self) -> Vec<FieldValue> {
        let r = &self.record;
        vec![
            FieldValue::Integer(self.id),
            FieldValue::Text(r.color_code.to_string()),
            FieldValue::Text(r.date.clone()),
            FieldValue::Text(r.tank.clone()),
            FieldValue::Text(r.batch.clone()),
            FieldValue::Real(r.tsc),
            FieldValue::Real(r.viscosity),
            FieldValue::Real(r.dl),
            FieldValue::Real(r.da),
            FieldValue::Real(r.db),
            FieldValue::Real(r.strength),
            FieldValue::Text(r.disposition.to_string()),
            FieldValue::Text(r.remarks.clone()),
            FieldValue::Text(r.batch_pigment.clone()),
            FieldValue::Text(r.adjustments.clone()),
            FieldValue::Text(r.color_group.clone()),
        ]
    }
}

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
}

/// The columns of the `quality_data` table, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Id,
    ColorCode,
    Date,
    Tank,
    Batch,
    Tsc,
    Viscosity,
    Dl,
    Da,
    Db,
    Strength,
    Disposition,
    Remarks,
    BatchPigment,
    Adjustments,
    ColorGroup,
}

impl RecordField {
    pub const ALL: [RecordField; 16] = [
        RecordField::Id,
        RecordField::ColorCode,
        RecordField::Date,
        RecordField::Tank,
        RecordField::Batch,
        RecordField::Tsc,
        RecordField::Viscosity,
        RecordField::Dl,
        RecordField::Da,
        RecordField::Db,
        RecordField::Strength,
        RecordField::Disposition,
        RecordField::Remarks,
        RecordField::BatchPigment,
        RecordField::Adjustments,
        RecordField::ColorGroup,
    ];

    /// Column name in the `quality_data` table
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::Id => "id",
            RecordField::ColorCode => "color_code",
            RecordField::Date => "date",
            RecordField::Tank => "tank",
            RecordField::Batch => "batch",
            RecordField::Tsc => "tsc",
            RecordField::Viscosity => "viscosity",
            RecordField::Dl => "dl",
            RecordField::Da => "da",
            RecordField::Db => "db",
            RecordField::Strength => "strength",
            RecordField::Disposition => "disposition",
            RecordField::Remarks => "remarks",
            RecordField::BatchPigment => "batch_pigment",
            RecordField::Adjustments => "adjustments",
            RecordField::ColorGroup => "color_group",
        }
    }

    /// Column header used in the spreadsheet report
    pub fn label(&self) -> &'static str {
        match self {
            RecordField::Id => "ID",
            RecordField::ColorCode => "Color Code",
            RecordField::Date => "Date",
            RecordField::Tank => "Tank",
            RecordField::Batch => "Batch",
            RecordField::Tsc => "TSC",
            RecordField::Viscosity => "Viscosity",
            RecordField::Dl => "dL",
            RecordField::Da => "da",
            RecordField::Db => "db",
            RecordField::Strength => "Strength",
            RecordField::Disposition => "Disposition",
            RecordField::Remarks => "Remarks",
            RecordField::BatchPigment => "Batch Pigment",
            RecordField::Adjustments => "Adjustments",
            RecordField::ColorGroup => "Color Group",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            RecordField::Id => FieldKind::Integer,
            RecordField::Tsc
            | RecordField::Viscosity
            | RecordField::Dl
            | RecordField::Da
            | RecordField::Db
            | RecordField::Strength => FieldKind::Real,
            _ => FieldKind::Text,
        }
    }
}

/// A single cell or comparison value.
///
/// Untagged in JSON: `1` is an integer, `1.5` a real, `"x"` text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<ColorCode> for FieldValue {
    fn from(value: ColorCode) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Disposition> for FieldValue {
    fn from(value: Disposition) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Comparison applied to one column.
///
/// JSON form is externally tagged: `{"eq": "Black"}`, `{"between": [40, 50]}`,
/// `{"contains": "pigment"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq(FieldValue),
    Ne(FieldValue),
    Lt(FieldValue),
    Le(FieldValue),
    Gt(FieldValue),
    Ge(FieldValue),
    /// Inclusive on both ends
    Between(FieldValue, FieldValue),
    /// Substring match, text columns only
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCondition {
    pub field: RecordField,
    pub comparison: Comparison,
}

/// Structured search predicate: every condition must hold.
///
/// An empty criteria matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub conditions: Vec<SearchCondition>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, ANDed with the existing ones
    pub fn and(mut self, field: RecordField, comparison: Comparison) -> Self {
        self.conditions.push(SearchCondition { field, comparison });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Parse a free-text measurement, substituting zero for blank or unparseable input.
///
/// Data entry must never block on a typo, so this never fails. Infinities and NaN
/// count as unparseable: they cannot be stored or written to a numeric cell.
pub fn parse_measurement(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Today's local date in the form's `YYYY-MM-DD` format
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Raw input collected by a data-entry form.
///
/// Measurements arrive as typed text; enumerations are already constrained by the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityForm {
    pub color_code: ColorCode,
    /// Blank means today
    pub date: String,
    pub tank: String,
    pub batch: String,
    pub tsc: String,
    pub viscosity: String,
    pub dl: String,
    pub da: String,
    pub db: String,
    pub strength: String,
    pub disposition: Disposition,
    pub remarks: String,
    pub batch_pigment: String,
    pub adjustments: String,
}

impl Default for QualityForm {
    fn default() -> Self {
        Self {
            color_code: ColorCode::Black,
            date: String::new(),
            tank: String::new(),
            batch: String::new(),
            tsc: String::new(),
            viscosity: String::new(),
            dl: String::new(),
            da: String::new(),
            db: String::new(),
            strength: String::new(),
            disposition: Disposition::Passed,
            remarks: String::new(),
            batch_pigment: String::new(),
            adjustments: String::new(),
        }
    }
}

impl QualityForm {
    /// Build the record to persist. The color group is derived from the color code.
    pub fn into_record(self) -> QualityRecord {
        let date = if self.date.trim().is_empty() {
            today()
        } else {
            self.date
        };

        QualityRecord {
            color_code: self.color_code,
            date,
            tank: self.tank,
            batch: self.batch,
            tsc: parse_measurement(&self.tsc),
            viscosity: parse_measurement(&self.viscosity),
            dl: parse_measurement(&self.dl),
            da: parse_measurement(&self.da),
            db: parse_measurement(&self.db),
            strength: parse_measurement(&self.strength),
            disposition: self.disposition,
            remarks: self.remarks,
            batch_pigment: self.batch_pigment,
            adjustments: self.adjustments,
            color_group: self.color_code.to_string(),
        }
    }
}

/// Choices and defaults a form needs to render its pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormOptions {
    pub color_codes: Vec<ColorCode>,
    pub dispositions: Vec<Disposition>,
    pub default_color_code: ColorCode,
    pub default_disposition: Disposition,
    pub default_date: String,
}

impl FormOptions {
    pub fn current() -> Self {
        Self {
            color_codes: ColorCode::ALL.to_vec(),
            dispositions: Disposition::ALL.to_vec(),
            default_color_code: ColorCode::Black,
            default_disposition: Disposition::Passed,
            default_date: today(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordListResponse {
    pub records: Vec<StoredRecord>,
    pub count: usize,
}

impl From<Vec<StoredRecord>> for RecordListResponse {
    fn from(records: Vec<StoredRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecordResponse {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecordResponse {
    pub id: i64,
    /// False when no record had this id
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRecordResponse {
    pub id: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Output file; the configured report path when absent
    #[serde(default)]
    pub path: Option<String>,
}

/// Row count of one generated sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSummary {
    pub color_code: ColorCode,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub file_path: String,
    /// Only non-empty categories, in color code order
    pub sheets: Vec<SheetSummary>,
    pub total_rows: usize,
}
