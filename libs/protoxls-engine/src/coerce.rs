use std::collections::HashMap;
use std::sync::Arc;

use protoxls_api::{EnumValue, FieldKind, FieldSchema, MessageSchema, MessageValue, Value};

/// Separator between a nested message's column prefix and its field column.
pub const COLUMN_SEPARATOR: char = '.';
/// Separator inside a single-cell array.
pub const ARRAY_SEPARATOR: char = ',';

// ════════════════════════════════════════════════════════════════
//  Errors
// ════════════════════════════════════════════════════════════════

/// Cell-level failure. Row and column are 1-based spreadsheet coordinates.
#[derive(Debug, thiserror::Error)]
pub enum CoerceError {
    #[error("column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("invalid {expected} format at row {row}, column {col} ({column}): {value}")]
    InvalidCell {
        row: usize,
        col: usize,
        column: String,
        expected: TypeClass,
        value: String,
    },

    #[error("failed to convert value at row {row}, column {col} ({column}): {detail}")]
    Conversion {
        row: usize,
        col: usize,
        column: String,
        detail: String,
    },

    #[error("enum value not found: {value} for field {field} (row {row}, column {col}, {column})")]
    EnumNotFound {
        row: usize,
        col: usize,
        column: String,
        value: String,
        field: String,
    },

    #[error("column {column}: message-typed array cannot be read from a delimited cell")]
    UnsupportedArray { column: String },
}

// ════════════════════════════════════════════════════════════════
//  Type Class
// ════════════════════════════════════════════════════════════════

/// Shape check applied to a cell before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    Boolean,
    Unconstrained,
}

impl TypeClass {
    pub fn of(kind: &FieldKind) -> Self {
        match kind {
            k if k.is_numeric() => TypeClass::Numeric,
            FieldKind::Bool => TypeClass::Boolean,
            _ => TypeClass::Unconstrained,
        }
    }

    pub fn accepts(self, text: &str) -> bool {
        match self {
            TypeClass::Numeric => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
            TypeClass::Boolean => parse_bool(text).is_some(),
            TypeClass::Unconstrained => true,
        }
    }
}

impl std::fmt::Display for TypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeClass::Numeric => write!(f, "number"),
            TypeClass::Boolean => write!(f, "boolean"),
            TypeClass::Unconstrained => write!(f, "string"),
        }
    }
}

/// `1|true` and `0|false`, case-insensitive, surrounding whitespace ignored.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════
//  Header / Row
// ════════════════════════════════════════════════════════════════

/// Column name → 0-based column index, from the sheet's first row.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    /// Blank header cells are ignored; a repeated name maps to its last
    /// occurrence.
    pub fn from_row(row: &[String]) -> Self {
        let columns = row
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }

    /// Whether any column name starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.columns.keys().any(|c| c.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One data row together with its header and sheet position.
#[derive(Debug, Clone, Copy)]
pub struct RowCells<'a> {
    pub header: &'a HeaderMap,
    pub cells: &'a [String],
    /// 1-based sheet row number.
    pub row: usize,
}

impl<'a> RowCells<'a> {
    pub fn new(header: &'a HeaderMap, cells: &'a [String], row: usize) -> Self {
        Self { header, cells, row }
    }

    /// Cell text; cells past the end of a short row read as empty.
    fn cell(&self, col: usize) -> &'a str {
        self.cells.get(col).map(String::as_str).unwrap_or("")
    }

    fn at<'c>(&self, col: usize, column: &'c str) -> CellRef<'c> {
        CellRef {
            row: self.row,
            col: col + 1,
            column,
        }
    }
}

/// Location of one cell, for error reporting.
#[derive(Debug, Clone, Copy)]
struct CellRef<'c> {
    row: usize,
    col: usize,
    column: &'c str,
}

impl CellRef<'_> {
    fn conversion(&self, detail: impl Into<String>) -> CoerceError {
        CoerceError::Conversion {
            row: self.row,
            col: self.col,
            column: self.column.to_string(),
            detail: detail.into(),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Column names
// ════════════════════════════════════════════════════════════════

/// `column = override OR field name`, qualified by `prefix.` when nested.
pub fn column_name(field: &FieldSchema, prefix: &str) -> String {
    if prefix.is_empty() {
        field.column_name().to_string()
    } else {
        format!("{prefix}{COLUMN_SEPARATOR}{}", field.column_name())
    }
}

/// `name[index]`, 1-based.
pub fn element_column_name(column: &str, index: usize) -> String {
    format!("{column}[{index}]")
}

// ════════════════════════════════════════════════════════════════
//  Coercion
// ════════════════════════════════════════════════════════════════

/// Coerce every field of `schema` from one row.
///
/// `prefix` is empty for a top-level record and the resolved column name of
/// the enclosing field for nested messages.
pub fn coerce_message(
    schema: &Arc<MessageSchema>,
    row: &RowCells<'_>,
    prefix: &str,
) -> Result<MessageValue, CoerceError> {
    let mut builder = MessageValue::builder(schema.clone());
    for (idx, field) in schema.fields.iter().enumerate() {
        if let Some(value) = coerce_field(field, row, prefix)? {
            builder.set(idx, value);
        }
    }
    Ok(builder.build())
}

/// Coerce one field. `Ok(None)` means the field is absent for this row.
///
/// Map fields are not read from cells and always come back absent.
pub fn coerce_field(
    field: &FieldSchema,
    row: &RowCells<'_>,
    prefix: &str,
) -> Result<Option<Value>, CoerceError> {
    if field.map {
        return Ok(None);
    }
    if field.repeated {
        coerce_repeated(field, row, prefix)
    } else {
        coerce_single(field, row, prefix)
    }
}

fn coerce_single(
    field: &FieldSchema,
    row: &RowCells<'_>,
    prefix: &str,
) -> Result<Option<Value>, CoerceError> {
    let column = column_name(field, prefix);

    if let FieldKind::Message(nested) = &field.kind {
        return coerce_nested(nested, row, &column);
    }

    let col = row
        .header
        .get(&column)
        .ok_or_else(|| CoerceError::ColumnNotFound { column: column.clone() })?;
    let text = row.cell(col);
    if text.is_empty() {
        return Ok(None);
    }
    coerce_cell(field, text, row.at(col, &column)).map(Some)
}

/// A nested message is read from the `column.` prefixed columns. It is
/// absent when no such column exists or none of its fields has a value.
fn coerce_nested(
    schema: &Arc<MessageSchema>,
    row: &RowCells<'_>,
    column: &str,
) -> Result<Option<Value>, CoerceError> {
    if !row.header.has_prefix(&format!("{column}{COLUMN_SEPARATOR}")) {
        return Ok(None);
    }
    let msg = coerce_message(schema, row, column)?;
    Ok((!msg.is_empty()).then_some(Value::Message(msg)))
}

/// Two column conventions, tried in order:
/// 1. one column named exactly `column`, cell split on `,`
/// 2. indexed columns `column[1]`, `column[2]`, ... until an index is absent
fn coerce_repeated(
    field: &FieldSchema,
    row: &RowCells<'_>,
    prefix: &str,
) -> Result<Option<Value>, CoerceError> {
    let column = column_name(field, prefix);
    let items = match row.header.get(&column) {
        Some(col) => coerce_delimited(field, row, col, &column)?,
        None => coerce_indexed(field, row, &column)?,
    };
    Ok((!items.is_empty()).then_some(Value::Array(items)))
}

fn coerce_delimited(
    field: &FieldSchema,
    row: &RowCells<'_>,
    col: usize,
    column: &str,
) -> Result<Vec<Value>, CoerceError> {
    let text = row.cell(col);
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if matches!(field.kind, FieldKind::Message(_)) {
        return Err(CoerceError::UnsupportedArray { column: column.to_string() });
    }

    let at = row.at(col, column);
    text.split(ARRAY_SEPARATOR)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| coerce_cell(field, piece, at))
        .collect()
}

fn coerce_indexed(
    field: &FieldSchema,
    row: &RowCells<'_>,
    column: &str,
) -> Result<Vec<Value>, CoerceError> {
    let mut items = Vec::new();
    for index in 1.. {
        let element = element_column_name(column, index);
        match &field.kind {
            FieldKind::Message(nested) => {
                if !row.header.has_prefix(&format!("{element}{COLUMN_SEPARATOR}")) {
                    break;
                }
                let msg = coerce_message(nested, row, &element)?;
                if !msg.is_empty() {
                    items.push(Value::Message(msg));
                }
            }
            _ => {
                let Some(col) = row.header.get(&element) else {
                    break;
                };
                let text = row.cell(col);
                if text.is_empty() {
                    continue;
                }
                items.push(coerce_cell(field, text, row.at(col, &element))?);
            }
        }
    }
    Ok(items)
}

/// Validate `text` against the field's type class, then convert it.
fn coerce_cell(field: &FieldSchema, text: &str, at: CellRef<'_>) -> Result<Value, CoerceError> {
    let class = TypeClass::of(&field.kind);
    if !class.accepts(text) {
        return Err(CoerceError::InvalidCell {
            row: at.row,
            col: at.col,
            column: at.column.to_string(),
            expected: class,
            value: text.to_string(),
        });
    }

    let trimmed = text.trim();
    let invalid = || at.conversion(format!("invalid {} value: {text}", field.kind));

    match &field.kind {
        FieldKind::Int32 => trimmed.parse::<i32>().map(|n| Value::Integer(n as i64)).map_err(|_| invalid()),
        FieldKind::Int64 => trimmed.parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
        FieldKind::UInt32 => trimmed.parse::<u32>().map(|n| Value::Integer(n as i64)).map_err(|_| invalid()),
        FieldKind::UInt64 => {
            let n = trimmed.parse::<u64>().map_err(|_| invalid())?;
            i64::try_from(n)
                .map(Value::Integer)
                .map_err(|_| at.conversion(format!("uint64 value out of supported range: {text}")))
        }
        FieldKind::Float => {
            let f = trimmed.parse::<f64>().map_err(|_| invalid())?;
            if !(f as f32).is_finite() {
                return Err(at.conversion(format!("float value out of range: {text}")));
            }
            Ok(Value::Float(f))
        }
        FieldKind::Double => trimmed.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        FieldKind::Bool => parse_bool(text).map(Value::Bool).ok_or_else(invalid),
        FieldKind::String | FieldKind::Bytes => Ok(Value::Text(text.to_string())),
        FieldKind::Enum(enum_type) => match enum_type.resolve(text) {
            Some(number) => Ok(Value::Enum(EnumValue {
                number,
                enum_type: enum_type.clone(),
            })),
            None => Err(CoerceError::EnumNotFound {
                row: at.row,
                col: at.col,
                column: at.column.to_string(),
                value: text.to_string(),
                field: field.name.clone(),
            }),
        },
        FieldKind::Message(_) => Err(at.conversion("message field has no single-cell form")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoxls_api::{EnumMember, EnumSchema};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    /// Coerce `schema` from a one-row sheet given as header + cells.
    fn coerce(
        schema: &Arc<MessageSchema>,
        header: &[&str],
        cells: &[&str],
    ) -> Result<MessageValue, CoerceError> {
        let header = HeaderMap::from_row(&strings(header));
        let cells = strings(cells);
        coerce_message(schema, &RowCells::new(&header, &cells, 2), "")
    }

    fn color() -> Arc<EnumSchema> {
        Arc::new(EnumSchema {
            name: "Color".into(),
            full_name: "game.Color".into(),
            members: vec![
                EnumMember { name: "RED".into(), number: 1, alias: Some("红".into()) },
                EnumMember { name: "GREEN".into(), number: 2, alias: None },
            ],
        })
    }

    fn scalars() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            "game.Scalars",
            vec![
                FieldSchema::new("i32", 1, FieldKind::Int32),
                FieldSchema::new("i64", 2, FieldKind::Int64),
                FieldSchema::new("u32", 3, FieldKind::UInt32),
                FieldSchema::new("u64", 4, FieldKind::UInt64),
                FieldSchema::new("f", 5, FieldKind::Float),
                FieldSchema::new("d", 6, FieldKind::Double),
                FieldSchema::new("b", 7, FieldKind::Bool),
                FieldSchema::new("s", 8, FieldKind::String),
                FieldSchema::new("color", 9, FieldKind::Enum(color())),
            ],
        ))
    }

    const SCALAR_HEADER: [&str; 9] = ["i32", "i64", "u32", "u64", "f", "d", "b", "s", "color"];

    #[test]
    fn converts_every_scalar_kind() {
        let msg = coerce(
            &scalars(),
            &SCALAR_HEADER,
            &["-7", "9000000000", "4000000000", "12", "1.5", "0.1", "TRUE", "Sword", "GREEN"],
        )
        .unwrap();

        assert_eq!(msg.get("i32"), Some(&Value::Integer(-7)));
        assert_eq!(msg.get("i64"), Some(&Value::Integer(9_000_000_000)));
        assert_eq!(msg.get("u32"), Some(&Value::Integer(4_000_000_000)));
        assert_eq!(msg.get("u64"), Some(&Value::Integer(12)));
        assert_eq!(msg.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(msg.get("d"), Some(&Value::Float(0.1)));
        assert_eq!(msg.get("b"), Some(&Value::Bool(true)));
        assert_eq!(msg.get("s"), Some(&Value::Text("Sword".into())));
        match msg.get("color") {
            Some(Value::Enum(e)) => assert_eq!(e.number, 2),
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn empty_cells_are_omitted() {
        let msg = coerce(&scalars(), &SCALAR_HEADER, &["1", "", "", "", "", "", "", "", ""]).unwrap();
        assert_eq!(msg.len(), 1);
        assert_eq!(msg.get("i32"), Some(&Value::Integer(1)));
    }

    #[test]
    fn short_rows_read_as_empty() {
        let msg = coerce(&scalars(), &SCALAR_HEADER, &["5"]).unwrap();
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn boolean_literals() {
        let schema = Arc::new(MessageSchema::new(
            "t.B",
            vec![FieldSchema::new("b", 1, FieldKind::Bool)],
        ));
        for (text, expected) in [("1", true), ("0", false), ("true", true), ("FALSE", false), ("True", true)] {
            let msg = coerce(&schema, &["b"], &[text]).unwrap();
            assert_eq!(msg.get("b"), Some(&Value::Bool(expected)), "{text}");
        }
        let err = coerce(&schema, &["b"], &["yes"]).unwrap_err();
        assert!(
            matches!(err, CoerceError::InvalidCell { expected: TypeClass::Boolean, row: 2, col: 1, .. }),
            "{err}"
        );
    }

    #[test]
    fn numeric_validation_names_expected_class() {
        let err = coerce(&scalars(), &SCALAR_HEADER, &["abc"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid number format"), "{msg}");
        assert!(msg.contains("row 2, column 1 (i32)"), "{msg}");
    }

    #[test]
    fn integer_width_is_enforced() {
        let err = coerce(&scalars(), &SCALAR_HEADER, &["3000000000"]).unwrap_err();
        assert!(matches!(err, CoerceError::Conversion { col: 1, .. }), "{err}");

        let err = coerce(&scalars(), &SCALAR_HEADER, &["1.5"]).unwrap_err();
        assert!(matches!(err, CoerceError::Conversion { .. }), "{err}");

        let err = coerce(&scalars(), &SCALAR_HEADER, &["", "", "-1"]).unwrap_err();
        assert!(matches!(err, CoerceError::Conversion { col: 3, .. }), "{err}");

        let err = coerce(&scalars(), &SCALAR_HEADER, &["", "", "", "18446744073709551615"]).unwrap_err();
        assert!(matches!(err, CoerceError::Conversion { col: 4, .. }), "{err}");
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for text in ["inf", "NaN", "-infinity"] {
            let err = coerce(&scalars(), &SCALAR_HEADER, &["", "", "", "", "", text]).unwrap_err();
            assert!(matches!(err, CoerceError::InvalidCell { .. }), "{text}: {err}");
        }
        let err = coerce(&scalars(), &SCALAR_HEADER, &["", "", "", "", "1e300"]).unwrap_err();
        assert!(matches!(err, CoerceError::Conversion { col: 5, .. }), "{err}");
    }

    #[test]
    fn enum_matches_name_or_alias_case_sensitively() {
        let header = ["color"];
        let schema = Arc::new(MessageSchema::new(
            "t.E",
            vec![FieldSchema::new("color", 1, FieldKind::Enum(color()))],
        ));
        let msg = coerce(&schema, &header, &["红"]).unwrap();
        assert!(matches!(msg.get("color"), Some(Value::Enum(e)) if e.number == 1));

        let err = coerce(&schema, &header, &["red"]).unwrap_err();
        assert!(matches!(err, CoerceError::EnumNotFound { .. }));

        let err = coerce(&schema, &header, &["BLUE"]).unwrap_err();
        assert!(
            err.to_string().starts_with("enum value not found: BLUE for field color"),
            "{err}"
        );
    }

    #[test]
    fn missing_scalar_column_is_an_error() {
        let err = coerce(&scalars(), &["i32"], &["1"]).unwrap_err();
        assert!(matches!(err, CoerceError::ColumnNotFound { ref column } if column == "i64"), "{err}");
    }

    #[test]
    fn column_override_is_used() {
        let schema = Arc::new(MessageSchema::new(
            "t.O",
            vec![FieldSchema::new("hp", 1, FieldKind::Int32).with_column("Health")],
        ));
        let msg = coerce(&schema, &["Health"], &["30"]).unwrap();
        assert_eq!(msg.get("hp"), Some(&Value::Integer(30)));
    }

    fn tags() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            "t.Tags",
            vec![
                FieldSchema::new("tags", 1, FieldKind::String).repeated(),
                FieldSchema::new("score", 2, FieldKind::Int32).repeated(),
            ],
        ))
    }

    #[test]
    fn delimited_array_is_split_and_trimmed() {
        let msg = coerce(&tags(), &["tags", "score"], &["fire, sharp,,", "1,2"]).unwrap();
        assert_eq!(
            msg.get("tags"),
            Some(&Value::Array(vec![Value::Text("fire".into()), Value::Text("sharp".into())]))
        );
        assert_eq!(
            msg.get("score"),
            Some(&Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );
    }

    #[test]
    fn empty_delimited_cell_omits_the_array() {
        let msg = coerce(&tags(), &["tags", "score"], &["", ""]).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn indexed_columns_are_probed_until_absent() {
        let msg = coerce(
            &tags(),
            &["score[1]", "score[2]", "score[4]"],
            &["10", "20", "40"],
        )
        .unwrap();
        assert_eq!(
            msg.get("score"),
            Some(&Value::Array(vec![Value::Integer(10), Value::Integer(20)]))
        );
        assert_eq!(msg.get("tags"), None);
    }

    #[test]
    fn indexed_gaps_are_skipped() {
        let msg = coerce(&tags(), &["score[1]", "score[2]", "score[3]"], &["10", "", "30"]).unwrap();
        assert_eq!(
            msg.get("score"),
            Some(&Value::Array(vec![Value::Integer(10), Value::Integer(30)]))
        );
    }

    #[test]
    fn exact_column_takes_priority_over_indexed() {
        let msg = coerce(&tags(), &["score", "score[1]"], &["5", "99"]).unwrap();
        assert_eq!(msg.get("score"), Some(&Value::Array(vec![Value::Integer(5)])));
    }

    #[test]
    fn bad_array_element_is_a_hard_error() {
        let err = coerce(&tags(), &["score"], &["1,x,3"]).unwrap_err();
        assert!(matches!(err, CoerceError::InvalidCell { ref value, .. } if value == "x"), "{err}");

        let err = coerce(&tags(), &["score[1]", "score[2]"], &["1", "y"]).unwrap_err();
        assert!(
            matches!(err, CoerceError::InvalidCell { ref column, col: 2, .. } if column == "score[2]"),
            "{err}"
        );
    }

    fn stats() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            "t.Stats",
            vec![
                FieldSchema::new("attack", 1, FieldKind::Int32),
                FieldSchema::new("defense", 2, FieldKind::Int32),
            ],
        ))
    }

    fn hero() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            "t.Hero",
            vec![
                FieldSchema::new("id", 1, FieldKind::Int32),
                FieldSchema::new("props", 2, FieldKind::Message(stats())),
                FieldSchema::new("levels", 3, FieldKind::Message(stats())).repeated(),
            ],
        ))
    }

    #[test]
    fn nested_message_uses_column_prefix() {
        let msg = coerce(
            &hero(),
            &["id", "props.attack", "props.defense"],
            &["1", "10", "5"],
        )
        .unwrap();
        let Some(Value::Message(props)) = msg.get("props") else {
            panic!("props missing");
        };
        assert_eq!(props.get("attack"), Some(&Value::Integer(10)));
        assert_eq!(props.get("defense"), Some(&Value::Integer(5)));
        assert_eq!(msg.get("levels"), None);
    }

    #[test]
    fn nested_message_absent_without_columns_or_values() {
        let msg = coerce(&hero(), &["id"], &["1"]).unwrap();
        assert_eq!(msg.get("props"), None);

        let msg = coerce(&hero(), &["id", "props.attack", "props.defense"], &["1", "", ""]).unwrap();
        assert_eq!(msg.get("props"), None);
    }

    #[test]
    fn nested_message_requires_all_sub_columns() {
        let err = coerce(&hero(), &["id", "props.attack"], &["1", "3"]).unwrap_err();
        assert!(
            matches!(err, CoerceError::ColumnNotFound { ref column } if column == "props.defense"),
            "{err}"
        );
    }

    #[test]
    fn indexed_message_array() {
        let msg = coerce(
            &hero(),
            &[
                "id",
                "levels[1].attack",
                "levels[1].defense",
                "levels[2].attack",
                "levels[2].defense",
            ],
            &["1", "1", "2", "3", "4"],
        )
        .unwrap();
        let Some(Value::Array(levels)) = msg.get("levels") else {
            panic!("levels missing");
        };
        assert_eq!(levels.len(), 2);
        let Value::Message(second) = &levels[1] else {
            panic!("expected message element");
        };
        assert_eq!(second.get("attack"), Some(&Value::Integer(3)));
        assert_eq!(second.get("defense"), Some(&Value::Integer(4)));
    }

    #[test]
    fn indexed_elements_found_through_nested_columns() {
        let slot = Arc::new(MessageSchema::new(
            "t.Slot",
            vec![FieldSchema::new("stats", 1, FieldKind::Message(stats()))],
        ));
        let loot = Arc::new(MessageSchema::new(
            "t.Loot",
            vec![FieldSchema::new("items", 1, FieldKind::Message(slot)).repeated()],
        ));
        let msg = coerce(
            &loot,
            &[
                "items[1].stats.attack",
                "items[1].stats.defense",
                "items[2].stats.attack",
                "items[2].stats.defense",
            ],
            &["1", "2", "3", "4"],
        )
        .unwrap();

        let Some(Value::Array(items)) = msg.get("items") else {
            panic!("items missing");
        };
        assert_eq!(items.len(), 2);
        let Value::Message(second) = &items[1] else {
            panic!("expected message element");
        };
        let Some(Value::Message(stats)) = second.get("stats") else {
            panic!("stats missing");
        };
        assert_eq!(stats.get("defense"), Some(&Value::Integer(4)));
    }

    #[test]
    fn delimited_message_array_is_rejected() {
        let err = coerce(&hero(), &["id", "levels"], &["1", "a,b"]).unwrap_err();
        assert!(matches!(err, CoerceError::UnsupportedArray { .. }));
    }

    #[test]
    fn map_fields_are_skipped() {
        let mut field = FieldSchema::new("attrs", 1, FieldKind::Message(stats()));
        field.map = true;
        field.repeated = true;
        let schema = Arc::new(MessageSchema::new("t.M", vec![field]));
        let msg = coerce(&schema, &["attrs"], &["whatever"]).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn header_map_trims_and_ignores_blanks() {
        let header = HeaderMap::from_row(&strings(&[" id ", "", "name", "id"]));
        assert_eq!(header.len(), 2);
        assert_eq!(header.get("id"), Some(3));
        assert_eq!(header.get("name"), Some(2));
        assert!(header.has_prefix("na"));
        assert!(!header.has_prefix("x"));
    }
}
