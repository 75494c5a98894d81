//! Crow's-foot endpoint inference.
//!
//! Only uniqueness counts: a nullable unique column still yields `One`.

use crate::model::{Cardinality, Column, DbModel, ForeignKey, Table};

fn kind(column: &Column) -> Cardinality {
    if column.is_key() {
        Cardinality::One
    } else {
        Cardinality::Many
    }
}

/// `(start, end)` for a relationship from `from` to `to`.
pub fn infer(from: &Column, to: &Column) -> (Cardinality, Cardinality) {
    (kind(from), kind(to))
}

/// Endpoints to draw for `fk` declared on `table`: explicit values win,
/// missing ones are inferred. `None` when either endpoint column is unresolved.
pub fn endpoints(
    model: &DbModel,
    table: &Table,
    fk: &ForeignKey,
) -> Option<(Cardinality, Cardinality)> {
    let from = table.column(&fk.from_column_id)?;
    let to = model.table(&fk.to_table_id)?.column(&fk.to_column_id)?;
    let (start, end) = infer(from, to);
    Some((
        fk.start_cardinality.unwrap_or(start),
        fk.end_cardinality.unwrap_or(end),
    ))
}
