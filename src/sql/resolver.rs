//! Second pass: foreign keys and comments against the complete table index.

use super::grammar::QualifiedName;
use super::parser::{CommentDraft, CommentTarget, Drafts, ParseError, TableDraft};
use crate::id::new_id;
use crate::model::{DbModel, ForeignKey, MODEL_VERSION, Table};
use crate::naming::{build_constraint_name, ensure_unique, sanitize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub(crate) fn resolve(drafts: Drafts) -> Result<DbModel, ParseError> {
    let Drafts {
        schemas,
        types,
        tables: drafts,
        comments,
    } = drafts;

    let index: HashMap<&QualifiedName, usize> = drafts
        .iter()
        .enumerate()
        .map(|(i, d)| (&d.key, i))
        .collect();

    let mut resolved: Vec<Vec<ForeignKey>> = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        resolved.push(resolve_foreign_keys(draft, &drafts, &index)?);
    }

    let mut tables: Vec<Table> = drafts
        .iter()
        .zip(resolved)
        .map(|(draft, foreign_keys)| Table {
            foreign_keys,
            ..draft.table.clone()
        })
        .collect();

    for comment in comments {
        apply_comment(&mut tables, &index, comment)?;
    }

    Ok(DbModel {
        version: MODEL_VERSION,
        schemas,
        tables,
        types,
    })
}

fn resolve_foreign_keys(
    draft: &TableDraft,
    drafts: &[TableDraft],
    index: &HashMap<&QualifiedName, usize>,
) -> Result<Vec<ForeignKey>, ParseError> {
    let mut used: HashSet<String> = HashSet::new();
    let mut foreign_keys = Vec::with_capacity(draft.foreign_keys.len());

    for fk in &draft.foreign_keys {
        let missing = |target: String| ParseError::Reference {
            constraint: fk.name.clone(),
            target,
        };

        let from = draft
            .table
            .column_by_name(&fk.from_column)
            .ok_or_else(|| missing(format!("{}.{}", draft.key, fk.from_column)))?;
        let target_column = index
            .get(&fk.target)
            .map(|&i| &drafts[i].table)
            .and_then(|t| t.column_by_name(&fk.target_column).map(|c| (t, c)));
        let (target, to) =
            target_column.ok_or_else(|| missing(format!("{}.{}", fk.target, fk.target_column)))?;

        let fallback = build_constraint_name(&[draft.key.name.as_str(), fk.from_column.as_str(), "fkey"], "fk");
        let name = ensure_unique(&sanitize(&fk.name, &fallback), &used);
        used.insert(name.clone());
        debug!(constraint = %name, from = %draft.key, to = %fk.target, "foreign key resolved");

        foreign_keys.push(ForeignKey {
            id: new_id(),
            name,
            from_column_id: from.id.clone(),
            to_table_id: target.id.clone(),
            to_column_id: to.id.clone(),
            on_delete: fk.on_delete,
            on_update: fk.on_update,
            start_cardinality: None,
            end_cardinality: None,
        });
    }

    Ok(foreign_keys)
}

fn apply_comment(
    tables: &mut [Table],
    index: &HashMap<&QualifiedName, usize>,
    comment: CommentDraft,
) -> Result<(), ParseError> {
    match comment.target {
        CommentTarget::Table(key) => {
            let Some(&i) = index.get(&key) else {
                return Err(ParseError::CommentTarget {
                    target: key.to_string(),
                });
            };
            tables[i].comment = comment.text;
        }
        CommentTarget::Column(key, column) => {
            let target = match index.get(&key) {
                Some(&i) => tables[i].columns.iter_mut().find(|c| c.name == column),
                None => None,
            };
            let Some(target) = target else {
                return Err(ParseError::CommentTarget {
                    target: format!("{}.{}", key, column),
                });
            };
            target.comment = comment.text;
        }
    }
    Ok(())
}
