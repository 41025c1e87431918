use crate::api::error::AppError;
use crate::entities::{prelude::*, files};
use crate::utils::validation::validate_owner_id;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, Func},
};
use serde::Deserialize;
use std::collections::HashMap;

/// Query parameters accepted by the file listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// Case-insensitive filename substring
    pub search: Option<String>,
    /// Case-insensitive exact content type
    pub file_type: Option<String>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub struct SearchService;

impl SearchService {
    /// List one owner's files, newest first, each paired with its
    /// reference count (zero for references and unreferenced originals).
    pub async fn search_files(
        db: &DatabaseConnection,
        owner_id: &str,
        query: &FileQuery,
    ) -> Result<Vec<(files::Model, i64)>, AppError> {
        let owner_id = validate_owner_id(owner_id)?;

        let mut cond = Condition::all().add(files::Column::OwnerId.eq(owner_id));

        if let Some(ref search) = query.search {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(files::Column::Filename)))
                    .like(format!("%{}%", search.to_lowercase())),
            );
        }
        if let Some(ref file_type) = query.file_type {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(files::Column::ContentType)))
                    .eq(file_type.to_lowercase()),
            );
        }
        if let Some(min) = query.min_size {
            cond = cond.add(files::Column::Size.gte(min));
        }
        if let Some(max) = query.max_size {
            cond = cond.add(files::Column::Size.lte(max));
        }
        if let Some(start) = query.start_date {
            cond = cond.add(files::Column::CreatedAt.gte(start));
        }
        if let Some(end) = query.end_date {
            cond = cond.add(files::Column::CreatedAt.lte(end));
        }

        let mut select = Files::find()
            .filter(cond)
            .order_by_desc(files::Column::CreatedAt);

        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        if let Some(offset) = query.offset {
            select = select.offset(offset);
        }

        let items = select.all(db).await?;

        // One grouped query for reference counts instead of a per-row
        // subquery.
        let original_ids: Vec<String> = items
            .iter()
            .filter(|f| !f.is_reference)
            .map(|f| f.id.clone())
            .collect();

        let mut counts: HashMap<String, i64> = HashMap::new();
        if !original_ids.is_empty() {
            let rows: Vec<(Option<String>, i64)> = Files::find()
                .select_only()
                .column(files::Column::OriginalId)
                .column_as(files::Column::Id.count(), "reference_count")
                .filter(files::Column::OriginalId.is_in(original_ids))
                .group_by(files::Column::OriginalId)
                .into_tuple()
                .all(db)
                .await?;

            for (original_id, count) in rows {
                if let Some(id) = original_id {
                    counts.insert(id, count);
                }
            }
        }

        Ok(items
            .into_iter()
            .map(|f| {
                let count = counts.get(&f.id).copied().unwrap_or(0);
                (f, count)
            })
            .collect())
    }

    /// Distinct content types one owner has uploaded, sorted.
    pub async fn distinct_file_types(
        db: &DatabaseConnection,
        owner_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let owner_id = validate_owner_id(owner_id)?;

        let types: Vec<String> = Files::find()
            .select_only()
            .column(files::Column::ContentType)
            .distinct()
            .filter(files::Column::OwnerId.eq(owner_id))
            .order_by_asc(files::Column::ContentType)
            .into_tuple()
            .all(db)
            .await?;

        Ok(types)
    }
}
