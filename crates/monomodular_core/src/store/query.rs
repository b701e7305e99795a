//! Deferred, composable queries over committed rows.
//!
//! Builders only record clauses; SQL runs when the query is enumerated
//! (`to_list`, `first`, `count`, `any`). Staged changes are not visible.

use super::entity::{resolve_column, select_sql, AggregateRoot};
use super::{StorageContext, StoreError, StoreResult};
use log::debug;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Comparison operator for one filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Compare(Comparison, Value),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone)]
struct Filter {
    column: String,
    predicate: Predicate,
}

#[derive(Debug, Clone)]
struct Ordering {
    column: String,
    descending: bool,
}

/// Lazy view over all rows of `T`.
pub struct Query<'ctx, T> {
    ctx: &'ctx StorageContext,
    filters: Vec<Filter>,
    ordering: Vec<Ordering>,
    limit: Option<u32>,
    offset: u32,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx,
            filters: self.filters.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<'ctx, T: AggregateRoot> Query<'ctx, T> {
    pub(crate) fn new(ctx: &'ctx StorageContext) -> Self {
        Self {
            ctx,
            filters: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: 0,
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, column: &str, comparison: Comparison, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            predicate: Predicate::Compare(comparison, value.into()),
        });
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparison::Eq, value)
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            predicate: Predicate::IsNull,
        });
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            predicate: Predicate::IsNotNull,
        });
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.ordering.push(Ordering {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.ordering.push(Ordering {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Executes the query and materializes every matching entity.
    pub fn to_list(&self) -> StoreResult<Vec<T>> {
        let (sql, bind_values) = self.build_sql()?;
        debug!(
            "event=query_execute module=store status=start table={} filters={}",
            T::TABLE,
            self.filters.len()
        );

        let mut stmt = self.ctx.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(T::from_row(row)?);
        }

        Ok(entities)
    }

    /// Executes the query and returns the first match, if any.
    pub fn first(&self) -> StoreResult<Option<T>> {
        let mut single = self.clone();
        single.limit = Some(1);
        Ok(single.to_list()?.into_iter().next())
    }

    pub fn count(&self) -> StoreResult<u64> {
        let (sql, bind_values) = self.build_sql()?;
        let count = self.ctx.connection().query_row(
            &format!("SELECT COUNT(*) FROM ({sql});"),
            params_from_iter(bind_values),
            |row| row.get::<_, i64>(0),
        )?;
        u64::try_from(count).map_err(|_| StoreError::InvalidData(format!("negative count {count}")))
    }

    pub fn any(&self) -> StoreResult<bool> {
        Ok(self.first()?.is_some())
    }

    fn build_sql(&self) -> StoreResult<(String, Vec<Value>)> {
        let mut sql = format!("{} WHERE 1 = 1", select_sql::<T>());
        let mut bind_values = Vec::new();

        for filter in &self.filters {
            let column = column_of::<T>(&filter.column)?;
            match &filter.predicate {
                Predicate::Compare(comparison, value) => {
                    sql.push_str(&format!(" AND {column} {} ?", comparison.as_sql()));
                    bind_values.push(value.clone());
                }
                Predicate::IsNull => sql.push_str(&format!(" AND {column} IS NULL")),
                Predicate::IsNotNull => sql.push_str(&format!(" AND {column} IS NOT NULL")),
            }
        }

        if !self.ordering.is_empty() {
            let clauses = self
                .ordering
                .iter()
                .map(|ordering| {
                    column_of::<T>(&ordering.column).map(|column| {
                        if ordering.descending {
                            format!("{column} DESC")
                        } else {
                            format!("{column} ASC")
                        }
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(self.offset)));
        }

        Ok((sql, bind_values))
    }
}

fn column_of<T: AggregateRoot>(name: &str) -> StoreResult<&'static str> {
    resolve_column::<T>(name).ok_or_else(|| StoreError::UnknownColumn {
        table: T::TABLE,
        column: name.to_string(),
    })
}
