use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::models::listing::{value_as_f64, value_as_text};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: String },
    Gte { column: String, value: f64 },
    Lte { column: String, value: f64 },
    /// Case-insensitive substring match on any of the columns.
    AnyIlike { columns: Vec<String>, needle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
    pub nulls_first: bool,
}

/// A read against one table: filters, ordering and a row window.
///
/// The same value is encoded as REST query parameters by the HTTP client
/// and evaluated directly by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    select: String,
    filters: Vec<Filter>,
    order: Option<Order>,
    offset: usize,
    limit: Option<usize>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        ListingQuery::new("*")
    }
}

impl ListingQuery {
    pub fn new(select: impl Into<String>) -> ListingQuery {
        ListingQuery {
            select: select.into(),
            filters: Vec::new(),
            order: None,
            offset: 0,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> ListingQuery {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn gte(mut self, column: &str, value: f64) -> ListingQuery {
        self.filters.push(Filter::Gte {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn lte(mut self, column: &str, value: f64) -> ListingQuery {
        self.filters.push(Filter::Lte {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn any_ilike(mut self, columns: &[&str], needle: &str) -> ListingQuery {
        self.filters.push(Filter::AnyIlike {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            needle: needle.to_string(),
        });
        self
    }

    /// Descending order with nulls last.
    pub fn order_desc(mut self, column: &str) -> ListingQuery {
        self.order = Some(Order {
            column: column.to_string(),
            ascending: false,
            nulls_first: false,
        });
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> ListingQuery {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn limit(mut self, limit: usize) -> ListingQuery {
        self.limit = Some(limit);
        self
    }

    /// REST query parameters for this query.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.clone())];

        for filter in &self.filters {
            pairs.push(match filter {
                Filter::Eq { column, value } => (column.clone(), format!("eq.{value}")),
                Filter::Gte { column, value } => (column.clone(), format!("gte.{value}")),
                Filter::Lte { column, value } => (column.clone(), format!("lte.{value}")),
                Filter::AnyIlike { columns, needle } => {
                    let pattern = quote_value(&format!("%{needle}%"));
                    let terms: Vec<String> = columns
                        .iter()
                        .map(|column| format!("{column}.ilike.{pattern}"))
                        .collect();
                    ("or".to_string(), format!("({})", terms.join(",")))
                }
            });
        }

        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            let nulls = if order.nulls_first {
                "nullsfirst"
            } else {
                "nullslast"
            };
            pairs.push((
                "order".to_string(),
                format!("{}.{direction}.{nulls}", order.column),
            ));
        }

        if self.offset > 0 {
            pairs.push(("offset".to_string(), self.offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }

        pairs
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq { column, value } => row
                .get(column)
                .and_then(value_as_text)
                .map_or(false, |cell| &cell == value),
            Filter::Gte { column, value } => row
                .get(column)
                .and_then(value_as_f64)
                .map_or(false, |cell| cell >= *value),
            Filter::Lte { column, value } => row
                .get(column)
                .and_then(value_as_f64)
                .map_or(false, |cell| cell <= *value),
            Filter::AnyIlike { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|column| {
                    row.get(column)
                        .and_then(Value::as_str)
                        .map_or(false, |cell| cell.to_lowercase().contains(&needle))
                })
            }
        })
    }

    /// Filters, orders, windows and projects `rows`.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Vec<Row> {
        let mut selected: Vec<&Row> = rows.into_iter().filter(|row| self.matches(row)).collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| compare_cells(a.get(&order.column), b.get(&order.column), order));
        }

        let window = selected.into_iter().skip(self.offset);
        let window: Vec<&Row> = match self.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        };

        window.into_iter().map(|row| self.project(row)).collect()
    }

    fn project(&self, row: &Row) -> Row {
        if self.select.trim() == "*" {
            return row.clone();
        }
        self.select
            .split(',')
            .map(str::trim)
            .filter_map(|column| row.get(column).map(|v| (column.to_string(), v.clone())))
            .collect()
    }
}

fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>, order: &Order) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => {
            if order.nulls_first {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Some(_), None) => {
            if order.nulls_first {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Some(a), Some(b)) => {
            let natural = match (a, b) {
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
                _ => value_as_text(a).cmp(&value_as_text(b)),
            };
            if order.ascending {
                natural
            } else {
                natural.reverse()
            }
        }
    }
}
