//! SQL construction for the `profiles` table
//!
//! Sort input from callers is parsed into a closed set of columns and
//! directions; nothing caller-supplied is interpolated into SQL text.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Columns of the `profiles` table, in select order
pub const PROFILE_COLUMNS: &str = "profile_id, name, label, account_id, org_id, created_at, \
     active, creator, insights, remediations, compliance";

/// A sortable column of the `profiles` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ProfileId,
    Name,
    Label,
    AccountId,
    OrgId,
    CreatedAt,
    Active,
    Creator,
    Insights,
    Remediations,
    Compliance,
}

impl Column {
    /// Column name as used in SQL
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Column::ProfileId => "profile_id",
            Column::Name => "name",
            Column::Label => "label",
            Column::AccountId => "account_id",
            Column::OrgId => "org_id",
            Column::CreatedAt => "created_at",
            Column::Active => "active",
            Column::Creator => "creator",
            Column::Insights => "insights",
            Column::Remediations => "remediations",
            Column::Compliance => "compliance",
        }
    }
}

impl FromStr for Column {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let column = match s.trim() {
            "profile_id" => Column::ProfileId,
            "name" => Column::Name,
            "label" => Column::Label,
            "account_id" => Column::AccountId,
            "org_id" => Column::OrgId,
            "created_at" => Column::CreatedAt,
            "active" => Column::Active,
            "creator" => Column::Creator,
            "insights" => Column::Insights,
            "remediations" => Column::Remediations,
            "compliance" => Column::Compliance,
            other => return Err(ParseError::InvalidColumn(other.to_string())),
        };
        Ok(column)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// Parsed `col[,col...][:ASC|DESC]` sort expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    columns: Vec<Column>,
    direction: Option<Direction>,
}

impl OrderBy {
    /// Parse a sort expression; an empty string means no ordering
    ///
    /// # Errors
    /// Returns `ParseError` for unknown columns, bad directions or extra separators
    pub fn parse(input: &str) -> Result<Option<Self>, ParseError> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 2 {
            return Err(ParseError::Malformed(input.to_string()));
        }

        let columns = parts[0]
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Column>, _>>()?;

        let direction = match parts.get(1) {
            None => None,
            Some(dir) => match dir.trim().to_ascii_uppercase().as_str() {
                "ASC" => Some(Direction::Asc),
                "DESC" => Some(Direction::Desc),
                _ => return Err(ParseError::InvalidDirection((*dir).to_string())),
            },
        };

        Ok(Some(Self { columns, direction }))
    }

    /// Render as an `ORDER BY` clause
    #[must_use]
    pub fn to_sql(&self) -> String {
        let terms: Vec<String> = self
            .columns
            .iter()
            .map(|c| match self.direction {
                Some(dir) => format!("{} {dir}", c.as_str()),
                None => c.as_str().to_string(),
            })
            .collect();
        format!("ORDER BY {}", terms.join(", "))
    }
}

/// Build the org listing query; `?1` org, `?2` limit, `?3` offset
#[must_use]
pub fn list_sql(order: Option<&OrderBy>) -> String {
    let mut sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE org_id = ?1");
    if let Some(order) = order {
        sql.push(' ');
        sql.push_str(&order.to_sql());
    }
    sql.push_str(" LIMIT ?2 OFFSET ?3");
    sql
}

/// Map caller limit/offset to SQLite values; `LIMIT -1` is unbounded
#[must_use]
pub fn page_bounds(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit > 0 { limit } else { -1 };
    (limit, offset.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_column() {
        let order = OrderBy::parse("created_at:desc").unwrap().unwrap();
        assert_eq!(order.to_sql(), "ORDER BY created_at DESC");
    }

    #[test]
    fn test_parse_multiple_columns() {
        let order = OrderBy::parse("label,created_at:ASC").unwrap().unwrap();
        assert_eq!(order.to_sql(), "ORDER BY label ASC, created_at ASC");
    }

    #[test]
    fn test_parse_without_direction() {
        let order = OrderBy::parse("name").unwrap().unwrap();
        assert_eq!(order.to_sql(), "ORDER BY name");
    }

    #[test]
    fn test_parse_empty_is_none() {
        assert_eq!(OrderBy::parse("").unwrap(), None);
        assert_eq!(OrderBy::parse("  ").unwrap(), None);
    }

    #[test]
    fn test_sql_injection_rejected() {
        let err = OrderBy::parse("created_at; DROP TABLE profiles").unwrap_err();
        assert!(matches!(err, ParseError::InvalidColumn(_)));

        let err = OrderBy::parse("created_at:DESC; DELETE FROM profiles").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDirection(_)));
    }

    #[test]
    fn test_parse_rejects_extra_separator() {
        let err = OrderBy::parse("created_at:ASC:DESC").unwrap_err();
        assert_eq!(err, ParseError::Malformed("created_at:ASC:DESC".to_string()));
    }

    #[test]
    fn test_parse_rejects_empty_direction() {
        let err = OrderBy::parse("created_at:").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDirection(_)));
    }

    #[test]
    fn test_list_sql() {
        let order = OrderBy::parse("created_at:DESC").unwrap();
        assert_eq!(
            list_sql(order.as_ref()),
            format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE org_id = ?1 \
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
            )
        );
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(0, 0), (-1, 0));
        assert_eq!(page_bounds(10, -5), (10, 0));
        assert_eq!(page_bounds(-1, 20), (-1, 20));
    }
}
