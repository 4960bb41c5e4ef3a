//! Query options for list/search reads and the scoped store query built from them

use serde::Deserialize;
use shared::{config::PaginationConfig, AppError, Identity, Result};

pub const TITLE_FILTER_MIN: usize = 2;
pub const TITLE_FILTER_MAX: usize = 255;

/// Whose rows a read may see. Built only through [`AccessScope::resolve`],
/// so a non-admin can never end up with anything but their own scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessScope {
    Owner(String),
    AdminAll,
    AdminUser(String),
}

impl AccessScope {
    pub fn resolve(identity: &Identity, requested_owner: Option<&str>) -> Self {
        if !identity.is_admin() {
            return AccessScope::Owner(identity.user_id.clone());
        }
        match requested_owner.map(str::trim).filter(|id| !id.is_empty()) {
            Some(owner) => AccessScope::AdminUser(owner.to_string()),
            None => AccessScope::AdminAll,
        }
    }

    pub fn owner_filter(&self) -> Option<&str> {
        match self {
            AccessScope::Owner(id) | AccessScope::AdminUser(id) => Some(id),
            AccessScope::AdminAll => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Title,
    Done,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortField::Id),
            "title" => Ok(SortField::Title),
            "done" => Ok(SortField::Done),
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            other => Err(AppError::bad_request(format!(
                "unsupported sort field '{}', expected one of id, title, done, created_at, updated_at",
                other
            ))),
        }
    }

    /// Also the column name.
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Done => "done",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::bad_request(format!(
                "unsupported sort order '{}', expected asc or desc",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Raw query string of the list and search endpoints.
///
/// Everything arrives as text so malformed numbers surface as our own
/// `BadRequest` instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub size: Option<String>,
    pub title: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryOptions {
    pub scope: AccessScope,
    pub title: Option<String>,
    pub page: i64,
    pub size: i64,
    pub sort: SortField,
    pub order: SortOrder,
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("{} must be an integer, got '{}'", name, v))),
    }
}

fn normalize_title(raw: Option<&str>) -> Result<Option<String>> {
    let Some(title) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = title.chars().count();
    if !(TITLE_FILTER_MIN..=TITLE_FILTER_MAX).contains(&len) {
        return Err(AppError::bad_request(format!(
            "title filter must be between {} and {} characters",
            TITLE_FILTER_MIN, TITLE_FILTER_MAX
        )));
    }
    Ok(Some(title.to_string()))
}

impl QueryOptions {
    /// Validate the raw request and resolve every default, so equal queries
    /// produce equal options no matter which parameters were spelled out.
    pub fn from_params(
        identity: &Identity,
        params: &ListParams,
        pagination: &PaginationConfig,
    ) -> Result<Self> {
        let page = parse_number("page", params.page.as_deref())?
            .filter(|p| *p > 0)
            .unwrap_or(1);

        let size = parse_number("size", params.size.as_deref())?
            .filter(|s| *s > 0)
            .unwrap_or(pagination.default_size)
            .min(pagination.max_size);

        let sort = params
            .sort
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(SortField::parse)
            .transpose()?;
        let order = params
            .order
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .map(SortOrder::parse)
            .transpose()?;

        // Newest first unless the caller picks a field, which then defaults to ascending.
        let (sort, order) = match (sort, order) {
            (None, None) => (SortField::CreatedAt, SortOrder::Desc),
            (None, Some(order)) => (SortField::CreatedAt, order),
            (Some(sort), None) => (sort, SortOrder::Asc),
            (Some(sort), Some(order)) => (sort, order),
        };

        Ok(Self {
            scope: AccessScope::resolve(identity, params.user_id.as_deref()),
            title: normalize_title(params.title.as_deref())?,
            page,
            size,
            sort,
            order,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

/// What the store executes: ownership predicate, title filter, order, window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub owner_id: Option<String>,
    /// Case-insensitive substring, raw user text. Stores escape it themselves.
    pub title_contains: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub offset: i64,
    pub limit: i64,
}

impl From<&QueryOptions> for StoreQuery {
    fn from(opts: &QueryOptions) -> Self {
        Self {
            owner_id: opts.scope.owner_filter().map(str::to_string),
            title_contains: opts.title.clone(),
            sort: opts.sort,
            order: opts.order,
            offset: opts.offset(),
            limit: opts.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ErrorKind, Role};

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut p = ListParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => p.page = v,
                "size" => p.size = v,
                "title" => p.title = v,
                "sort" => p.sort = v,
                "order" => p.order = v,
                "user_id" => p.user_id = v,
                _ => unreachable!(),
            }
        }
        p
    }

    fn build(identity: &Identity, pairs: &[(&str, &str)]) -> Result<QueryOptions> {
        QueryOptions::from_params(identity, &params(pairs), &PaginationConfig::default())
    }

    #[test]
    fn non_admin_scope_ignores_requested_owner() {
        let alice = Identity::new("alice", Role::User);
        let opts = build(&alice, &[("user_id", "bob")]).unwrap();

        assert_eq!(opts.scope, AccessScope::Owner("alice".into()));
        assert_eq!(StoreQuery::from(&opts).owner_id.as_deref(), Some("alice"));
    }

    #[test]
    fn admin_scope_follows_requested_owner() {
        let admin = Identity::new("root", Role::Admin);

        let all = build(&admin, &[]).unwrap();
        assert_eq!(all.scope, AccessScope::AdminAll);
        assert_eq!(StoreQuery::from(&all).owner_id, None);

        let one = build(&admin, &[("user_id", "bob")]).unwrap();
        assert_eq!(one.scope, AccessScope::AdminUser("bob".into()));
        assert_eq!(StoreQuery::from(&one).owner_id.as_deref(), Some("bob"));

        assert_eq!(build(&admin, &[("user_id", "  ")]).unwrap().scope, AccessScope::AdminAll);
    }

    #[test]
    fn defaults_and_clamping() {
        let alice = Identity::new("alice", Role::User);

        let d = build(&alice, &[]).unwrap();
        assert_eq!((d.page, d.size), (1, 10));
        assert_eq!((d.sort, d.order), (SortField::CreatedAt, SortOrder::Desc));

        let z = build(&alice, &[("page", "0"), ("size", "-4")]).unwrap();
        assert_eq!((z.page, z.size), (1, 10));

        let big = build(&alice, &[("size", "100000")]).unwrap();
        assert_eq!(big.size, 100);

        let s = build(&alice, &[("sort", "title")]).unwrap();
        assert_eq!((s.sort, s.order), (SortField::Title, SortOrder::Asc));

        let o = build(&alice, &[("order", "ASC")]).unwrap();
        assert_eq!((o.sort, o.order), (SortField::CreatedAt, SortOrder::Asc));
    }

    #[test]
    fn explicit_defaults_equal_implicit_ones() {
        let alice = Identity::new("alice", Role::User);
        let implicit = build(&alice, &[]).unwrap();
        let explicit = build(
            &alice,
            &[("page", "1"), ("size", "10"), ("sort", "created_at"), ("order", "desc")],
        )
        .unwrap();
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn malformed_input_is_bad_request() {
        let alice = Identity::new("alice", Role::User);
        for pairs in [
            vec![("page", "one")],
            vec![("size", "1.5")],
            vec![("sort", "owner_id")],
            vec![("order", "sideways")],
            vec![("title", "x")],
        ] {
            let err = build(&alice, &pairs).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{:?}", pairs);
        }
    }

    #[test]
    fn store_query_window() {
        let alice = Identity::new("alice", Role::User);
        let opts = build(&alice, &[("page", "3"), ("size", "4"), ("title", " milk ")]).unwrap();
        let q = StoreQuery::from(&opts);

        assert_eq!((q.offset, q.limit), (8, 4));
        assert_eq!(q.title_contains.as_deref(), Some("milk"));
    }
}
