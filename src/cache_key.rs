//! Cache key generation for to-do reads
//!
//! Layout, fields always in this order:
//!
//! ```text
//! todos:list:<scope>:page:<n>:size:<n>:sort:<field>:order:<dir>[:title:<text>]
//! todos:get:<id>
//! ```
//!
//! `<scope>` is `admin:all`, `admin:user:<id>` or `user:<id>`. Owner ids and
//! title text are percent-encoded down to `[A-Za-z0-9%]`, so they can never
//! contain a `:` delimiter or a glob metacharacter.

use crate::domains::todos::query::{AccessScope, QueryOptions};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

pub const TODO_LIST_NAMESPACE: &str = "todos:list";
pub const TODO_GET_NAMESPACE: &str = "todos:get";

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

fn scope_segment(scope: &AccessScope) -> String {
    match scope {
        AccessScope::AdminAll => "admin:all".to_string(),
        AccessScope::AdminUser(owner) => format!("admin:user:{}", encode(owner)),
        AccessScope::Owner(owner) => format!("user:{}", encode(owner)),
    }
}

/// Generate cache key for a list or search page
pub fn todo_list(opts: &QueryOptions) -> String {
    let mut key = format!(
        "{}:{}:page:{}:size:{}:sort:{}:order:{}",
        TODO_LIST_NAMESPACE,
        scope_segment(&opts.scope),
        opts.page,
        opts.size,
        opts.sort.as_str(),
        opts.order.as_str(),
    );
    if let Some(title) = &opts.title {
        key.push_str(":title:");
        key.push_str(&encode(title));
    }
    key
}

/// Generate cache key for a single to-do lookup
pub fn todo_get(id: &str) -> String {
    format!("{}:{}", TODO_GET_NAMESPACE, encode(id))
}

/// Every list pattern that can hold rows owned by `owner_id`.
pub fn todo_list_patterns_for_owner(owner_id: &str) -> Vec<String> {
    let owner = encode(owner_id);
    vec![
        format!("{}:user:{}:*", TODO_LIST_NAMESPACE, owner),
        format!("{}:admin:user:{}:*", TODO_LIST_NAMESPACE, owner),
        format!("{}:admin:all:*", TODO_LIST_NAMESPACE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::todos::query::{SortField, SortOrder};
    use shared::cache::GlobPattern;

    fn opts(scope: AccessScope) -> QueryOptions {
        QueryOptions {
            scope,
            title: None,
            page: 1,
            size: 10,
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }

    #[test]
    fn key_layout_is_fixed() {
        assert_eq!(
            todo_list(&opts(AccessScope::Owner("u1".into()))),
            "todos:list:user:u1:page:1:size:10:sort:created_at:order:desc"
        );
        assert_eq!(
            todo_list(&opts(AccessScope::AdminAll)),
            "todos:list:admin:all:page:1:size:10:sort:created_at:order:desc"
        );

        let mut o = opts(AccessScope::AdminUser("u1".into()));
        o.title = Some("buy milk".into());
        assert_eq!(
            todo_list(&o),
            "todos:list:admin:user:u1:page:1:size:10:sort:created_at:order:desc:title:buy%20milk"
        );
    }

    #[test]
    fn keys_differ_whenever_any_field_differs() {
        let base = opts(AccessScope::Owner("u1".into()));
        let mut variants = vec![base.clone()];

        variants.push(QueryOptions { scope: AccessScope::Owner("u2".into()), ..base.clone() });
        variants.push(QueryOptions { scope: AccessScope::AdminUser("u1".into()), ..base.clone() });
        variants.push(QueryOptions { scope: AccessScope::AdminAll, ..base.clone() });
        variants.push(QueryOptions { page: 2, ..base.clone() });
        variants.push(QueryOptions { size: 11, ..base.clone() });
        variants.push(QueryOptions { sort: SortField::Title, ..base.clone() });
        variants.push(QueryOptions { order: SortOrder::Asc, ..base.clone() });
        variants.push(QueryOptions { title: Some("a".into()), ..base.clone() });
        variants.push(QueryOptions { title: Some("A".into()), ..base.clone() });

        let keys: std::collections::HashSet<String> = variants.iter().map(todo_list).collect();
        assert_eq!(keys.len(), variants.len());
    }

    #[test]
    fn title_text_cannot_forge_other_fields() {
        let mut forged = opts(AccessScope::Owner("u1".into()));
        forged.title = Some("x:page:2".into());
        let key = todo_list(&forged);

        assert!(key.ends_with(":title:x%3Apage%3A2"));
        assert_eq!(key.matches(":page:").count(), 1);
    }

    #[test]
    fn owner_ids_cannot_collide_through_delimiters() {
        let a = todo_list(&opts(AccessScope::Owner("a:page:1".into())));
        let b = todo_list(&opts(AccessScope::Owner("a".into())));
        assert_ne!(a, b);
        assert!(!GlobPattern::parse(&todo_list_patterns_for_owner("a")[0])
            .unwrap()
            .matches(&a));
    }

    #[test]
    fn key_is_stable() {
        let o = opts(AccessScope::Owner("u1".into()));
        assert_eq!(todo_list(&o), todo_list(&o.clone()));
    }

    #[test]
    fn owner_patterns_cover_every_scope_that_can_show_the_row() {
        let patterns: Vec<GlobPattern> = todo_list_patterns_for_owner("u1")
            .iter()
            .map(|p| GlobPattern::parse(p).unwrap())
            .collect();
        let hit = |key: &str| patterns.iter().any(|p| p.matches(key));

        assert!(hit(&todo_list(&opts(AccessScope::Owner("u1".into())))));
        assert!(hit(&todo_list(&opts(AccessScope::AdminUser("u1".into())))));
        assert!(hit(&todo_list(&opts(AccessScope::AdminAll))));

        assert!(!hit(&todo_list(&opts(AccessScope::Owner("u2".into())))));
        assert!(!hit(&todo_list(&opts(AccessScope::AdminUser("u2".into())))));
        assert!(!hit(&todo_get("u1")));
    }
}
