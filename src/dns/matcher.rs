//! BIND-flavored owner token matching

/// Decide whether `query` is answered by a record owned by `owner` inside
/// the zone rooted at `apex`.
///
/// Owner token semantics:
///
/// * `@` — the zone apex itself.
/// * `*` — any strict subdomain of the apex (the apex itself excluded).
/// * `*.` — the apex and everything under it.
/// * anything else — compared literally against the query name. Owners are
///   not qualified relative to the apex, so a record owned by `www` inside
///   `example.com` answers a query for `www`, not `www.example.com`.
///
/// A zone rooted at `""` or `"."` covers every name, so `*` and `*.` always
/// match there and `@` matches only the root name.
pub fn compare(query: &str, apex: &str, owner: &str) -> bool {
    if apex.is_empty() || apex == "." {
        return match owner {
            "*" | "*." => true,
            "@" => query.is_empty() || query == ".",
            _ => false,
        };
    }

    match owner {
        "@" => query == apex,
        "*" => query != apex && tail_labels_match(query, apex),
        "*." => tail_labels_match(query, apex),
        _ => query == owner,
    }
}

/// True when the rightmost labels of `query` equal `apex`, label for label.
fn tail_labels_match(query: &str, apex: &str) -> bool {
    let query_labels: Vec<&str> = query.split('.').collect();
    let apex_labels: Vec<&str> = apex.split('.').collect();

    if query_labels.len() < apex_labels.len() {
        return false;
    }

    query_labels[query_labels.len() - apex_labels.len()..] == apex_labels[..]
}
