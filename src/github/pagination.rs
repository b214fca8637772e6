//! Link-header pagination.

/// Extract the `rel="next"` target from a GitHub `Link` header.
///
/// ```text
/// <https://api.github.com/orgs/acme/repos?page=2>; rel="next", <...?page=5>; rel="last"
/// ```
pub fn next_link(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
