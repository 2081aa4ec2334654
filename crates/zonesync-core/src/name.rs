//! Domain name helpers
//!
//! All names handled by the core are kept in canonical, dot-terminated form
//! (`host.example.com.`). Comparisons are ASCII case-insensitive.

/// Return `name` in dot-terminated form.
///
/// Surrounding whitespace is trimmed. An empty name becomes the root (`.`).
pub fn fqdn(name: &str) -> String {
    let name = name.trim();
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Return `name` dot-terminated and ASCII lower-cased.
///
/// This is the form owner names, PTR targets and zone names are stored in,
/// so that equality and map lookups agree with [`is_in_zone`].
pub fn canonical_name(name: &str) -> String {
    fqdn(name).to_ascii_lowercase()
}

/// Return `name` without its trailing dot (the root stays `.`).
pub fn strip_dot(name: &str) -> &str {
    match name.strip_suffix('.') {
        Some("") | None => name,
        Some(stripped) => stripped,
    }
}

/// Whether `name` equals `zone` or lies below it.
///
/// Both arguments must be dot-terminated. The match is on label boundaries,
/// so `notexample.com.` is not inside `example.com.`.
pub fn is_in_zone(name: &str, zone: &str) -> bool {
    if zone == "." {
        return true;
    }
    if name.len() < zone.len() {
        return false;
    }
    let split = name.len() - zone.len();
    if !name.is_char_boundary(split) || !name[split..].eq_ignore_ascii_case(zone) {
        return false;
    }
    split == 0 || name.as_bytes()[split - 1] == b'.'
}
