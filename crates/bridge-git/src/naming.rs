//! Branch name checks
//!
//! A subset of `git check-ref-format` rules, enough to keep malformed names
//! out of host URLs and to fail fast on obvious typos.

/// Characters git forbids anywhere in a ref name.
const FORBIDDEN: &[char] = &['~', '^', ':', '?', '*', '[', '\\', ' '];

/// Check whether `name` is usable as a branch name.
pub fn is_valid_branch_name(name: &str) -> bool {
    if name.is_empty() || name == "@" {
        return false;
    }
    if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
        return false;
    }
    if name.contains("..") || name.contains("@{") || name.contains("//") {
        return false;
    }
    if name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || FORBIDDEN.contains(&c))
    {
        return false;
    }

    name.split('/')
        .all(|component| !component.starts_with('.') && !component.ends_with(".lock"))
}
