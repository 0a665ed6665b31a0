//! Allow-list checks for identifiers that end up in URLs, paths, and argv

use std::sync::LazyLock;

use regex::Regex;

static PRODUCT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid product name pattern"));

static BINARY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("valid binary name pattern"));

pub fn is_product_name_valid(name: &str) -> bool {
    PRODUCT_NAME_RE.is_match(name)
}

pub fn is_binary_name_valid(name: &str) -> bool {
    // "." and ".." match the character class but are directory references
    BINARY_NAME_RE.is_match(name) && name != "." && name != ".."
}
