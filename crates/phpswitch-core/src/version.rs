use std::cmp::Ordering;

/// Returns the version suffix of a directory name such as `php8.1`.
///
/// The remainder after `prefix` must be digits and dots only, with at least
/// one digit, so `php`, `php_backup` and `php8.x` are rejected.
pub fn parse_version_suffix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let suffix = name.strip_prefix(prefix)?;
    let mut saw_digit = false;
    for ch in suffix.chars() {
        match ch {
            '0'..='9' => saw_digit = true,
            '.' => {}
            _ => return None,
        }
    }
    saw_digit.then_some(suffix)
}

/// Orders version ids by their dot-separated numeric components, so `8.1`
/// sorts before `10.0`. Empty components count as zero.
pub fn compare_version_ids(left: &str, right: &str) -> Ordering {
    let mut left_parts = left.split('.');
    let mut right_parts = right.split('.');
    loop {
        match (left_parts.next(), right_parts.next()) {
            (None, None) => return left.cmp(right),
            (l, r) => {
                let l = component_value(l);
                let r = component_value(r);
                match l.cmp(&r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

fn component_value(part: Option<&str>) -> u64 {
    part.and_then(|value| value.parse().ok()).unwrap_or(0)
}
