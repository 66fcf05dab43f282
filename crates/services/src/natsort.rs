//! Natural-order, case-insensitive string comparison.
//!
//! Runs of ASCII digits compare by numeric value ("img2" < "img10"), all
//! other characters compare after Unicode lowercasing. The result does not
//! depend on the process locale.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compares `a` and `b` in natural order, ignoring case.
///
/// Strings that only differ in case or leading zeros fall back to a plain
/// byte comparison, so the ordering is total and sorting is independent of
/// the input order.
pub fn natural_cmp_ignore_case(a: &str, b: &str) -> Ordering {
    compare_folded(a, b).then_with(|| a.cmp(b))
}

/// Sorts `items` in place with [`natural_cmp_ignore_case`].
pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp_ignore_case(a.as_ref(), b.as_ref()));
}

fn compare_folded(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let ord = compare_numeric(&l_run, &r_run);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                left.next();
                right.next();
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

// Arbitrary length: no integer parsing, so long runs never overflow.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(natural_cmp_ignore_case("img2", "img10"), Ordering::Less);
        assert_eq!(natural_cmp_ignore_case("@100", "@99"), Ordering::Greater);
        assert_eq!(natural_cmp_ignore_case("3", "20"), Ordering::Less);
    }

    #[test]
    fn letters_ignore_case() {
        assert_eq!(natural_cmp_ignore_case("Apple", "banana"), Ordering::Less);
        assert_eq!(natural_cmp_ignore_case("apple", "BANANA"), Ordering::Less);
        assert!(natural_cmp_ignore_case("Éclair", "éclair").is_ne());
        assert_eq!(compare_folded("Éclair", "éclair"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(natural_cmp_ignore_case("tag", "tags"), Ordering::Less);
        assert_eq!(natural_cmp_ignore_case("", "a"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_are_numerically_equal_but_ordered() {
        assert_eq!(compare_folded("file007", "file7"), Ordering::Equal);
        assert_ne!(natural_cmp_ignore_case("file007", "file7"), Ordering::Equal);
    }

    #[test]
    fn sort_is_independent_of_input_order() {
        let mut forward = vec!["#b", "#A", "@10", "@9", "3", "#a"];
        let mut backward: Vec<_> = forward.iter().rev().copied().collect();
        natural_sort(&mut forward);
        natural_sort(&mut backward);
        assert_eq!(forward, backward);
        assert_eq!(forward, vec!["#A", "#a", "#b", "3", "@9", "@10"]);
    }

    #[test]
    fn very_long_digit_runs_do_not_overflow() {
        let big = "9".repeat(64);
        let bigger = format!("1{}", "0".repeat(64));
        assert_eq!(natural_cmp_ignore_case(&big, &bigger), Ordering::Less);
    }
}
