//! Maven-style version ordering
//!
//! Versions are split into numeric and qualifier items on `.`, `-` and
//! digit/letter transitions. Numbers compare numerically, qualifiers by
//! their well-known rank (`alpha < beta < milestone < rc < snapshot <
//! release < sp`), unknown qualifiers after all known ones, lexically.
//! Trailing zeros and release qualifiers are insignificant, so `1`, `1.0`
//! and `1.0-final` are equal.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Digits without leading zeros
    Number(String),
    Qualifier(String),
}

const RELEASE_RANK: u8 = 6;

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "milestone" | "m" => 3,
        "rc" | "cr" => 4,
        "snapshot" => 5,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 7,
        _ => 8,
    }
}

fn number(digits: &str) -> Item {
    let trimmed = digits.trim_start_matches('0');
    Item::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
}

fn parse(version: &str) -> Vec<Item> {
    let lower = version.to_ascii_lowercase();
    let mut items = Vec::new();

    for part in lower.split(['.', '-']) {
        let mut current = String::new();
        let mut digits = false;
        for c in part.chars() {
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != digits {
                items.push(if digits { number(&current) } else { Item::Qualifier(current.clone()) });
                current.clear();
            }
            digits = is_digit;
            current.push(c);
        }
        if !current.is_empty() {
            items.push(if digits { number(&current) } else { Item::Qualifier(current) });
        }
    }

    while let Some(last) = items.last() {
        let insignificant = match last {
            Item::Number(n) => n == "0",
            Item::Qualifier(q) => qualifier_rank(q) == RELEASE_RANK,
        };
        if !insignificant {
            break;
        }
        items.pop();
    }
    items
}

fn cmp_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a)
        .cmp(&qualifier_rank(b))
        .then_with(|| if qualifier_rank(a) == 8 { a.cmp(b) } else { Ordering::Equal })
}

/// Compare an item against the absence of an item
fn cmp_to_missing(item: &Item) -> Ordering {
    match item {
        Item::Number(n) if n == "0" => Ordering::Equal,
        Item::Number(_) => Ordering::Greater,
        Item::Qualifier(q) => cmp_qualifiers(q, ""),
    }
}

fn cmp_items(a: &Item, b: &Item) -> Ordering {
    match (a, b) {
        (Item::Number(x), Item::Number(y)) => cmp_numbers(x, y),
        (Item::Qualifier(x), Item::Qualifier(y)) => cmp_qualifiers(x, y),
        (Item::Number(_), Item::Qualifier(_)) => Ordering::Greater,
        (Item::Qualifier(_), Item::Number(_)) => Ordering::Less,
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = parse(a);
    let right = parse(b);

    for i in 0..left.len().max(right.len()) {
        let ord = match (left.get(i), right.get(i)) {
            (Some(x), Some(y)) => cmp_items(x, y),
            (Some(x), None) => cmp_to_missing(x),
            (None, Some(y)) => cmp_to_missing(y).reverse(),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    // Equal by ordering but textually different: keep a total order.
    a.cmp(b)
}

/// Sort ascending and drop exact duplicates
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}

pub fn is_snapshot(version: &str) -> bool {
    version.ends_with("-SNAPSHOT")
}
