//! Text canonicalization for substring search.
//!
//! The feed data arrives with inconsistent casing, stray separators, and
//! uneven spacing (`"PCR_TYRE_JK_185/65 R15_..."`), so every searchable
//! field is stored twice: the raw value shown to callers and a canonical
//! shadow used only for matching. A free-text query is canonicalized with
//! the same rules and matched as a contiguous substring against the shadow,
//! which makes search insensitive to formatting without any tokenization.
//!
//! Rules, applied in order: lowercase, remove `,` and `_` entirely, collapse
//! whitespace runs to a single space, trim. Slash, hyphen, and period are
//! load-bearing in tyre size notation (`185/65 R15`) and pass through
//! untouched.

use crate::models::StockItem;

/// Canonicalize a string for substring matching.
///
/// Idempotent and total: every input yields some output, and re-applying
/// the function is a no-op.
pub fn canonicalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;

    for ch in input.chars() {
        if ch == ',' || ch == '_' {
            continue;
        }
        if ch.is_whitespace() {
            // Leading whitespace never flushes; trailing never gets the chance.
            if !out.is_empty() {
                pending_space = true;
            }
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }

    out
}

/// Canonicalize an optional value; absent maps to the empty string.
pub fn canonicalize_opt(input: Option<&str>) -> String {
    input.map(canonicalize).unwrap_or_default()
}

/// Canonical shadow values for one stock record.
///
/// Quantity, prices, and remarks are never substring-searched and have no
/// shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFields {
    pub id: String,
    pub brand: String,
    pub product: String,
    pub city: String,
    pub item_description: String,
    pub size: String,
    pub pattern: String,
    pub segment: String,
    pub rim_ah: String,
}

impl CanonicalFields {
    /// Derive the shadow values for a record. Total: any record, however
    /// malformed, yields some canonical record.
    pub fn of(item: &StockItem) -> Self {
        Self {
            id: canonicalize(&item.id),
            brand: canonicalize(&item.brand),
            product: canonicalize(&item.product),
            city: canonicalize(&item.city),
            item_description: canonicalize(&item.item_description),
            size: canonicalize(&item.size),
            pattern: canonicalize(&item.pattern),
            segment: canonicalize(&item.segment),
            rim_ah: canonicalize(&item.rim_ah),
        }
    }
}
