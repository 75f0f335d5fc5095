//! Normalisation of the transaction kind and property category values
//! found in query strings and in rows written by older versions of the
//! site. Both normalisers are total: anything unrecognised falls back to
//! `SALE` and `Alla`.

use std::collections::HashMap;

use lazy_static::lazy_static;
use unicode_normalization::UnicodeNormalization;

use crate::models::listing::{Kind, Objekt};

lazy_static! {
    static ref OBJEKT_TABLE: HashMap<&'static str, Objekt> = HashMap::from([
        ("villa", Objekt::Villa),
        ("villor", Objekt::Villa),
        ("par/kedjehus/radhus", Objekt::ParKedjeRadhus),
        ("par/kedje/radhus", Objekt::ParKedjeRadhus),
        ("parhus", Objekt::ParKedjeRadhus),
        ("radhus", Objekt::ParKedjeRadhus),
        ("kedjehus", Objekt::ParKedjeRadhus),
        ("lagenhet", Objekt::Lagenhet),
        ("lagenheter", Objekt::Lagenhet),
        ("fritidshus", Objekt::Fritidshus),
        ("tomt", Objekt::Tomt),
        ("tomter", Objekt::Tomt),
        ("gard/skog", Objekt::GardSkog),
        ("gard", Objekt::GardSkog),
        ("skog", Objekt::GardSkog),
        ("ovrigt", Objekt::Ovrigt),
        ("alla", Objekt::Alla),
        ("alla typer", Objekt::Alla),
    ]);
}

const RENT_WORDS: [&str; 6] = ["rent", "uthyres", "hyra", "hyraut", "uthyrning", "u"];
const SALE_WORDS: [&str; 5] = ["sale", "tillsalu", "salj", "saljes", "s"];

/// Trims, strips diacritics and lower-cases.
pub fn fold(input: &str) -> String {
    input
        .trim()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .map(|c| match c {
            'å' | 'ä' | 'Å' | 'Ä' => 'a',
            'ö' | 'Ö' => 'o',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

pub fn normalize_kind(input: Option<&str>) -> Kind {
    let folded = match input {
        Some(raw) if !raw.trim().is_empty() => fold(raw),
        _ => return Kind::Sale,
    };

    if RENT_WORDS.contains(&folded.as_str()) {
        return Kind::Rent;
    }
    if SALE_WORDS.contains(&folded.as_str()) {
        return Kind::Sale;
    }
    Kind::Sale
}

pub fn normalize_objekt(input: Option<&str>) -> Objekt {
    let folded = match input {
        Some(raw) if !raw.trim().is_empty() => fold(raw),
        _ => return Objekt::Alla,
    };

    if let Some(objekt) = OBJEKT_TABLE.get(folded.as_str()) {
        return *objekt;
    }

    let has = |needle: &str| folded.contains(needle);

    if has("par") && has("kedje") && has("radhus") {
        Objekt::ParKedjeRadhus
    } else if has("lagen") {
        Objekt::Lagenhet
    } else if has("villa") {
        Objekt::Villa
    } else if has("fritid") {
        Objekt::Fritidshus
    } else if has("tomt") {
        Objekt::Tomt
    } else if has("gard") || has("skog") {
        Objekt::GardSkog
    } else if has("ovrig") {
        Objekt::Ovrigt
    } else {
        Objekt::Alla
    }
}
