//! Filter state of the listings search, as carried in URL query
//! parameters.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::listing::{Kind, Objekt};
use crate::normalize::{normalize_kind, normalize_objekt};

pub const PAGE_SIZE: usize = 12;

const KIND_PARAMS: [&str; 3] = ["kind", "tab", "mode"];
const OBJEKT_PARAMS: [&str; 3] = ["objekt", "type", "kategori"];

lazy_static! {
    static ref INT_PREFIX: Regex = Regex::new(r"^[+-]?\d+").unwrap();
    static ref FLOAT_PREFIX: Regex =
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap();
}

/// Decoded search filters. Thresholds keep their raw text; they are parsed
/// when the query is built and ignored if they do not parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub kind: Kind,
    pub q: String,
    pub objekt: Objekt,
    pub min_rum: String,
    pub min_boarea: String,
    pub min_pris: String,
    pub max_pris: String,
    /// Carried along by the filter bar, not applied to the query.
    pub radius_km: Option<String>,
}

/// Per-fetch replacements for the current filter state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub kind: Option<Kind>,
    pub q: Option<String>,
    pub objekt: Option<Objekt>,
    pub min_rum: Option<String>,
    pub min_boarea: Option<String>,
    pub min_pris: Option<String>,
    pub max_pris: Option<String>,
}

impl From<&FilterState> for Overrides {
    fn from(filters: &FilterState) -> Self {
        Overrides {
            kind: Some(filters.kind),
            q: Some(filters.q.clone()),
            objekt: Some(filters.objekt),
            min_rum: Some(filters.min_rum.clone()),
            min_boarea: Some(filters.min_boarea.clone()),
            min_pris: Some(filters.min_pris.clone()),
            max_pris: Some(filters.max_pris.clone()),
        }
    }
}

impl FilterState {
    /// Decodes query parameters. For each parameter the first value wins;
    /// kind and category each accept several parameter names, tried in
    /// order, skipping empty values.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> FilterState
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let text = |name: &str| first(&pairs, name).unwrap_or_default().to_string();

        FilterState {
            kind: normalize_kind(first_non_empty(&pairs, &KIND_PARAMS)),
            q: text("q"),
            objekt: normalize_objekt(first_non_empty(&pairs, &OBJEKT_PARAMS)),
            min_rum: text("minRum"),
            min_boarea: text("minBoarea"),
            min_pris: text("minPris"),
            max_pris: text("maxPris"),
            radius_km: first(&pairs, "radiusKm").map(str::to_string),
        }
    }

    /// Encodes the state as the filter bar does when it navigates to the
    /// listings page. Empty values are left out.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("kind", self.kind.as_str().to_string())];

        let q = self.q.trim();
        if !q.is_empty() {
            pairs.push(("q", q.to_string()));
        }
        if let Some(radius) = self.radius_km.as_deref().filter(|r| !r.is_empty() && *r != "0") {
            pairs.push(("radiusKm", radius.to_string()));
        }
        if self.objekt != Objekt::Alla {
            pairs.push(("objekt", self.objekt.as_str().to_string()));
        }

        let thresholds = [
            ("minRum", &self.min_rum),
            ("minBoarea", &self.min_boarea),
            ("minPris", &self.min_pris),
            ("maxPris", &self.max_pris),
        ];
        for (name, value) in thresholds {
            if !value.is_empty() {
                pairs.push((name, value.clone()));
            }
        }

        pairs
    }

    pub fn with_overrides(&self, overrides: &Overrides) -> FilterState {
        let pick = |value: &Option<String>, current: &String| {
            value.clone().unwrap_or_else(|| current.clone())
        };

        FilterState {
            kind: overrides.kind.unwrap_or(self.kind),
            q: pick(&overrides.q, &self.q),
            objekt: overrides.objekt.unwrap_or(self.objekt),
            min_rum: pick(&overrides.min_rum, &self.min_rum),
            min_boarea: pick(&overrides.min_boarea, &self.min_boarea),
            min_pris: pick(&overrides.min_pris, &self.min_pris),
            max_pris: pick(&overrides.max_pris, &self.max_pris),
            radius_km: self.radius_km.clone(),
        }
    }
}

fn first<'a, K: AsRef<str>, V: AsRef<str>>(pairs: &'a [(K, V)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key.as_ref() == name)
        .map(|(_, value)| value.as_ref())
}

fn first_non_empty<'a, K: AsRef<str>, V: AsRef<str>>(
    pairs: &'a [(K, V)],
    names: &[&str],
) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| first(pairs, name))
        .find(|value| !value.is_empty())
}

/// Integer from user input: whitespace is removed, then the leading integer
/// is read (`"1 500 000 kr"` is 1500000).
pub fn parse_int(input: &str) -> Option<i64> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    INT_PREFIX.find(&compact)?.as_str().parse().ok()
}

/// Decimal from user input: the first `,` is read as a decimal point, then
/// the leading number is read (`"2,5 rum"` is 2.5).
pub fn parse_float(input: &str) -> Option<f64> {
    let dotted = input.replacen(',', ".", 1);
    let value: f64 = FLOAT_PREFIX.find(dotted.trim_start())?.as_str().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_like_form_input() {
        assert_eq!(parse_int(" 1 500 000 "), Some(1_500_000));
        assert_eq!(parse_int("9000kr"), Some(9000));
        assert_eq!(parse_int("kr"), None);
        assert_eq!(parse_float("2,5"), Some(2.5));
        assert_eq!(parse_float("  3 rum"), Some(3.0));
        assert_eq!(parse_float(".5"), Some(0.5));
        assert_eq!(parse_float("1e999"), None);
        assert_eq!(parse_float(""), None);
    }

    #[test]
    fn empty_kind_parameter_falls_through_to_next_name() {
        let filters = FilterState::from_pairs([("kind", ""), ("tab", "uthyres")]);
        assert_eq!(filters.kind, Kind::Rent);
    }

    #[test]
    fn first_value_of_a_parameter_wins() {
        let filters = FilterState::from_pairs([("q", "Uppsala"), ("q", "Lund")]);
        assert_eq!(filters.q, "Uppsala");
    }
}
