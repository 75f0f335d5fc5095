//! Listing submission forms for sale and rent, with the field rules that
//! depend on the chosen category, and conversion to the insert payload.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::filters::{parse_float, parse_int};
use crate::models::listing::{Kind, NewListing, Objekt, STATUS_PUBLISHED};
use crate::normalize::normalize_objekt;

pub const MIN_DESCRIPTION_WORDS: usize = 50;
pub const MIN_IMAGES: usize = 1;
pub const MAX_IMAGES: usize = 15;

pub const TENURES: [&str; 3] = ["Bostadsrätt", "Hyresrätt", "Äganderätt"];
pub const RENTAL_PERIODS: [&str; 7] = [
    "Tillsvidare",
    "1–3 månader",
    "4–6 månader",
    "7–12 månader",
    "1–2 år",
    "2+ år",
    CUSTOM_PERIOD,
];
const CUSTOM_PERIOD: &str = "ANNAN";
const ENERGY_CLASS_UNSPECIFIED: &str = "Ej specificerat";

lazy_static! {
    static ref ZIP: Regex = Regex::new(r"^(\d{5}|\d{3}\s?\d{2})$").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Field name to message, in field-name order.
pub type FieldErrors = BTreeMap<String, String>;

/// Raw form input as typed by the user. Every value is text; yes/no
/// questions use `JA`/`NEJ`, utility inclusion uses `INGAR`/`INGAR_EJ`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingForm {
    pub title: String,
    pub street: String,
    pub zip: String,
    pub city: String,

    pub objekt: String,
    #[serde(rename = "upplåtelseform", alias = "upplatelseform")]
    pub upplatelseform: String,

    /// Sale price.
    pub pris: String,
    /// Monthly rent.
    pub hyra: String,
    pub hyresperiod: String,
    pub hyresperiod_custom: String,

    pub rum: String,
    pub boarea: String,
    pub balkong: String,
    pub vaning: String,
    pub hiss: String,

    pub tomtarea: String,
    pub uteplats: String,
    pub va_anslutning: String,
    pub byggratt: String,

    pub forening: String,
    pub energiklass: String,
    pub avgift_per_manad: String,
    pub pris_per_kvm: String,

    pub el: String,
    pub varme: String,
    pub vatten: String,
    pub internet: String,

    pub contact_first_name: String,
    pub contact_last_name: String,
    pub contact_phone: String,
    pub contact_email: String,

    pub description: String,
}

impl ListingForm {
    fn field(&self, name: &str) -> &str {
        match name {
            "title" => &self.title,
            "street" => &self.street,
            "zip" => &self.zip,
            "city" => &self.city,
            "objekt" => &self.objekt,
            "upplåtelseform" => &self.upplatelseform,
            "pris" => &self.pris,
            "hyra" => &self.hyra,
            "hyresperiod" => &self.hyresperiod,
            "hyresperiodCustom" => &self.hyresperiod_custom,
            "rum" => &self.rum,
            "boarea" => &self.boarea,
            "balkong" => &self.balkong,
            "vaning" => &self.vaning,
            "hiss" => &self.hiss,
            "tomtarea" => &self.tomtarea,
            "uteplats" => &self.uteplats,
            "vaAnslutning" => &self.va_anslutning,
            "avgiftPerManad" => &self.avgift_per_manad,
            "el" => &self.el,
            "varme" => &self.varme,
            "vatten" => &self.vatten,
            "internet" => &self.internet,
            "contactFirstName" => &self.contact_first_name,
            "contactLastName" => &self.contact_last_name,
            "contactPhone" => &self.contact_phone,
            "contactEmail" => &self.contact_email,
            _ => "",
        }
    }

    /// Category as entered, or `None` when it is not one the form offers.
    fn category(&self, kind: Kind) -> Option<Objekt> {
        let objekt = normalize_objekt(Some(&self.objekt));
        let offered = match kind {
            Kind::Sale => objekt != Objekt::Alla,
            Kind::Rent => objekt == Objekt::Lagenhet || objekt.is_house_type(),
        };
        offered.then_some(objekt)
    }

    /// Checks the form without contacting the backend. An empty map means
    /// the form can be submitted.
    pub fn validate(&self, kind: Kind, image_count: usize) -> FieldErrors {
        let objekt = self.category(kind);
        let mut errors = FieldErrors::new();

        for (field, message) in required_fields(kind, objekt) {
            if self.field(field).trim().is_empty() {
                errors.insert(field.to_string(), message.to_string());
            }
        }

        if !self.objekt.trim().is_empty() && objekt.is_none() {
            errors.insert("objekt".into(), "Välj objekt".into());
        }
        if !self.upplatelseform.trim().is_empty() && !TENURES.contains(&self.upplatelseform.trim()) {
            errors.insert("upplåtelseform".into(), "Välj upplåtelseform".into());
        }

        if kind == Kind::Rent {
            let period = self.hyresperiod.trim();
            if !period.is_empty() && !RENTAL_PERIODS.contains(&period) {
                errors.insert("hyresperiod".into(), "Välj uthyrningsperiod".into());
            }
            if period == CUSTOM_PERIOD && self.hyresperiod_custom.trim().is_empty() {
                errors.insert(
                    "hyresperiodCustom".into(),
                    "Ange önskad uthyrningsperiod.".into(),
                );
            }
        }

        if !self.zip.is_empty() && !ZIP.is_match(&self.zip) {
            errors.insert(
                "zip".into(),
                "Ogiltigt postnummer (ex 12345 eller 123 45)".into(),
            );
        }
        if !self.contact_email.is_empty() && !EMAIL.is_match(&self.contact_email) {
            errors.insert("contactEmail".into(), "Ogiltig e-postadress".into());
        }

        let words = self.description.split_whitespace().count();
        if words < MIN_DESCRIPTION_WORDS {
            errors.insert(
                "description".into(),
                format!("Beskrivningen måste vara minst {MIN_DESCRIPTION_WORDS} ord (nu {words})."),
            );
        }

        if image_count < MIN_IMAGES {
            errors.insert("images".into(), "Ladda upp minst 1 bild.".into());
        } else if image_count > MAX_IMAGES {
            errors.insert("images".into(), format!("Högst {MAX_IMAGES} bilder."));
        }

        errors
    }

    /// Insert payload for a form that passed [`ListingForm::validate`].
    pub fn into_new_listing(self, kind: Kind, user_id: &str, image_urls: Vec<String>) -> NewListing {
        let objekt = normalize_objekt(Some(&self.objekt));
        let energy_class = blank_to_none(&self.energiklass)
            .filter(|class| class != ENERGY_CLASS_UNSPECIFIED);

        let (price, rent_per_month, rental_period) = match kind {
            Kind::Sale => (parse_int(&self.pris), None, None),
            Kind::Rent => {
                let period = self.hyresperiod.trim();
                let rental_period = if period == CUSTOM_PERIOD {
                    format!("Annan: {}", self.hyresperiod_custom.trim())
                } else {
                    period.to_string()
                };
                (None, parse_int(&self.hyra), blank_to_none(&rental_period))
            }
        };

        // the rent form has no VA, building rights, fee or price per m²
        let sale_only = |value: Option<i64>| if kind == Kind::Sale { value } else { None };

        NewListing {
            user_id: user_id.to_string(),
            kind,
            objekt,
            upplatelseform: self.upplatelseform.trim().to_string(),

            price,
            rent_per_month,
            rental_period,

            title: self.title.trim().to_string(),
            street: self.street.trim().to_string(),
            zip: self.zip.chars().filter(|c| !c.is_whitespace()).collect(),
            city: self.city.trim().to_string(),

            room_count: parse_float(&self.rum),
            living_area_m2: parse_float(&self.boarea),
            balcony: yes_no(&self.balkong),
            floor: parse_int(&self.vaning),
            elevator: yes_no(&self.hiss),

            plot_area_m2: parse_float(&self.tomtarea),
            patio: yes_no(&self.uteplats),
            va_connection: if kind == Kind::Sale {
                yes_no(&self.va_anslutning)
            } else {
                None
            },
            building_rights: if kind == Kind::Sale {
                blank_to_none(&self.byggratt)
            } else {
                None
            },

            association: blank_to_none(&self.forening),
            energy_class,
            fee_per_month: sale_only(parse_int(&self.avgift_per_manad)),
            price_per_m2: sale_only(parse_int(&self.pris_per_kvm)),

            includes_electricity: included(&self.el),
            includes_heating: included(&self.varme),
            includes_water: included(&self.vatten),
            includes_internet: included(&self.internet),

            contact_first_name: self.contact_first_name.trim().to_string(),
            contact_last_name: self.contact_last_name.trim().to_string(),
            contact_phone: self.contact_phone.trim().to_string(),
            contact_email: self.contact_email.trim().to_string(),

            description: self.description.trim().to_string(),
            image_urls,
            status: STATUS_PUBLISHED.to_string(),
        }
    }
}

fn required_fields(kind: Kind, objekt: Option<Objekt>) -> Vec<(&'static str, &'static str)> {
    let mut fields = vec![
        ("title", "Annonsrubrik krävs"),
        ("street", "Gatuadress krävs"),
        ("zip", "Postnummer krävs"),
        ("city", "Stad krävs"),
        ("objekt", "Välj objekt"),
        ("upplåtelseform", "Välj upplåtelseform"),
    ];

    match kind {
        Kind::Sale => fields.push(("pris", "Pris krävs")),
        Kind::Rent => {
            fields.push(("hyra", "Hyra krävs"));
            fields.push(("hyresperiod", "Välj uthyrningsperiod"));
        }
    }

    let rooms_and_area = [("rum", "Antal rum krävs"), ("boarea", "Boarea krävs")];
    let plot = ("tomtarea", "Tomtarea krävs");
    match objekt {
        Some(Objekt::Lagenhet) => {
            fields.extend(rooms_and_area);
            fields.push(("vaning", "Våning krävs"));
            if kind == Kind::Sale {
                fields.push(("avgiftPerManad", "Avgift per månad krävs"));
            }
            fields.push(("balkong", "Ange om balkong finns"));
            fields.push(("hiss", "Ange om hiss finns"));
        }
        Some(o) if o.is_house_type() => {
            fields.extend(rooms_and_area);
            fields.push(plot);
            if kind == Kind::Sale {
                fields.push(("uteplats", "Ange om uteplats finns"));
            }
        }
        Some(Objekt::Tomt) => {
            fields.push(plot);
            fields.push(("vaAnslutning", "Ange om VA-anslutning finns"));
        }
        Some(Objekt::GardSkog) => fields.push(plot),
        _ => {}
    }

    if kind == Kind::Rent || objekt != Some(Objekt::Tomt) {
        fields.extend([
            ("el", "Ange om el ingår"),
            ("varme", "Ange om värme ingår"),
            ("vatten", "Ange om vatten ingår"),
            ("internet", "Ange om internet ingår"),
        ]);
    }

    fields.extend([
        ("contactFirstName", "Förnamn krävs"),
        ("contactLastName", "Efternamn krävs"),
        ("contactPhone", "Telefonnummer krävs"),
        ("contactEmail", "E-post krävs"),
    ]);

    fields
}

fn blank_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn yes_no(value: &str) -> Option<bool> {
    match value.trim() {
        "JA" => Some(true),
        "NEJ" => Some(false),
        _ => None,
    }
}

fn included(value: &str) -> Option<bool> {
    match value.trim() {
        "INGAR" => Some(true),
        "INGAR_EJ" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_needs_no_utility_flags_when_sold() {
        let fields: Vec<&str> = required_fields(Kind::Sale, Some(Objekt::Tomt))
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert!(fields.contains(&"vaAnslutning"));
        assert!(!fields.contains(&"el"));
    }

    #[test]
    fn flags_convert_to_booleans() {
        assert_eq!(yes_no("JA"), Some(true));
        assert_eq!(yes_no("NEJ"), Some(false));
        assert_eq!(yes_no(""), None);
        assert_eq!(included("INGAR_EJ"), Some(false));
    }
}
