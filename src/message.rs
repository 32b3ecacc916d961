//! The queue message contract (spec §6.1): the shape of JSON payloads
//! published by scraping workers onto the intake queue.

use serde::{Deserialize, Serialize};

/// Either a single string or an array of strings. Scrapers are
/// inconsistent about whether `images` or `amenities` come back as one
/// value or several, so we accept both and normalize downstream
/// (spec §4.2, "Hygiene").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// Flatten into an owned `Vec<String>`, preserving order.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(items) => items,
        }
    }
}

/// A raw listing message as published by a scraping worker. Every field is
/// optional except where parsing genuinely requires it — the normalization
/// engine (C2) is responsible for filling in defaults (spec §4.2,
/// "Hygiene").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawListingMessage {
    pub title: Option<String>,
    pub price: Option<String>,
    pub price_text: Option<String>,
    pub location: Option<String>,
    pub location_text: Option<String>,
    /// Aliased to `location` per spec §6.1.
    pub address: Option<String>,
    pub bedrooms_text: Option<String>,
    pub bathrooms_text: Option<String>,
    pub area: Option<String>,
    pub area_text: Option<String>,
    pub images: Option<StringOrList>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub amenities: Option<StringOrList>,
    pub source_url: Option<String>,
    pub source_name: Option<String>,
    pub date_posted: Option<String>,
}

impl RawListingMessage {
    /// Parse a message from the raw bytes of a queue delivery body.
    ///
    /// Unknown fields are ignored deliberately: spec.md's Non-goals disclaim
    /// *bitwise* backward compatibility with any prior wire format, not
    /// forward compatibility with this one, so producers may add fields we
    /// don't yet understand without breaking ingest.
    pub fn from_slice(body: &[u8]) -> Result<RawListingMessage, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The free-text price, preferring `price_text` over `price` when both
    /// are present (scrapers that send both usually mean `price_text` to be
    /// the display string and `price` to be a best-effort pre-parse).
    pub fn price_text(&self) -> Option<&str> {
        self.price_text
            .as_deref()
            .or(self.price.as_deref())
    }

    /// The free-text location, preferring `location_text`, then
    /// `location`, then the `address` alias (spec §6.1: "`address`
    /// (aliased to location)").
    pub fn location_text(&self) -> Option<&str> {
        self.location_text
            .as_deref()
            .or(self.location.as_deref())
            .or(self.address.as_deref())
    }

    /// The free-text area, preferring `area_text` over `area`.
    pub fn area_text(&self) -> Option<&str> {
        self.area_text.as_deref().or(self.area.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_aliases_to_location() {
        let msg = RawListingMessage {
            address: Some("123 Main St".to_owned()),
            ..Default::default()
        };
        assert_eq!(msg.location_text(), Some("123 Main St"));
    }

    #[test]
    fn location_text_takes_priority_over_alias() {
        let msg = RawListingMessage {
            location_text: Some("Seattle, WA".to_owned()),
            address: Some("123 Main St".to_owned()),
            ..Default::default()
        };
        assert_eq!(msg.location_text(), Some("Seattle, WA"));
    }

    #[test]
    fn amenities_accepts_scalar_or_list() {
        let scalar: RawListingMessage = serde_json::from_str(
            r#"{"amenities": "pool, gym"}"#,
        )
        .unwrap();
        assert_eq!(
            scalar.amenities.unwrap().into_vec(),
            vec!["pool, gym".to_owned()]
        );

        let list: RawListingMessage = serde_json::from_str(
            r#"{"amenities": ["pool", "gym"]}"#,
        )
        .unwrap();
        assert_eq!(
            list.amenities.unwrap().into_vec(),
            vec!["pool".to_owned(), "gym".to_owned()]
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let msg: Result<RawListingMessage, _> =
            serde_json::from_str(r#"{"title": "x", "totally_new_field": 123}"#);
        assert!(msg.is_ok());
    }
}
