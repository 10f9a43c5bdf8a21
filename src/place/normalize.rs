//! Normalization: query cleanup, precision hints, and tag-to-enum tables
//! that map heterogeneous provider output onto the canonical Place shape.

use super::types::{Category, Coordinate, FieldError, PlaceError, PlaceType, Tier};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Address keys consulted, in order, when naming a reverse-geocoded point.
pub const REVERSE_NAME_ORDER: &[&str] = &["amenity", "building", "tourism", "shop", "road"];

/// Address keys consulted, in order, when naming an autocomplete suggestion.
pub const SUGGESTION_NAME_ORDER: &[&str] = &["amenity", "building", "shop", "tourism"];

// ─── Query normalizer ───────────────────────────────────────────

/// Trim the raw input. Empty input is rejected before any lookup runs.
pub fn normalize_query(raw: &str) -> Result<String, PlaceError> {
    let q = raw.trim();
    if q.is_empty() {
        return Err(PlaceError::EmptyQuery);
    }
    Ok(q.to_string())
}

// ─── Precision hints ────────────────────────────────────────────

/// Finds a token in an address that sharpens a later geocoding query.
pub trait PrecisionHint: Send + Sync {
    fn extract(&self, text: &str) -> Option<String>;
}

/// Locale postal code matcher (Singapore: six digits).
pub struct PostalCodeHint {
    pattern: Regex,
}

impl PostalCodeHint {
    pub fn new(pattern: &str) -> Result<Self, PlaceError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PlaceError::Config(format!("postal code pattern: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl PrecisionHint for PostalCodeHint {
    fn extract(&self, text: &str) -> Option<String> {
        self.pattern.find(text).map(|m| m.as_str().to_string())
    }
}

/// Choose the directory query for a structured answer without coordinates.
///
/// Postal code beats address, address beats name.
pub fn directory_seed(
    hint: &dyn PrecisionHint,
    name: &str,
    address: Option<&str>,
    region: &str,
    min_seed_len: usize,
) -> (Tier, String) {
    let seed = address.map(str::trim).filter(|a| !a.is_empty());

    if let Some(code) = seed.and_then(|s| hint.extract(s)) {
        return (Tier::PostalCode, format!("{} {}", code, region));
    }
    match seed {
        Some(s) if s.chars().count() >= min_seed_len => (Tier::Address, format!("{} {}", s, region)),
        _ => (Tier::Name, format!("{} {}", name.trim(), region)),
    }
}

// ─── Tag tables ─────────────────────────────────────────────────

pub fn place_type_from_amenity(amenity: &str) -> PlaceType {
    match amenity {
        "restaurant" => PlaceType::Restaurant,
        "cafe" => PlaceType::Cafe,
        "bar" | "pub" => PlaceType::Bar,
        _ => PlaceType::Other,
    }
}

/// Infer a type from an OSM tag map: restaurant > cafe > bar/pub > attraction/museum.
pub fn place_type_from_tags(tags: &BTreeMap<String, String>) -> PlaceType {
    let amenity = tags.get("amenity").map(String::as_str);
    let tourism = tags.get("tourism").map(String::as_str);

    match (amenity, tourism) {
        (Some("restaurant"), _) => PlaceType::Restaurant,
        (Some("cafe"), _) => PlaceType::Cafe,
        (Some("bar") | Some("pub"), _) => PlaceType::Bar,
        (_, Some("attraction") | Some("museum")) => PlaceType::Activity,
        _ => PlaceType::Other,
    }
}

/// First non-empty value among `order` keys.
pub fn pick_name<'a>(fields: &'a BTreeMap<String, String>, order: &[&str]) -> Option<&'a str> {
    order
        .iter()
        .filter_map(|key| fields.get(*key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Lenient category parse: "Hidden Gem", "hidden_gem", "HiddenGem" all match.
pub fn parse_category(s: &str) -> Option<Category> {
    match squash(s).as_str() {
        "hiddengem" => Some(Category::HiddenGem),
        "touristtrap" => Some(Category::TouristTrap),
        _ => None,
    }
}

pub fn parse_place_type(s: &str) -> Option<PlaceType> {
    match squash(s).as_str() {
        "restaurant" => Some(PlaceType::Restaurant),
        "bar" | "pub" => Some(PlaceType::Bar),
        "cafe" | "café" | "coffee" => Some(PlaceType::Cafe),
        "activity" | "attraction" => Some(PlaceType::Activity),
        "other" => Some(PlaceType::Other),
        _ => None,
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn image_for(base: &str, place_type: PlaceType) -> String {
    format!("{}{}", base, place_type)
}

// ─── Structured-knowledge answer ────────────────────────────────

/// A validated structured-knowledge answer.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeAnswer {
    pub name: String,
    pub address: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub description: String,
    pub category: Category,
    pub place_type: PlaceType,
}

/// Pull the JSON object out of a model reply, tolerating ```json fences
/// and prose around the object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Validate a loosely-typed answer against the fixed schema.
///
/// Coordinates are accepted only when both components are finite and in
/// range; anything else leaves `coordinate` empty rather than failing.
pub fn validate_answer(value: &Value) -> Result<KnowledgeAnswer, PlaceError> {
    let Some(obj) = value.as_object() else {
        return Err(PlaceError::Validation(vec![FieldError {
            field: "$",
            problem: "expected a JSON object".into(),
        }]));
    };

    let mut errors = Vec::new();

    let name = match obj.get("name").and_then(Value::as_str).map(str::trim) {
        Some(n) if !n.is_empty() => Some(n.to_string()),
        Some(_) => {
            errors.push(FieldError { field: "name", problem: "empty".into() });
            None
        }
        None => {
            errors.push(FieldError { field: "name", problem: "missing or not a string".into() });
            None
        }
    };

    let category = match obj.get("category").and_then(Value::as_str) {
        Some(s) => parse_category(s).or_else(|| {
            errors.push(FieldError { field: "category", problem: format!("unknown value '{}'", s) });
            None
        }),
        None => {
            errors.push(FieldError { field: "category", problem: "missing or not a string".into() });
            None
        }
    };

    let place_type = match obj.get("placeType").and_then(Value::as_str) {
        Some(s) => parse_place_type(s).or_else(|| {
            errors.push(FieldError { field: "placeType", problem: format!("unknown value '{}'", s) });
            None
        }),
        None => {
            errors.push(FieldError { field: "placeType", problem: "missing or not a string".into() });
            None
        }
    };

    let (Some(name), Some(category), Some(place_type)) = (name, category, place_type) else {
        return Err(PlaceError::Validation(errors));
    };

    let address = obj
        .get("address")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from);

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let coordinate = obj.get("coordinates").and_then(|c| {
        let lat = c.get("lat").and_then(Value::as_f64)?;
        let lng = c.get("lng").and_then(Value::as_f64)?;
        Coordinate::new(lat, lng).ok()
    });

    Ok(KnowledgeAnswer {
        name,
        address,
        coordinate,
        description,
        category,
        place_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sg_hint() -> PostalCodeHint {
        PostalCodeHint::new(r"\b\d{6}\b").unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Tiong Bahru  ").unwrap(), "Tiong Bahru");
        // Inner whitespace is kept so it still matches saved names verbatim.
        assert_eq!(normalize_query(" Ya Kun  Kaya ").unwrap(), "Ya Kun  Kaya");
        assert!(matches!(normalize_query("   "), Err(PlaceError::EmptyQuery)));
        assert!(matches!(normalize_query(""), Err(PlaceError::EmptyQuery)));
    }

    #[test]
    fn test_postal_code_extracted() {
        let hint = sg_hint();
        assert_eq!(
            hint.extract("376 Joo Chiat Rd, Singapore 427630"),
            Some("427630".to_string())
        );
        assert_eq!(hint.extract("1 Raffles Place"), None);
        assert_eq!(hint.extract("Phone 12345678"), None);
    }

    #[test]
    fn test_seed_prefers_postal_code() {
        let hint = sg_hint();
        let (tier, q) = directory_seed(
            &hint,
            "Chin Mee Chin",
            Some("376 Joo Chiat Rd, Singapore 427630"),
            "Singapore",
            5,
        );
        assert_eq!(tier, Tier::PostalCode);
        assert_eq!(q, "427630 Singapore");
    }

    #[test]
    fn test_seed_falls_back_to_address_then_name() {
        let hint = sg_hint();
        let (tier, q) = directory_seed(&hint, "Lau Pa Sat", Some("18 Raffles Quay"), "Singapore", 5);
        assert_eq!(tier, Tier::Address);
        assert_eq!(q, "18 Raffles Quay Singapore");

        let (tier, q) = directory_seed(&hint, "Lau Pa Sat", Some("CBD"), "Singapore", 5);
        assert_eq!(tier, Tier::Name);
        assert_eq!(q, "Lau Pa Sat Singapore");

        let (tier, _) = directory_seed(&hint, "Lau Pa Sat", None, "Singapore", 5);
        assert_eq!(tier, Tier::Name);
    }

    #[test]
    fn test_place_type_from_amenity() {
        assert_eq!(place_type_from_amenity("restaurant"), PlaceType::Restaurant);
        assert_eq!(place_type_from_amenity("pub"), PlaceType::Bar);
        assert_eq!(place_type_from_amenity("cafe"), PlaceType::Cafe);
        assert_eq!(place_type_from_amenity("bank"), PlaceType::Other);
    }

    #[test]
    fn test_place_type_from_tags_precedence() {
        assert_eq!(
            place_type_from_tags(&tags(&[("amenity", "restaurant"), ("tourism", "attraction")])),
            PlaceType::Restaurant
        );
        assert_eq!(place_type_from_tags(&tags(&[("tourism", "museum")])), PlaceType::Activity);
        assert_eq!(place_type_from_tags(&tags(&[("tourism", "viewpoint")])), PlaceType::Other);
        assert_eq!(place_type_from_tags(&tags(&[("amenity", "bar")])), PlaceType::Bar);
        assert_eq!(place_type_from_tags(&tags(&[])), PlaceType::Other);
    }

    #[test]
    fn test_pick_name_order() {
        let fields = tags(&[("road", "Orchard Road"), ("shop", "Kinokuniya"), ("building", "Ngee Ann City")]);
        assert_eq!(pick_name(&fields, REVERSE_NAME_ORDER), Some("Ngee Ann City"));
        assert_eq!(pick_name(&tags(&[("road", "Orchard Road")]), REVERSE_NAME_ORDER), Some("Orchard Road"));
        assert_eq!(pick_name(&tags(&[("amenity", "  ")]), REVERSE_NAME_ORDER), None);
    }

    #[test]
    fn test_parse_category_lenient() {
        assert_eq!(parse_category("Hidden Gem"), Some(Category::HiddenGem));
        assert_eq!(parse_category("tourist_trap"), Some(Category::TouristTrap));
        assert_eq!(parse_category("meh"), None);
    }

    #[test]
    fn test_validate_answer_full() {
        let answer = validate_answer(&json!({
            "name": "Tiong Bahru Bakery",
            "address": "56 Eng Hoon St, #01-70, Singapore 160056",
            "coordinates": { "lat": 1.2846, "lng": 103.8320 },
            "description": "Croissants.",
            "category": "HiddenGem",
            "placeType": "Cafe"
        }))
        .unwrap();
        assert_eq!(answer.name, "Tiong Bahru Bakery");
        assert_eq!(answer.place_type, PlaceType::Cafe);
        assert!(answer.coordinate.is_some());
    }

    #[test]
    fn test_validate_answer_partial_coordinates_dropped() {
        let answer = validate_answer(&json!({
            "name": "Lau Pa Sat",
            "coordinates": { "lat": 1.28 },
            "category": "TouristTrap",
            "placeType": "Restaurant"
        }))
        .unwrap();
        assert!(answer.coordinate.is_none());
        assert!(answer.address.is_none());
        assert_eq!(answer.description, "");
    }

    #[test]
    fn test_validate_answer_lists_every_bad_field() {
        let err = validate_answer(&json!({ "category": "meh", "placeType": 3 })).unwrap_err();
        let PlaceError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["name", "category", "placeType"]);
    }

    #[test]
    fn test_validate_answer_rejects_non_object() {
        assert!(matches!(validate_answer(&json!([1, 2])), Err(PlaceError::Validation(_))));
    }

    #[test]
    fn test_extract_json_object() {
        let text = "Here you go:\n```json\n{\"name\": \"x\"}\n```";
        assert_eq!(extract_json_object(text), Some("{\"name\": \"x\"}"));
        assert_eq!(extract_json_object("no json here"), None);
    }
}
