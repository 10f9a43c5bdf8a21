//! Viewport discovery: tagged POIs inside a bounding box, minus places the
//! user already saved.

use super::normalize::{image_for, place_type_from_tags};
use super::providers::{AreaElement, AreaService, BoundingBox};
use super::types::{Candidate, Category, Place, Tier};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Drop elements whose name exactly matches a saved place name.
///
/// The comparison is case-sensitive and whitespace-sensitive.
pub fn dedup_against_saved(elements: Vec<AreaElement>, saved: &[Place]) -> Vec<AreaElement> {
    let saved_names: HashSet<&str> = saved.iter().map(|p| p.name.as_str()).collect();
    elements
        .into_iter()
        .filter(|e| match e.tags.get("name") {
            Some(name) if saved_names.contains(name.as_str()) => {
                debug!(%name, "already saved, skipping");
                false
            }
            _ => true,
        })
        .collect()
}

/// Unnamed elements cannot become candidates and are skipped.
pub fn element_to_candidate(element: AreaElement, image_base: &str) -> Option<Candidate> {
    let name = element.tags.get("name")?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let place_type = place_type_from_tags(&element.tags);
    let kind = element
        .tags
        .get("amenity")
        .or_else(|| element.tags.get("tourism"))
        .map(|k| k.replace('_', " "))
        .unwrap_or_else(|| "place".to_string());
    let description = match element.tags.get("cuisine") {
        Some(cuisine) => format!("{} ({})", kind, cuisine.replace(';', ", ")),
        None => kind,
    };
    let address = match (element.tags.get("addr:housenumber"), element.tags.get("addr:street")) {
        (Some(n), Some(s)) => Some(format!("{} {}", n, s)),
        (None, Some(s)) => Some(s.clone()),
        _ => None,
    };

    Some(Candidate {
        id: format!("osm-{}-{}", element.osm_type, element.id),
        name,
        coordinate: element.coordinate,
        description,
        category: Category::HiddenGem,
        place_type,
        image: image_for(image_base, place_type),
        address,
        tier: Tier::Direct,
    })
}

/// Query the area service and build the suggestion list.
///
/// Failures and empty responses both yield an empty list.
pub fn discover(
    area: &dyn AreaService,
    bbox: &BoundingBox,
    saved: &[Place],
    image_base: &str,
) -> Vec<Candidate> {
    let elements = match area.discover(bbox) {
        Ok(elements) => elements,
        Err(e) => {
            warn!(error = %e, "area discovery failed");
            return Vec::new();
        }
    };
    let total = elements.len();
    let candidates: Vec<Candidate> = dedup_against_saved(elements, saved)
        .into_iter()
        .filter_map(|e| element_to_candidate(e, image_base))
        .collect();
    info!(total, kept = candidates.len(), "area discovery");
    candidates
}

/// The ephemeral suggestion list. Each search replaces it wholesale.
#[derive(Default)]
pub struct SuggestedSet {
    items: RwLock<Arc<Vec<Candidate>>>,
}

impl SuggestedSet {
    pub fn replace(&self, items: Vec<Candidate>) {
        let mut guard = self.items.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(items);
    }

    pub fn snapshot(&self) -> Arc<Vec<Candidate>> {
        let guard = self.items.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// Take one suggestion out, e.g. after the user saves it.
    pub fn take(&self, id: &str) -> Option<Candidate> {
        let mut guard = self.items.write().unwrap_or_else(|e| e.into_inner());
        let idx = guard.iter().position(|c| c.id == id)?;
        let mut next = guard.as_slice().to_vec();
        let taken = next.remove(idx);
        *guard = Arc::new(next);
        Some(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::testing::{element, FakeArea};
    use crate::place::types::{Coordinate, PlaceType};

    fn saved(name: &str) -> Place {
        Place {
            id: format!("saved-{}", name),
            name: name.into(),
            coordinate: Coordinate::new(1.2868, 103.8545).unwrap(),
            description: String::new(),
            category: Category::TouristTrap,
            place_type: PlaceType::Activity,
            image: String::new(),
            address: None,
            visited: None,
            rating: None,
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(1.27, 103.84, 1.30, 103.87).unwrap()
    }

    #[test]
    fn test_dedup_is_exact_match_only() {
        let elements = vec![
            element(1, Some("Merlion Park"), &[("tourism", "attraction")]),
            element(2, Some("merlion park"), &[("tourism", "attraction")]),
            element(3, Some("Merlion Park "), &[("tourism", "attraction")]),
        ];
        let kept = dedup_against_saved(elements, &[saved("Merlion Park")]);
        let ids: Vec<_> = kept.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_element_type_inference_and_defaults() {
        let c = element_to_candidate(
            element(7, Some("Atlas"), &[("amenity", "bar"), ("tourism", "attraction")]),
            "img:",
        )
        .unwrap();
        assert_eq!(c.place_type, PlaceType::Bar);
        assert_eq!(c.category, Category::HiddenGem);
        assert_eq!(c.id, "osm-node-7");
        assert_eq!(c.image, "img:Bar");

        let museum = element_to_candidate(element(8, Some("National Museum"), &[("tourism", "museum")]), "").unwrap();
        assert_eq!(museum.place_type, PlaceType::Activity);
    }

    #[test]
    fn test_unnamed_element_skipped() {
        assert!(element_to_candidate(element(9, None, &[("amenity", "cafe")]), "").is_none());
    }

    #[test]
    fn test_description_and_address_from_tags() {
        let c = element_to_candidate(
            element(
                10,
                Some("Burnt Ends"),
                &[
                    ("amenity", "restaurant"),
                    ("cuisine", "barbecue;australian"),
                    ("addr:housenumber", "7"),
                    ("addr:street", "Dempsey Road"),
                ],
            ),
            "",
        )
        .unwrap();
        assert_eq!(c.description, "restaurant (barbecue, australian)");
        assert_eq!(c.address.as_deref(), Some("7 Dempsey Road"));
    }

    #[test]
    fn test_discover_failure_yields_empty() {
        let area = FakeArea::default();
        area.set(None);
        assert!(discover(&area, &bbox(), &[], "").is_empty());
        assert_eq!(area.calls(), 1);
    }

    #[test]
    fn test_discover_dedups_and_converts() {
        let area = FakeArea::default();
        area.set(Some(vec![
            element(1, Some("Merlion Park"), &[("tourism", "attraction")]),
            element(2, Some("Lau Pa Sat"), &[("amenity", "restaurant")]),
            element(3, None, &[("amenity", "cafe")]),
        ]));
        let found = discover(&area, &bbox(), &[saved("Merlion Park")], "");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Lau Pa Sat");
    }

    #[test]
    fn test_suggested_set_replaced_wholesale() {
        let area = FakeArea::default();
        let set = SuggestedSet::default();

        area.set(Some(vec![element(1, Some("A"), &[]), element(2, Some("B"), &[])]));
        set.replace(discover(&area, &bbox(), &[], ""));
        assert_eq!(set.snapshot().len(), 2);

        area.set(Some(vec![element(3, Some("C"), &[])]));
        set.replace(discover(&area, &bbox(), &[], ""));
        let names: Vec<_> = set.snapshot().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["C"]);
    }

    #[test]
    fn test_suggested_take() {
        let set = SuggestedSet::default();
        set.replace(vec![element_to_candidate(element(1, Some("A"), &[]), "").unwrap()]);
        assert!(set.take("osm-node-1").is_some());
        assert!(set.take("osm-node-1").is_none());
        assert!(set.snapshot().is_empty());
    }
}
