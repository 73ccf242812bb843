//! Heuristic association of calendar events with dogs.
//!
//! Events carry no dog foreign key, so a dog is linked to an event when its
//! name appears anywhere in the event title or description (case-insensitive).
//! A dog named "Max" therefore also matches "maximum dosage"; callers treat
//! the counts as hints.

use crate::model::{CareEvent, DogCareStatus};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::warn;

fn name_matcher(name: &str) -> Option<Regex> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    match RegexBuilder::new(&regex::escape(name))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(?err, name, "cannot build name matcher");
            None
        }
    }
}

fn mentions(re: &Regex, event: &CareEvent) -> bool {
    re.is_match(&event.title)
        || event
            .description
            .as_deref()
            .is_some_and(|d| re.is_match(d))
}

/// Number of events mentioning each dog, keyed by `dog_id`.
///
/// Every dog gets an entry; blank names always count zero.
pub fn count_events_per_dog(dogs: &[DogCareStatus], events: &[CareEvent]) -> HashMap<String, usize> {
    dogs.iter()
        .map(|dog| {
            let count = name_matcher(&dog.dog_name)
                .map(|re| events.iter().filter(|e| mentions(&re, e)).count())
                .unwrap_or(0);
            (dog.dog_id.clone(), count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DogFlags;

    fn dog(id: &str, name: &str) -> DogCareStatus {
        DogCareStatus {
            dog_id: id.into(),
            dog_name: name.into(),
            breed: None,
            photo: None,
            group_name: None,
            last_care: None,
            flags: DogFlags::default(),
        }
    }

    fn event(title: &str, description: Option<&str>) -> CareEvent {
        CareEvent {
            title: title.into(),
            description: description.map(str::to_string),
            status: "scheduled".into(),
        }
    }

    #[test]
    fn matches_title_or_description_case_insensitively() {
        let dogs = vec![dog("d1", "Luna"), dog("d2", "Rocky")];
        let events = vec![
            event("Vet visit: LUNA", None),
            event("Grooming", Some("bring luna and rocky")),
            event("Kennel cleaning", None),
        ];
        let counts = count_events_per_dog(&dogs, &events);
        assert_eq!(counts["d1"], 2);
        assert_eq!(counts["d2"], 1);
    }

    #[test]
    fn substring_matches_are_kept() {
        let dogs = vec![dog("d1", "Max")];
        let events = vec![event("Order maximum-strength wormer", None)];
        assert_eq!(count_events_per_dog(&dogs, &events)["d1"], 1);
    }

    #[test]
    fn regex_metacharacters_in_names_are_literal() {
        let dogs = vec![dog("d1", "Mr. (Boots)")];
        let events = vec![event("Bath for mr. (boots)", None), event("Mr  Boots", None)];
        assert_eq!(count_events_per_dog(&dogs, &events)["d1"], 1);
    }

    #[test]
    fn blank_names_match_nothing() {
        let dogs = vec![dog("d1", "  ")];
        let events = vec![event("anything", Some("at all"))];
        assert_eq!(count_events_per_dog(&dogs, &events)["d1"], 0);
    }
}
