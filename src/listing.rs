//! Derives the breed list a caller should render from the full set

use crate::model::Breed;

/// The breeds to show, in display order: a case-insensitive name
/// search, then a filter keeping breeds that carry every active tag,
/// then favorites ahead of the rest with names breaking ties.
///
/// Tags are compared exactly; callers pass them in normalized form.
/// A blank query and an empty tag set keep everything.
pub fn visible_breeds<'a>(
    breeds: &'a [Breed],
    query: &str,
    active_tags: &[String],
    favorites: &[String],
) -> Vec<&'a Breed> {
    let query = query.trim().to_lowercase();
    let mut list: Vec<&Breed> = breeds
        .iter()
        .filter(|b| query.is_empty() || b.name.to_lowercase().contains(&query))
        .filter(|b| active_tags.iter().all(|tag| b.tags.iter().any(|t| t == tag)))
        .collect();
    list.sort_by_cached_key(|b| (!favorites.contains(&b.id), b.name.to_lowercase()));
    list
}
