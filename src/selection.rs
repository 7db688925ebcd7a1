//! Share-link selection state, mirrored in the page URL

use url::Url;

const PET_TYPE_PARAM: &str = "petType";
const BREED_PARAM: &str = "breed";

/// Which pet type and breed the user is looking at.
///
/// Mirrored into the `petType`/`breed` query parameters so links can be
/// shared; callers should replace, not push, history entries when
/// writing it back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub pet_type_id: Option<String>,
    pub breed_id: Option<String>,
}

impl Selection {
    /// Read the selection out of a shared link. Absent or empty
    /// parameters mean nothing is selected.
    pub fn from_url(url: &Url) -> Self {
        let mut selection = Selection::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                PET_TYPE_PARAM => selection.pet_type_id = Some(value.into_owned()),
                BREED_PARAM => selection.breed_id = Some(value.into_owned()),
                _ => {}
            }
        }
        selection
    }

    /// Choose a pet type. The breed belongs to the old type, so it is
    /// cleared.
    pub fn select_pet_type(&mut self, id: Option<String>) {
        self.pet_type_id = id.filter(|v| !v.is_empty());
        self.breed_id = None;
    }

    /// Choose a breed within the current pet type
    pub fn select_breed(&mut self, id: Option<String>) {
        self.breed_id = id.filter(|v| !v.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.pet_type_id.is_none() && self.breed_id.is_none()
    }

    /// Just the query string for a share link, `None` when nothing is
    /// selected
    pub fn share_query(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(pet_type_id) = &self.pet_type_id {
            query.append_pair(PET_TYPE_PARAM, pet_type_id);
        }
        if let Some(breed_id) = &self.breed_id {
            query.append_pair(BREED_PARAM, breed_id);
        }
        Some(query.finish())
    }

    /// Write the selection into a URL, touching only its own two
    /// parameters and leaving every other one alone.
    pub fn apply_to_url(&self, url: &mut Url) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != PET_TYPE_PARAM && k != BREED_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let has_query = !kept.is_empty() || !self.is_empty();
        if !has_query {
            url.set_query(None);
            return;
        }

        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        if let Some(pet_type_id) = &self.pet_type_id {
            pairs.append_pair(PET_TYPE_PARAM, pet_type_id);
        }
        if let Some(breed_id) = &self.breed_id {
            pairs.append_pair(BREED_PARAM, breed_id);
        }
    }
}
