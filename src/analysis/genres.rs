// Genres - mapping from model class codes to display labels

use serde::{Deserialize, Serialize};

/// A model class code and the label shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub code: String,
    pub label: String,
}

/// Ordered table of recognizable genres
///
/// Serializes as a JSON array of `{ "code": ..., "label": ... }` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreTable {
    genres: Vec<Genre>,
}

impl GenreTable {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            genres: pairs
                .into_iter()
                .map(|(code, label)| Genre {
                    code: code.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }

    /// Display label for a class code
    pub fn label(&self, code: &str) -> Option<&str> {
        self.genres
            .iter()
            .find(|g| g.code == code)
            .map(|g| g.label.as_str())
    }

    /// Labels in table order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.genres.iter().map(|g| g.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }
}

impl Default for GenreTable {
    /// The seven genres the bundled model was trained on
    fn default() -> Self {
        Self::from_pairs([
            ("country_group", "Country music"),
            ("pop", "Pop music"),
            ("hip_hop", "Hip hop music"),
            ("rock", "Rock music"),
            ("metal", "Metal"),
            ("classic", "Classical music"),
            ("electro", "Electro"),
        ])
    }
}
