use serde::{Deserialize, Serialize};

use crate::error::{AuthError, CatalogError, ErrorKind};

pub type MovieId = u64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImdbInfo {
    pub rating: f64,
    pub votes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MovieImages {
    #[serde(rename = "mainURL")]
    pub main_url: String,
    #[serde(rename = "desktopURL")]
    pub desktop_url: String,
    #[serde(rename = "mobileURL")]
    pub mobile_url: String,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: String,
}

impl MovieImages {
    /// Relative URLs for the renditions of movie `id`, as served from the public dir.
    pub fn for_movie(id: MovieId) -> Self {
        Self {
            main_url: format!("images/movies/{id}/main.jpg"),
            desktop_url: format!("images/movies/{id}/main-480.jpg"),
            mobile_url: format!("images/movies/{id}/main-300.jpg"),
            thumbnail_url: format!("images/movies/{id}/thumb-20.jpg"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub director: String,
    pub distributor: String,
    pub imdb: ImdbInfo,
    pub images: MovieImages,
}

/// Upstream-validated form data for add/edit.
///
/// `id` is only read by edit; add assigns its own. `poster_image` is required
/// by add and optional for edit.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MovieCandidate {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub director: String,
    pub distributor: String,
    pub imdb_rating: f64,
    pub imdb_votes: u64,
    #[serde(skip)]
    pub poster_image: Option<Vec<u8>>,
}

impl MovieCandidate {
    pub(crate) fn into_movie(self, id: MovieId, images: MovieImages) -> Movie {
        Movie {
            id,
            title: self.title,
            director: self.director,
            distributor: self.distributor,
            imdb: ImdbInfo {
                rating: self.imdb_rating,
                votes: self.imdb_votes,
            },
            images,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdated {
    pub last_updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: u64,
    pub user_name: String,
    pub password_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: u64,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Success,
    Error,
}

/// Status-discriminated result handed to the HTTP layer.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_movie_id: Option<MovieId>,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: None,
            added_movie_id: None,
            kind: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            added_movie_id: None,
            kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn from_result<T>(result: &Result<T, CatalogError>) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(e) => e.into(),
        }
    }

    /// Outcome of an add: carries the new id on success.
    pub fn added(result: &Result<MovieId, CatalogError>) -> Self {
        match result {
            Ok(id) => Self {
                added_movie_id: Some(*id),
                ..Self::success()
            },
            Err(e) => e.into(),
        }
    }

    /// Outcome of a password check; a mismatch is an error outcome, not an `Err`.
    pub fn login(result: &Result<bool, AuthError>) -> Self {
        match result {
            Ok(true) => Self::success(),
            Ok(false) => Self::error(
                ErrorKind::CredentialsError,
                "Username and password don't match!",
            ),
            Err(e) => e.into(),
        }
    }
}

impl From<&CatalogError> for Outcome {
    fn from(e: &CatalogError) -> Self {
        Self::error(e.kind(), e.to_string())
    }
}

impl From<&AuthError> for Outcome {
    fn from(e: &AuthError) -> Self {
        Self::error(e.kind(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_uses_catalog_field_names() {
        let movie = Movie {
            id: 3,
            title: "Heat".to_string(),
            director: "Michael Mann".to_string(),
            distributor: "Warner Bros.".to_string(),
            imdb: ImdbInfo {
                rating: 8.3,
                votes: 700_000,
            },
            images: MovieImages::for_movie(3),
        };

        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["imdb"]["votes"], 700_000);
        assert_eq!(json["images"]["mainURL"], "images/movies/3/main.jpg");
        assert_eq!(json["images"]["desktopURL"], "images/movies/3/main-480.jpg");
        assert_eq!(json["images"]["mobileURL"], "images/movies/3/main-300.jpg");
        assert_eq!(json["images"]["thumbnailURL"], "images/movies/3/thumb-20.jpg");
    }

    #[test]
    fn added_outcome_serializes_like_the_http_contract() {
        let outcome = Outcome::added(&Ok(1));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "success", "addedMovieId": 1 })
        );
    }

    #[test]
    fn error_outcome_keeps_kind_out_of_the_payload() {
        let outcome = Outcome::from_result::<()>(&Err(CatalogError::NotFound(9)));
        assert_eq!(outcome.kind, Some(ErrorKind::NotFoundError));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Movie Id 9 not in database!");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn user_record_reads_users_list_shape() {
        let raw = r#"[{"id":1,"userName":"bob","passwordHash":"$argon2id$x"}]"#;
        let users: Vec<UserRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(users[0].user_name, "bob");
        assert_eq!(users[0].password_hash, "$argon2id$x");
    }
}
