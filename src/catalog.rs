use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::database::JsonStore;
use crate::error::{CatalogError, Result};
use crate::models::{LastUpdated, Movie, MovieCandidate, MovieId, MovieImages};
use crate::thumbnail::ThumbnailGenerator;

/// The movie list, its last-updated marker, and the poster files behind them.
///
/// One instance is opened at startup and shared by every request. Readers get
/// deep copies; the only way to change the list is through add/edit/delete.
/// Mutations are serialized inside the process, so ids stay unique and no
/// in-process update is lost. Across processes the file lock only gives
/// last-writer-wins.
pub struct MovieCatalog {
    movies: JsonStore<Vec<Movie>>,
    last_updated: JsonStore<Option<LastUpdated>>,
    thumbnails: ThumbnailGenerator,
    write_gate: Mutex<()>,
}

impl MovieCatalog {
    /// Load the catalog file. Failure here is fatal to startup.
    ///
    /// A missing or unreadable last-updated marker only starts out empty; the
    /// next mutation rewrites it.
    pub async fn open(config: &Config) -> Result<Self> {
        let movies = JsonStore::load(config.movies_file(), config.lock.clone()).await?;
        let last_updated =
            match JsonStore::load_or(config.last_updated_file(), config.lock.clone(), None).await {
                Ok(store) => store,
                Err(e) => {
                    log::warn!("ignoring last-updated marker: {e}");
                    JsonStore::new(config.last_updated_file(), config.lock.clone(), None)
                }
            };

        let catalog = Self {
            movies,
            last_updated,
            thumbnails: ThumbnailGenerator::new(config.images_dir()),
            write_gate: Mutex::new(()),
        };
        log::info!(
            "loaded {} movies from {}",
            catalog.movies.snapshot().len(),
            catalog.movies.path().display()
        );
        Ok(catalog)
    }

    pub fn list(&self) -> Vec<Movie> {
        self.movies.snapshot()
    }

    /// Re-read the catalog file, replacing the in-memory list.
    pub async fn reload(&self) -> Result<Vec<Movie>> {
        let _gate = self.write_gate.lock().await;
        self.movies.reload().await
    }

    /// Create a movie from `candidate`, which must carry a poster. Returns the new id.
    pub async fn add(&self, mut candidate: MovieCandidate) -> Result<MovieId> {
        let poster = candidate
            .poster_image
            .take()
            .ok_or_else(|| CatalogError::validation("A poster image is required"))?;

        let _gate = self.write_gate.lock().await;
        let mut movies = self.movies.snapshot();
        let id = next_id(&movies)?;

        if let Err(e) = self.thumbnails.generate(&poster, id).await {
            self.discard_images(id).await;
            return Err(e);
        }

        let title = candidate.title.clone();
        movies.push(candidate.into_movie(id, MovieImages::for_movie(id)));
        if let Err(e) = self.movies.write(&movies).await {
            self.discard_images(id).await;
            return Err(e);
        }
        self.touch().await;

        log::info!("added movie {id} ({title})");
        Ok(id)
    }

    /// Replace the fields of an existing movie, keeping its image paths.
    ///
    /// A supplied poster regenerates the renditions in place.
    pub async fn edit(&self, mut candidate: MovieCandidate) -> Result<()> {
        let raw_id = candidate
            .id
            .ok_or_else(|| CatalogError::validation("Movie Id is required"))?;

        let _gate = self.write_gate.lock().await;
        let mut movies = self.movies.snapshot();
        let index = position(&movies, raw_id).ok_or(CatalogError::NotFound(raw_id))?;
        let id = movies[index].id;
        let images = movies[index].images.clone();

        if let Some(poster) = candidate.poster_image.take() {
            self.thumbnails.generate(&poster, id).await?;
        }

        movies[index] = candidate.into_movie(id, images);
        self.movies.write(&movies).await?;
        self.touch().await;

        log::info!("edited movie {id}");
        Ok(())
    }

    /// Remove a movie and its image directory.
    pub async fn delete(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(CatalogError::validation("Movie Id cannot be less than 1!"));
        }

        let _gate = self.write_gate.lock().await;
        let mut movies = self.movies.snapshot();
        let index = position(&movies, id).ok_or(CatalogError::NotFound(id))?;
        let removed = movies.remove(index);

        if !self.thumbnails.remove(removed.id).await? {
            log::debug!("movie {} had no image directory", removed.id);
        }
        self.movies.write(&movies).await?;
        self.touch().await;

        log::info!("deleted movie {} ({})", removed.id, removed.title);
        Ok(())
    }

    /// Read the last-updated marker from disk, refreshing the cached copy.
    pub async fn last_updated_at(&self) -> Result<String> {
        self.last_updated
            .reload()
            .await?
            .map(|marker| marker.last_updated_at)
            .ok_or_else(|| {
                CatalogError::read(self.last_updated.path(), "no lastUpdatedAt recorded")
            })
    }

    pub fn cached_last_updated_at(&self) -> Option<String> {
        self.last_updated
            .snapshot()
            .map(|marker| marker.last_updated_at)
    }

    /// Record a new last-updated marker after a successful catalog write.
    ///
    /// A failure here leaves the catalog newer than the marker; it is logged
    /// and does not fail the mutation.
    async fn touch(&self) {
        let previous = self
            .cached_last_updated_at()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));
        let stamp = next_timestamp(previous, Utc::now());

        let marker = Some(LastUpdated {
            last_updated_at: stamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Err(e) = self.last_updated.write(&marker).await {
            log::warn!("catalog saved but last-updated marker was not: {e}");
        }
    }

    async fn discard_images(&self, id: MovieId) {
        if let Err(e) = self.thumbnails.remove(id).await {
            log::warn!("could not clean up images for movie {id}: {e}");
        }
    }
}

/// One past the highest id in use, or 1 for an empty catalog.
pub fn next_id(movies: &[Movie]) -> Result<MovieId> {
    match movies.iter().map(|m| m.id).max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| CatalogError::validation("no ids left")),
    }
}

fn position(movies: &[Movie], id: i64) -> Option<usize> {
    let id = MovieId::try_from(id).ok()?;
    movies.iter().position(|m| m.id == id)
}

/// `now` truncated to milliseconds, bumped past `previous` if the clock has not moved.
fn next_timestamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}
