use std::fmt;

use super::types::NormalizedRecord;
use crate::provider_client::StreamInfo;

/// Why a stream info document produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeSkip {
    MissingInfo,
    MissingMovieData,
}

impl fmt::Display for NormalizeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInfo => f.write_str("missing or invalid 'info' field"),
            Self::MissingMovieData => f.write_str("missing or invalid 'movie_data' field"),
        }
    }
}

/// Flattens a stream info document into the indexing payload.
///
/// Both `info` and `movie_data` must be JSON objects or the document is skipped.
/// Field-level leniency is applied while decoding, so every field here is
/// already a string (possibly empty).
pub fn normalize(raw: &StreamInfo) -> Result<NormalizedRecord, NormalizeSkip> {
    let info = raw.info.as_ref().ok_or(NormalizeSkip::MissingInfo)?;
    let movie_data = raw
        .movie_data
        .as_ref()
        .ok_or(NormalizeSkip::MissingMovieData)?;

    Ok(NormalizedRecord {
        stream_id: movie_data.stream_id.clone(),
        title: movie_data.name.clone(),
        plot: info.plot.clone(),
        genre: info.genre.clone(),
        release_date: info.releasedate.clone(),
        rating: info.rating.clone(),
        director: info.director.clone(),
        cast: info.cast.clone(),
        movie_image: info.movie_image.clone(),
        youtube_trailer: info.youtube_trailer.clone(),
        tmdb_id: info.tmdb_id.clone(),
    })
}
