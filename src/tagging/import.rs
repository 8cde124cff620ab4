use std::path::Path;

use crate::domain::track::NewTrack;

use super::{
    AudioFetcher, DownloadError, TagCodec, TagError, TagFields, TagHandle, TagPicture,
    TempArtifact,
};

/// Stands in for any text tag a file does not carry.
pub const UNKNOWN: &str = "<unknown>";

/// Front cover if there is one, else whatever picture comes first.
pub fn preferred_picture(pictures: &[TagPicture]) -> Option<&TagPicture> {
    pictures
        .iter()
        .find(|p| p.front_cover)
        .or_else(|| pictures.first())
}

fn text(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn count(value: Option<u32>) -> u32 {
    match value {
        None | Some(0) => 1,
        Some(n) => n,
    }
}

/// Builds a new track purely from the tags of an audio file.
pub fn new_track_from_tags(
    fields: TagFields,
    listen: String,
    download: Option<String>,
) -> NewTrack {
    let art = preferred_picture(&fields.pictures).map(|p| p.data.clone());

    NewTrack {
        title: text(fields.title),
        artist: text(fields.performers),
        album: Some(text(fields.album)),
        album_artist: Some(text(fields.album_artist)),
        genre: Some(text(fields.genre)),
        lyrics: Some(text(fields.lyrics)),
        year: Some(fields.year.unwrap_or(0)),
        track_number: Some(count(fields.track_number)),
        track_count: Some(count(fields.track_count)),
        disc_number: Some(count(fields.disc_number)),
        disc_count: Some(count(fields.disc_count)),
        art,
        listen,
        download,
    }
}

pub fn read_tags<C: TagCodec>(codec: &C, path: &Path) -> Result<TagFields, TagError> {
    Ok(codec.open(path)?.read())
}

/// Fetches `uri` and reads its tags. The fetched copy is gone when this returns.
pub fn fetch_tags<F: AudioFetcher, C: TagCodec>(
    fetcher: &F,
    codec: &C,
    uri: &str,
) -> Result<TagFields, DownloadError> {
    let path = fetcher
        .fetch(uri)
        .map_err(|e| DownloadError::UpstreamFetch(format!("{e:#}")))?;
    let artifact = TempArtifact::new(path);
    read_tags(codec, artifact.path()).map_err(|e| DownloadError::TagRead(e.to_string()))
}
