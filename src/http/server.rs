use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    config::HttpConfig,
    domain::{
        playlist::{NewPlaylist, PlaylistId, PlaylistPatch, PlaylistView},
        track::{NewTrack, Track, TrackId, TrackPatch},
        user::User,
    },
    http::error::ApiError,
    storage::operations::Library,
    tagging::{AudioFetcher, TagCodec, download::DownloadTagger, import},
};

pub struct HttpServer<F, C> {
    library: Arc<Mutex<Library>>,
    tagger: DownloadTagger<F, C>,
    pub config: HttpConfig,
}

impl<F, C> HttpServer<F, C>
where
    F: AudioFetcher + Send + Sync + 'static,
    C: TagCodec + Send + Sync + 'static,
{
    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }
}

impl<F: AudioFetcher, C: TagCodec> HttpServer<F, C> {
    pub fn new(library: Library, tagger: DownloadTagger<F, C>, config: HttpConfig) -> Self {
        Self {
            library: Arc::new(Mutex::new(library)),
            tagger,
            config,
        }
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (GET) (/users/{username: String}/tracks) => {
                self.list_user_tracks(&username)
            },
            (GET) (/users/{username: String}/playlists) => {
                self.list_user_playlists(&username)
            },

            (POST) (/tracks) => {
                self.create_track(request)
            },
            (POST) (/tracks/import) => {
                self.import_track(request)
            },
            (GET) (/tracks/{id: i64}) => {
                self.get_track(TrackId(id))
            },
            (PUT) (/tracks/{id: i64}) => {
                self.update_track(request, TrackId(id))
            },
            (DELETE) (/tracks/{id: i64}) => {
                self.delete_track(request, TrackId(id))
            },
            (GET) (/tracks/{id: i64}/art) => {
                self.get_track_art(TrackId(id))
            },
            (GET) (/tracks/{id: i64}/lyrics) => {
                self.get_track_lyrics(TrackId(id))
            },
            (GET) (/tracks/{id: i64}/download) => {
                self.download_track(request, TrackId(id))
            },

            (POST) (/playlists) => {
                self.create_playlist(request)
            },
            (GET) (/playlists/{id: i64}) => {
                self.get_playlist(PlaylistId(id))
            },
            (PUT) (/playlists/{id: i64}) => {
                self.update_playlist(request, PlaylistId(id))
            },
            (DELETE) (/playlists/{id: i64}) => {
                self.delete_playlist(request, PlaylistId(id))
            },
            (PUT) (/playlists/{id: i64}/{track: i64}) => {
                self.append_to_playlist(request, PlaylistId(id), TrackId(track))
            },
            (DELETE) (/playlists/{id: i64}/{track: i64}) => {
                self.remove_from_playlist(request, PlaylistId(id), TrackId(track))
            },
            _ => Ok(Response::empty_404())
        );

        let response = result.unwrap_or_else(ApiError::into_response);
        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn library(&self) -> Result<MutexGuard<'_, Library>, ApiError> {
        self.library
            .lock()
            .map_err(|e| ApiError::Internal(format!("library lock poisoned: {e}")))
    }

    /// Resolves the `Authorization: Bearer <token>` header to a user.
    fn authenticate(&self, request: &Request) -> Result<User, ApiError> {
        let token = request
            .header("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthorized)?;
        self.library()?
            .authenticate(token)?
            .ok_or(ApiError::Unauthorized)
    }

    fn list_user_tracks(&self, username: &str) -> Result<Response, ApiError> {
        let tracks = self.library()?.list_tracks(username)?;
        let body: Vec<_> = tracks.iter().map(TrackResponse::from_domain).collect();
        Ok(Response::json(&body))
    }

    fn list_user_playlists(&self, username: &str) -> Result<Response, ApiError> {
        let library = self.library()?;
        let views = library
            .list_playlists(username)?
            .into_iter()
            .map(|p| library.playlist_view(p.id))
            .collect::<Result<Vec<_>, _>>()?;
        let body: Vec<_> = views.iter().map(PlaylistResponse::from_domain).collect();
        Ok(Response::json(&body))
    }

    fn create_track(&self, request: &Request) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        let body: CreateTrackRequest = json_body(request)?;
        let new = body.into_domain()?;

        let track = self.library()?.create_track(&user, new)?;
        Ok(created(
            format!("/tracks/{}", track.id),
            &TrackResponse::from_domain(&track),
        ))
    }

    /// Fetches the audio at `uri` and creates a track from its tags. The
    /// fetch runs without holding the library lock.
    fn import_track(&self, request: &Request) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        let body: ImportTrackRequest = json_body(request)?;

        let fields = import::fetch_tags(self.tagger.fetcher(), self.tagger.codec(), &body.uri)?;
        let listen = body.listen.unwrap_or_else(|| body.uri.clone());
        let new = import::new_track_from_tags(fields, listen, body.download);

        let track = self.library()?.import_track(&user, new)?;
        Ok(created(
            format!("/tracks/{}", track.id),
            &TrackResponse::from_domain(&track),
        ))
    }

    fn get_track(&self, id: TrackId) -> Result<Response, ApiError> {
        let track = self.library()?.get_track(id)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }

    fn update_track(&self, request: &Request, id: TrackId) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        let body: UpdateTrackRequest = json_body(request)?;
        let patch = body.into_domain()?;

        self.library()?.update_track(&user, id, patch)?;
        Ok(Response::empty_204())
    }

    fn delete_track(&self, request: &Request, id: TrackId) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        self.library()?.delete_track(&user, id)?;
        Ok(Response::empty_204())
    }

    fn get_track_art(&self, id: TrackId) -> Result<Response, ApiError> {
        let art = self
            .library()?
            .track_art(id)?
            .ok_or_else(|| ApiError::NotFound(format!("track {id} has no art")))?;
        Ok(Response::from_data("image/jpeg", art))
    }

    fn get_track_lyrics(&self, id: TrackId) -> Result<Response, ApiError> {
        let lyrics = self.library()?.track_lyrics(id)?;
        Ok(Response::text(lyrics))
    }

    /// Streams a copy of the track's audio retagged with the library's
    /// metadata. Fetching and tagging run without holding the library lock.
    fn download_track(&self, request: &Request, id: TrackId) -> Result<Response, ApiError> {
        self.authenticate(request)?;
        let track = self.library()?.get_track(id)?;

        let mut bytes = Vec::new();
        let (file_name, mime_type) = self.tagger.download(&track.metadata, &mut bytes)?;
        info!("serving {file_name} ({} bytes, {mime_type})", bytes.len());

        Ok(Response::from_data(mime_type, bytes).with_content_disposition_attachment(&file_name))
    }

    fn create_playlist(&self, request: &Request) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        let body: CreatePlaylistRequest = json_body(request)?;

        let view = self.library()?.create_playlist(
            &user,
            NewPlaylist {
                title: body.title,
                tracks: body.tracks.map(track_ids),
            },
        )?;
        Ok(created(
            format!("/playlists/{}", view.playlist.id),
            &PlaylistResponse::from_domain(&view),
        ))
    }

    fn get_playlist(&self, id: PlaylistId) -> Result<Response, ApiError> {
        let view = self.library()?.playlist_view(id)?;
        Ok(Response::json(&PlaylistResponse::from_domain(&view)))
    }

    fn update_playlist(&self, request: &Request, id: PlaylistId) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        let body: UpdatePlaylistRequest = json_body(request)?;

        self.library()?.update_playlist(
            &user,
            id,
            PlaylistPatch {
                title: body.title,
                tracks: body.tracks.map(track_ids),
            },
        )?;
        Ok(Response::empty_204())
    }

    fn delete_playlist(&self, request: &Request, id: PlaylistId) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        self.library()?.delete_playlist(&user, id)?;
        Ok(Response::empty_204())
    }

    fn append_to_playlist(
        &self,
        request: &Request,
        id: PlaylistId,
        track: TrackId,
    ) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        self.library()?.append_track(&user, id, track)?;
        Ok(Response::empty_204())
    }

    fn remove_from_playlist(
        &self,
        request: &Request,
        id: PlaylistId,
        track: TrackId,
    ) -> Result<Response, ApiError> {
        let user = self.authenticate(request)?;
        self.library()?.remove_track(&user, id, track)?;
        Ok(Response::empty_204())
    }
}

fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    rouille::input::json_input(request)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn created<T: Serialize>(location: String, body: &T) -> Response {
    Response::json(body)
        .with_status_code(201)
        .with_additional_header("Location", location)
}

fn decode_art(art: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(art)
        .map_err(|e| ApiError::BadRequest(format!("art is not valid base64: {e}")))
}

fn track_ids(ids: Vec<i64>) -> Vec<TrackId> {
    ids.into_iter().map(TrackId).collect()
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
    id: i64,
    owner: String,
    title: String,
    artist: String,
    album: String,
    album_artist: String,
    album_hash: String,
    genre: String,
    year: u32,
    track_number: u32,
    track_count: u32,
    disc_number: u32,
    disc_count: u32,
    listen: String,
    download: String,
}

impl TrackResponse {
    fn from_domain(track: &Track) -> Self {
        let m = &track.metadata;
        Self {
            id: track.id.0,
            owner: track.owner.clone(),
            title: m.title.clone(),
            artist: m.artist.clone(),
            album: m.album.clone(),
            album_artist: m.album_artist.clone(),
            album_hash: m.album_hash.to_string(),
            genre: m.genre.clone(),
            year: m.year,
            track_number: m.track_number,
            track_count: m.track_count,
            disc_number: m.disc_number,
            disc_count: m.disc_count,
            listen: m.listen.clone(),
            download: m.download.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct PlaylistResponse {
    id: i64,
    owner: String,
    title: String,
    tracks: Vec<TrackResponse>,
}

impl PlaylistResponse {
    fn from_domain(view: &PlaylistView) -> Self {
        Self {
            id: view.playlist.id.0,
            owner: view.playlist.owner.clone(),
            title: view.playlist.title.clone(),
            tracks: view.tracks.iter().map(TrackResponse::from_domain).collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateTrackRequest {
    title: String,
    artist: String,
    album: Option<String>,
    album_artist: Option<String>,
    /// base64 encoded image
    art: String,
    genre: Option<String>,
    lyrics: Option<String>,
    year: Option<u32>,
    track_number: Option<u32>,
    track_count: Option<u32>,
    disc_number: Option<u32>,
    disc_count: Option<u32>,
    listen: String,
    download: Option<String>,
}

impl CreateTrackRequest {
    fn into_domain(self) -> Result<NewTrack, ApiError> {
        Ok(NewTrack {
            art: Some(decode_art(&self.art)?),
            title: self.title,
            artist: self.artist,
            album: self.album,
            album_artist: self.album_artist,
            genre: self.genre,
            lyrics: self.lyrics,
            year: self.year,
            track_number: self.track_number,
            track_count: self.track_count,
            disc_number: self.disc_number,
            disc_count: self.disc_count,
            listen: self.listen,
            download: self.download,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct UpdateTrackRequest {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    album_artist: Option<String>,
    art: Option<String>,
    genre: Option<String>,
    lyrics: Option<String>,
    year: Option<u32>,
    track_number: Option<u32>,
    track_count: Option<u32>,
    disc_number: Option<u32>,
    disc_count: Option<u32>,
    listen: Option<String>,
    download: Option<String>,
}

impl UpdateTrackRequest {
    fn into_domain(self) -> Result<TrackPatch, ApiError> {
        Ok(TrackPatch {
            art: self.art.as_deref().map(decode_art).transpose()?,
            title: self.title,
            artist: self.artist,
            album: self.album,
            album_artist: self.album_artist,
            genre: self.genre,
            lyrics: self.lyrics,
            year: self.year,
            track_number: self.track_number,
            track_count: self.track_count,
            disc_number: self.disc_number,
            disc_count: self.disc_count,
            listen: self.listen,
            download: self.download,
        })
    }
}

#[derive(Deserialize, Debug)]
struct ImportTrackRequest {
    uri: String,
    listen: Option<String>,
    download: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CreatePlaylistRequest {
    title: String,
    tracks: Option<Vec<i64>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct UpdatePlaylistRequest {
    title: Option<String>,
    tracks: Option<Vec<i64>>,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
