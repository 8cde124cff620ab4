use std::path::{Path, PathBuf};

use lofty::{
    config::WriteOptions,
    file::{AudioFile, FileType, TaggedFile, TaggedFileExt},
    picture::{MimeType, Picture, PictureType},
    probe::Probe,
    tag::{Accessor, ItemKey, Tag},
};

use super::{TagCodec, TagEdit, TagError, TagFields, TagHandle, TagPicture};

/// Tag codec backed by `lofty`. Works on the file's primary tag type.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyCodec;

pub struct LoftyHandle {
    path: PathBuf,
    file: TaggedFile,
}

impl TagCodec for LoftyCodec {
    type Handle = LoftyHandle;

    fn open(&self, path: &Path) -> Result<LoftyHandle, TagError> {
        let file = Probe::open(path)
            .map_err(|e| TagError::Read(format!("failed to open: {e}")))?
            .guess_file_type()
            .map_err(|e| TagError::Read(format!("failed to detect format: {e}")))?
            .read()
            .map_err(|e| TagError::Read(format!("failed to read: {e}")))?;

        Ok(LoftyHandle {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl LoftyHandle {
    fn tag(&self) -> Option<&Tag> {
        self.file.primary_tag().or_else(|| self.file.first_tag())
    }

    fn primary_tag_mut(&mut self) -> Result<&mut Tag, TagError> {
        let tag_type = self.file.primary_tag_type();
        if self.file.tag(tag_type).is_none() {
            self.file.insert_tag(Tag::new(tag_type));
        }
        self.file
            .tag_mut(tag_type)
            .ok_or_else(|| TagError::Write(format!("file does not support {tag_type:?} tags")))
    }
}

impl TagHandle for LoftyHandle {
    fn read(&self) -> TagFields {
        let Some(tag) = self.tag() else {
            return TagFields::default();
        };

        TagFields {
            title: tag.title().map(|s| s.to_string()),
            performers: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            album_artist: tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
            year: tag.year(),
            genre: tag.genre().map(|s| s.to_string()),
            track_number: tag.track(),
            track_count: tag.track_total(),
            disc_number: tag.disk(),
            disc_count: tag.disk_total(),
            lyrics: tag.get_string(&ItemKey::Lyrics).map(str::to_string),
            pictures: tag
                .pictures()
                .iter()
                .map(|p| TagPicture {
                    front_cover: p.pic_type() == PictureType::CoverFront,
                    data: p.data().to_vec(),
                })
                .collect(),
        }
    }

    fn apply(&mut self, edit: &TagEdit) -> Result<(), TagError> {
        let tag = self.primary_tag_mut()?;

        tag.set_title(edit.title.clone());
        tag.set_artist(edit.performers.clone());
        tag.set_album(edit.album.clone());
        tag.insert_text(ItemKey::AlbumArtist, edit.album_artist.clone());
        tag.set_year(edit.year);
        tag.set_track(edit.track_number);
        tag.set_track_total(edit.track_count);
        tag.set_disk(edit.disc_number);
        tag.set_disk_total(edit.disc_count);
        if let Some(genre) = &edit.genre {
            tag.set_genre(genre.clone());
        }
        if let Some(cover) = &edit.cover {
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(MimeType::Jpeg),
                None,
                cover.clone(),
            ));
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), TagError> {
        self.file
            .save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| TagError::Write(e.to_string()))
    }

    fn mime_type(&self) -> String {
        mime_for_file_type(self.file.file_type())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.path)
                    .first_or_octet_stream()
                    .to_string()
            })
    }
}

/// Media type of a container, if it has a well known one.
pub fn mime_for_file_type(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Mpeg => Some("audio/mpeg"),
        FileType::Flac => Some("audio/flac"),
        FileType::Mp4 => Some("audio/mp4"),
        FileType::Opus => Some("audio/opus"),
        FileType::Vorbis | FileType::Speex => Some("audio/ogg"),
        FileType::Wav => Some("audio/wav"),
        FileType::Aiff => Some("audio/aiff"),
        FileType::Aac => Some("audio/aac"),
        _ => None,
    }
}
