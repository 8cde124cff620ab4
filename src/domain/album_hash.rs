use std::fmt::Display;

use anyhow::bail;

/// Identifies the album a track belongs to, for cover art sharing.
///
/// Derived from the album title and the album artist: CRC-32 over the
/// UTF-16LE bytes of `album + album_artist`, rendered as 8 lowercase hex
/// digits (checksum bytes in little-endian order). Not collision resistant,
/// two different albums may end up sharing art.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumHash(String);

impl AlbumHash {
    pub fn of(album: &str, album_artist: &str) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        for unit in album.encode_utf16().chain(album_artist.encode_utf16()) {
            hasher.update(&unit.to_le_bytes());
        }
        let checksum = hasher.finalize();

        Self(
            checksum
                .to_le_bytes()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
        )
    }

    /// Parses a stored hash. Only 8 lowercase hex digits are accepted, so a
    /// parsed hash is always safe to use as a file name.
    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        if hex.len() != 8 || !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            bail!("invalid album hash '{hex}'");
        }
        Ok(Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AlbumHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
