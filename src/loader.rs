use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ImageError;
use crate::memory::MEMORY_MAX;

/// Compiled program: an origin address, and the words to place consecutively from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    orig: u16,
    words: Vec<u16>,
}

impl Image {
    /// Origin used by programs which do not specify one.
    pub const DEFAULT_ORIG: u16 = 0x3000;

    pub fn new(orig: u16, words: Vec<u16>) -> Result<Image, ImageError> {
        if orig as usize + words.len() > MEMORY_MAX {
            return Err(ImageError::TooLong {
                orig,
                words: words.len(),
            });
        }
        Ok(Image { orig, words })
    }

    /// Parse big-endian image bytes, where the first word is the origin.
    pub fn from_bytes(bytes: &[u8]) -> Result<Image, ImageError> {
        if bytes.len() < 2 {
            return Err(ImageError::TooShort { len: bytes.len() });
        }
        if bytes.len() % 2 != 0 {
            return Err(ImageError::Unaligned { len: bytes.len() });
        }

        let mut words = bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]));
        // Length checked above
        let orig = words.next().unwrap_or(Self::DEFAULT_ORIG);
        Image::new(orig, words.collect())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Image, ImageError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ImageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let image = Image::from_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            orig = image.orig,
            words = image.words.len(),
            "loaded program image"
        );
        Ok(image)
    }

    pub fn orig(&self) -> u16 {
        self.orig
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_origin_and_words() {
        let image = Image::from_bytes(&[0x30, 0x00, 0xF0, 0x25, 0x12, 0x34]).unwrap();
        assert_eq!(image.orig(), 0x3000);
        assert_eq!(image.words(), &[0xF025, 0x1234]);
    }

    #[test]
    fn origin_only_is_empty_program() {
        let image = Image::from_bytes(&[0x40, 0x00]).unwrap();
        assert_eq!(image.orig(), 0x4000);
        assert!(image.words().is_empty());
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            Image::from_bytes(&[]),
            Err(ImageError::TooShort { len: 0 })
        ));
        assert!(matches!(
            Image::from_bytes(&[0x30]),
            Err(ImageError::TooShort { len: 1 })
        ));
        assert!(matches!(
            Image::from_bytes(&[0x30, 0x00, 0xF0]),
            Err(ImageError::Unaligned { len: 3 })
        ));
    }

    #[test]
    fn rejects_program_past_end_of_memory() {
        assert!(Image::new(0xFFFF, vec![1]).is_ok());
        assert!(matches!(
            Image::new(0xFFFF, vec![1, 2]),
            Err(ImageError::TooLong {
                orig: 0xFFFF,
                words: 2
            })
        ));
    }

    #[test]
    fn missing_file() {
        let err = Image::read("does/not/exist.obj").unwrap_err();
        assert!(matches!(err, ImageError::Read { .. }));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halt.obj");
        fs::write(&path, [0x30, 0x00, 0xF0, 0x25]).unwrap();
        let image = Image::read(&path).unwrap();
        assert_eq!(image, Image::new(0x3000, vec![0xF025]).unwrap());
    }

    proptest! {
        #[test]
        fn round_trip(orig in 0u16..0xF000, words in prop::collection::vec(any::<u16>(), 0..64)) {
            let mut bytes = orig.to_be_bytes().to_vec();
            for word in &words {
                bytes.extend(word.to_be_bytes());
            }
            let image = Image::from_bytes(&bytes).unwrap();
            prop_assert_eq!(image.orig(), orig);
            prop_assert_eq!(image.words(), words.as_slice());
        }
    }
}
