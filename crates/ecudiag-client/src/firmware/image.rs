//! Firmware image source

use std::path::Path;

use ecudiag_core::image_digest;

use super::FirmwareError;

/// Text firmware image, one record per line, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    lines: Vec<String>,
}

impl FirmwareImage {
    /// Read an image file; blank lines are skipped and line endings stripped
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FirmwareError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FirmwareError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&content))
    }

    pub fn from_text(content: &str) -> Self {
        Self::from_lines(content.lines())
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .map(|line| line.as_ref().trim_end().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// SHA-256 over the image lines, for comparing with what the device stored
    pub fn digest(&self) -> String {
        image_digest(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blank_lines_and_crlf_dropped() {
        let image = FirmwareImage::from_text(":10010000214601360121470136007EFE09D21901\r\n\r\n:00000001FF\r\n");
        assert_eq!(
            image.lines(),
            &[
                ":10010000214601360121470136007EFE09D21901".to_string(),
                ":00000001FF".to_string()
            ]
        );
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ":0300300002337A1E").unwrap();
        writeln!(file, ":00000001FF").unwrap();

        let image = FirmwareImage::from_path(file.path()).unwrap();
        assert_eq!(image.len(), 2);
        assert_eq!(image.digest(), image_digest(&[":0300300002337A1E", ":00000001FF"]));
    }

    #[test]
    fn test_missing_file() {
        let err = FirmwareImage::from_path("/nonexistent/firmware.hex").unwrap_err();
        assert!(matches!(err, FirmwareError::Image { .. }));
    }
}
