//! Device-side firmware reception session

/// Buffer and counters for one reception session
///
/// `START_FIRMWARE` always begins a fresh session, discarding anything
/// buffered by an unfinished one.
#[derive(Debug, Default)]
pub struct FirmwareReceiver {
    receiving: bool,
    buffer: Vec<String>,
    rejected: usize,
}

impl FirmwareReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Enter reception mode with an empty buffer
    pub fn start(&mut self) {
        self.receiving = true;
        self.buffer.clear();
        self.rejected = 0;
    }

    /// Buffer an acknowledged line
    pub fn accept(&mut self, line: &str) {
        self.buffer.push(line.to_string());
    }

    /// Count a line answered with `ERROR`
    pub fn reject(&mut self) {
        self.rejected += 1;
    }

    /// Lines buffered so far, in arrival order
    pub fn lines(&self) -> &[String] {
        &self.buffer
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Leave reception mode, handing back the buffered image
    pub fn finish(&mut self) -> Vec<String> {
        self.receiving = false;
        std::mem::take(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut receiver = FirmwareReceiver::new();
        assert!(!receiver.is_receiving());

        receiver.start();
        receiver.accept(":0300300002337A1E");
        receiver.reject();
        receiver.accept(":00000001FF");
        assert_eq!(receiver.lines().len(), 2);
        assert_eq!(receiver.rejected(), 1);

        let image = receiver.finish();
        assert_eq!(image, vec![":0300300002337A1E", ":00000001FF"]);
        assert!(!receiver.is_receiving());
        assert!(receiver.lines().is_empty());
    }

    #[test]
    fn test_restart_discards_partial_image() {
        let mut receiver = FirmwareReceiver::new();
        receiver.start();
        receiver.accept("stale");
        receiver.start();
        assert!(receiver.lines().is_empty());
        assert!(receiver.is_receiving());
    }
}
