use std::fmt;


/// Snapshot passed to the progress callback of a [`Reader`][crate::Reader].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressInfo {
    /// Number of input bytes consumed so far (header included).
    pub bytes_processed: u64,

    /// Total size of the input in bytes, if known. It's known when the reader
    /// was created via `Reader::open`, `Reader::from_bytes` or when the size
    /// was set via `Reader::with_input_len`.
    pub bytes_total: Option<u64>,
}

impl ProgressInfo {
    /// Returns the progress as fraction between 0 and 1, if the total size is
    /// known.
    pub fn fraction(&self) -> Option<f64> {
        self.bytes_total
            .filter(|&total| total > 0)
            .map(|total| self.bytes_processed as f64 / total as f64)
    }
}

/// Progress state of one reader.
pub(crate) struct Progress {
    interval: u64,
    last_mark: u64,
    total: Option<u64>,
    callback: Box<dyn FnMut(ProgressInfo)>,
}

impl Progress {
    pub(crate) fn new(interval: u64, callback: Box<dyn FnMut(ProgressInfo)>) -> Self {
        Self {
            // An interval of 0 would mean "infinitely often".
            interval: interval.max(1),
            last_mark: 0,
            total: None,
            callback,
        }
    }

    /// Called once before the body is decoded. Marks crossed while parsing
    /// the header are not reported.
    pub(crate) fn start(&mut self, offset: usize, total: Option<u64>) {
        self.last_mark = offset as u64 / self.interval;
        self.total = total;
    }

    /// Invokes the callback if `offset` crossed a multiple of the interval
    /// since the last invocation.
    pub(crate) fn update(&mut self, offset: usize) {
        let offset = offset as u64;
        let mark = offset / self.interval;
        if mark > self.last_mark {
            self.last_mark = mark;
            (self.callback)(ProgressInfo {
                bytes_processed: offset,
                bytes_total: self.total,
            });
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Progress")
            .field("interval", &self.interval)
            .field("last_mark", &self.last_mark)
            .field("total", &self.total)
            .finish()
    }
}
