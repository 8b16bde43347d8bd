//! Alignment window arithmetic
//!
//! Maps a global alignment index to the batch window that has to be loaded,
//! and a loaded window to local offsets. Everything here is pure.
//!
//! Jumps to an arbitrary position load a window centered on the target.
//! Stepping one past either edge of the loaded window loads the adjacent
//! contiguous window instead, so sequential reading never refetches what is
//! already on screen.

/// Half-open range `[start, end)` of global alignment indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    /// Last index inside the window
    pub fn last(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.end - 1)
        }
    }

    /// Offset of `index` relative to the first loaded index.
    /// `None` means the index is not resident.
    pub fn offset_of(&self, index: u64) -> Option<usize> {
        if self.contains(index) {
            usize::try_from(index - self.start).ok()
        } else {
            None
        }
    }

    /// Number of alignments to request for this window
    pub fn limit(&self) -> u32 {
        u32::try_from(self.len()).unwrap_or(u32::MAX)
    }
}

/// What navigation has to do to show a target index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Already loaded at this offset of the active window
    Resident { offset: usize },
    /// Load this window first
    Fetch(Window),
}

/// Window centered on `target`: `start = max(0, target - batch_size / 2)`
///
/// `total` caps the end. Pass `u64::MAX` when the total is not known yet.
pub fn centered_window(target: u64, batch_size: u32, total: u64) -> Window {
    let half = u64::from(batch_size / 2);
    let start = target.saturating_sub(half);
    let end = start.saturating_add(u64::from(batch_size)).min(total);
    Window::new(start, end)
}

/// Contiguous window after `loaded`
pub fn next_window(loaded: Window, batch_size: u32, total: u64) -> Window {
    let end = loaded.end.saturating_add(u64::from(batch_size)).min(total);
    Window::new(loaded.end, end)
}

/// Contiguous window before `loaded`
pub fn previous_window(loaded: Window, batch_size: u32) -> Window {
    Window::new(loaded.start.saturating_sub(u64::from(batch_size)), loaded.start)
}

/// Offset of `index` inside `loaded`, `None` when a fetch is needed
pub fn relative_offset(index: u64, loaded: Window) -> Option<usize> {
    loaded.offset_of(index)
}

/// Decide how to make `target` visible given the active window
pub fn plan(target: u64, loaded: Option<Window>, batch_size: u32, total: u64) -> FetchPlan {
    let Some(loaded) = loaded.filter(|w| !w.is_empty()) else {
        return FetchPlan::Fetch(centered_window(target, batch_size, total));
    };

    if let Some(offset) = relative_offset(target, loaded) {
        return FetchPlan::Resident { offset };
    }

    if target == loaded.end {
        return FetchPlan::Fetch(next_window(loaded, batch_size, total));
    }

    if target + 1 == loaded.start {
        return FetchPlan::Fetch(previous_window(loaded, batch_size));
    }

    FetchPlan::Fetch(centered_window(target, batch_size, total))
}
