use std::sync::Mutex;

/// UrlPicker holds the candidate URLs of one remote peer. Every component that dials the peer
/// asks it for a URL and tells it when that URL failed, which rotates to the next candidate.
pub(crate) struct UrlPicker {
    inner: Mutex<Inner>,
}

struct Inner {
    urls: Vec<String>,
    picked: usize,
}

impl UrlPicker {
    pub(crate) fn new(urls: Vec<String>) -> Self {
        UrlPicker {
            inner: Mutex::new(Inner { urls, picked: 0 }),
        }
    }

    /// Returns the current URL, or `None` if the peer has no URLs.
    pub(crate) fn pick(&self) -> Option<String> {
        let inner = self.inner.lock().expect("UrlPicker.pick() mutex guard poison");
        inner.urls.get(inner.picked).cloned()
    }

    /// Replace the candidate set. The current URL stays picked if it is still a candidate.
    pub(crate) fn update(&self, urls: Vec<String>) {
        let mut inner = self.inner.lock().expect("UrlPicker.update() mutex guard poison");
        let current = inner.urls.get(inner.picked).cloned();
        inner.picked = current
            .and_then(|current| urls.iter().position(|url| *url == current))
            .unwrap_or(0);
        inner.urls = urls;
    }

    /// Rotate away from `url` if it is still the picked one. A failure reported against a URL
    /// that was already rotated away from is ignored, so concurrent failures move the pick once.
    pub(crate) fn unreachable(&self, url: &str) {
        let mut inner = self.inner.lock().expect("UrlPicker.unreachable() mutex guard poison");
        if inner.urls.is_empty() {
            return;
        }
        if inner.urls[inner.picked] == url {
            inner.picked = (inner.picked + 1) % inner.urls.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rotates_on_unreachable() {
        let picker = UrlPicker::new(urls(&["http://a:1", "http://b:1", "http://c:1"]));
        assert_eq!(picker.pick().unwrap(), "http://a:1");

        picker.unreachable("http://a:1");
        assert_eq!(picker.pick().unwrap(), "http://b:1");

        // Stale report for a URL we already moved away from.
        picker.unreachable("http://a:1");
        assert_eq!(picker.pick().unwrap(), "http://b:1");

        picker.unreachable("http://b:1");
        picker.unreachable("http://c:1");
        assert_eq!(picker.pick().unwrap(), "http://a:1");
    }

    #[test]
    fn update_keeps_current_pick_if_present() {
        let picker = UrlPicker::new(urls(&["http://a:1", "http://b:1"]));
        picker.unreachable("http://a:1");
        assert_eq!(picker.pick().unwrap(), "http://b:1");

        picker.update(urls(&["http://b:1", "http://c:1"]));
        assert_eq!(picker.pick().unwrap(), "http://b:1");
    }

    #[test]
    fn update_falls_back_when_current_pick_removed() {
        let picker = UrlPicker::new(urls(&["http://a:1", "http://b:1"]));
        picker.update(urls(&["http://c:1", "http://d:1"]));
        assert_eq!(picker.pick().unwrap(), "http://c:1");
    }

    #[test]
    fn empty_set() {
        let picker = UrlPicker::new(vec![]);
        assert_eq!(picker.pick(), None);
        picker.unreachable("http://a:1");
        assert_eq!(picker.pick(), None);
    }
}
